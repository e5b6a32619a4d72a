use serde_json::json;

use photoshoot_bot::notifications::{
    model_status_message, model_training_succeeded, plan_prompt_notification, refresh_models_cache,
    ModelStatusUpdate, PromptNotification, PromptStatusUpdate, StatusUpdate,
};
use photoshoot_bot::state::StateManager;

fn prompt_update(status: &str, images: Vec<String>, error: Option<String>) -> PromptStatusUpdate {
    PromptStatusUpdate {
        prompt_id: 11,
        status: status.to_string(),
        telegram_id: 42,
        images,
        error,
    }
}

/// Payloads are discriminated by their `type` field
#[test]
fn test_parse_model_status_payload() {
    let payload = r#"{
        "type": "model_status_update",
        "model_id": 5,
        "status": "completed",
        "telegram_id": 42
    }"#;
    let update: StatusUpdate = serde_json::from_str(payload).unwrap();
    match update {
        StatusUpdate::Model(update) => {
            assert_eq!(update.model_id, 5);
            assert_eq!(update.status, "completed");
            assert_eq!(update.telegram_id, 42);
            assert!(update.error.is_none());
        }
        other => panic!("unexpected update: {other:?}"),
    }
}

#[test]
fn test_parse_prompt_status_payload_without_images() {
    let payload = r#"{
        "type": "prompt_status_update",
        "prompt_id": 11,
        "status": "failed",
        "telegram_id": 42,
        "error": "out of credits"
    }"#;
    let update: StatusUpdate = serde_json::from_str(payload).unwrap();
    match update {
        StatusUpdate::Prompt(update) => {
            assert!(update.images.is_empty());
            assert_eq!(update.error.as_deref(), Some("out of credits"));
        }
        other => panic!("unexpected update: {other:?}"),
    }
}

#[test]
fn test_unknown_update_type_is_rejected() {
    let payload = r#"{ "type": "billing_update", "telegram_id": 42 }"#;
    assert!(serde_json::from_str::<StatusUpdate>(payload).is_err());
}

#[test]
fn test_both_success_statuses_accepted() {
    assert!(model_training_succeeded("completed"));
    assert!(model_training_succeeded("ready"));
    assert!(!model_training_succeeded("failed"));
}

/// A completed training run drops the cached model listing; a failed one
/// leaves it alone
#[test]
fn test_models_cache_invalidation() {
    let state = StateManager::new();
    state.set_data(42, "user_models", json!([{ "model_id": 1 }]));

    let failed = ModelStatusUpdate {
        model_id: 1,
        status: "failed".to_string(),
        telegram_id: 42,
        error: Some("boom".to_string()),
    };
    refresh_models_cache(&state, &failed);
    assert!(state.get_data(42, "user_models").is_some());

    let completed = ModelStatusUpdate {
        model_id: 1,
        status: "completed".to_string(),
        telegram_id: 42,
        error: None,
    };
    refresh_models_cache(&state, &completed);
    assert!(state.get_data(42, "user_models").is_none());
}

#[test]
fn test_model_messages_mention_id_or_error() {
    let ready = photoshoot_bot::notifications::ModelStatusUpdate {
        model_id: 5,
        status: "completed".to_string(),
        telegram_id: 42,
        error: None,
    };
    assert!(model_status_message(&ready, None).contains('5'));

    let failed = photoshoot_bot::notifications::ModelStatusUpdate {
        model_id: 5,
        status: "failed".to_string(),
        telegram_id: 42,
        error: Some("bad photos".to_string()),
    };
    assert!(model_status_message(&failed, None).contains("bad photos"));
}

/// Completed with an empty image list produces exactly one notice and no
/// image messages
#[test]
fn test_completed_with_empty_images_yields_single_notice() {
    let update = prompt_update("completed", vec![], None);
    match plan_prompt_notification(&update, None) {
        PromptNotification::EmptyResult(text) => {
            assert!(text.contains("not found"));
        }
        other => panic!("expected a single empty-result notice, got {other:?}"),
    }
}

#[test]
fn test_completed_with_images_plans_intro_plus_one_per_image() {
    let update = prompt_update(
        "completed",
        vec!["https://img/1.jpg".to_string(), "https://img/2.jpg".to_string()],
        None,
    );
    match plan_prompt_notification(&update, None) {
        PromptNotification::Images { intro, images } => {
            assert!(intro.contains('2'));
            assert_eq!(images.len(), 2);
        }
        other => panic!("expected images, got {other:?}"),
    }
}

#[test]
fn test_failed_prompt_maps_error_text() {
    let update = prompt_update("failed", vec![], Some("nsfw detected".to_string()));
    match plan_prompt_notification(&update, None) {
        PromptNotification::Failed(text) => assert!(text.contains("nsfw detected")),
        other => panic!("expected failure, got {other:?}"),
    }

    // A failure without details still reads as an error
    let update = prompt_update("failed", vec![], None);
    match plan_prompt_notification(&update, None) {
        PromptNotification::Failed(text) => assert!(text.contains("Unknown error")),
        other => panic!("expected failure, got {other:?}"),
    }
}
