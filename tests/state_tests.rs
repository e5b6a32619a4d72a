use std::time::Duration;

use serde_json::json;

use photoshoot_bot::state::{StateManager, UserState};

/// Unseen users need no initialization step
#[test]
fn test_unseen_user_defaults() {
    let state = StateManager::new();

    assert_eq!(state.get_state(42), UserState::Idle);
    assert!(state.get_all_data(42).is_empty());
    assert!(state.get_data(42, "model_name").is_none());
    assert!(state.get_list(42, "photos").is_empty());
}

#[test]
fn test_set_and_get_state() {
    let state = StateManager::new();

    state.set_state(1, UserState::EnteringModelName);
    assert_eq!(state.get_state(1), UserState::EnteringModelName);

    state.set_state(1, UserState::UploadingPhotos);
    assert_eq!(state.get_state(1), UserState::UploadingPhotos);
}

/// Reset keeps the allow-listed keys and drops everything else
#[test]
fn test_reset_preserves_allow_listed_keys() {
    let state = StateManager::new();

    state.set_data(1, "model_name", json!("Summer"));
    state.set_data(1, "model_type", json!("male"));
    state.set_data(1, "chat_id", json!(1234));
    state.set_data(1, "prompt", json!("portrait in a studio"));
    state.add_to_list(1, "photos", json!("file-1"));
    state.set_state(1, UserState::EnteringPrompt);

    state.reset_state(1);

    assert_eq!(state.get_state(1), UserState::Idle);
    assert_eq!(state.get_string(1, "model_name").as_deref(), Some("Summer"));
    assert_eq!(state.get_string(1, "model_type").as_deref(), Some("male"));
    assert_eq!(state.get_i64(1, "chat_id"), Some(1234));
    assert!(state.get_data(1, "prompt").is_none());
    assert!(state.get_list(1, "photos").is_empty());
}

/// The store keeps its own copy: mutating what the caller kept or what the
/// store returned changes nothing inside
#[test]
fn test_copy_isolation() {
    let state = StateManager::new();

    let mut original = json!(["a", "b"]);
    state.set_data(1, "photos", original.clone());

    original.as_array_mut().unwrap().push(json!("c"));
    assert_eq!(state.get_list(1, "photos").len(), 2);

    let mut returned = state.get_data(1, "photos").unwrap();
    returned.as_array_mut().unwrap().clear();
    assert_eq!(state.get_list(1, "photos").len(), 2);
}

#[test]
fn test_clear_data_single_key() {
    let state = StateManager::new();

    state.set_data(1, "prompt", json!("x"));
    state.set_data(1, "model_id", json!(7));

    state.clear_data(1, Some("prompt"));
    assert!(state.get_data(1, "prompt").is_none());
    assert_eq!(state.get_i64(1, "model_id"), Some(7));
}

/// Clearing twice is the same as clearing once
#[test]
fn test_clear_data_idempotent() {
    let state = StateManager::new();

    state.set_data(1, "model_name", json!("Summer"));
    state.set_data(1, "prompt", json!("x"));

    state.clear_data(1, None);
    let after_first = state.get_all_data(1);

    state.clear_data(1, None);
    let after_second = state.get_all_data(1);

    assert_eq!(after_first, after_second);
    assert_eq!(state.get_string(1, "model_name").as_deref(), Some("Summer"));
    assert!(state.get_data(1, "prompt").is_none());

    // Clearing a user that was never seen is also fine
    state.clear_data(99, None);
    state.clear_data(99, Some("anything"));
}

#[test]
fn test_clear_data_except() {
    let state = StateManager::new();

    state.set_data(1, "model_name", json!("Summer"));
    state.set_data(1, "chat_id", json!(1234));

    state.clear_data_except(1, &["chat_id"]);
    assert!(state.get_data(1, "model_name").is_none());
    assert_eq!(state.get_i64(1, "chat_id"), Some(1234));
}

#[test]
fn test_update_data_bulk_merge() {
    let state = StateManager::new();

    state.set_data(1, "model_name", json!("Summer"));
    state.update_data(
        1,
        [
            ("model_type".to_string(), json!("female")),
            ("model_name".to_string(), json!("Winter")),
        ]
        .into_iter()
        .collect(),
    );

    assert_eq!(state.get_string(1, "model_name").as_deref(), Some("Winter"));
    assert_eq!(state.get_string(1, "model_type").as_deref(), Some("female"));
}

#[test]
fn test_list_accumulation() {
    let state = StateManager::new();

    for i in 1..=4 {
        state.add_to_list(1, "photos", json!(format!("file-{i}")));
    }

    let photos = state.get_string_list(1, "photos");
    assert_eq!(photos, vec!["file-1", "file-2", "file-3", "file-4"]);
}

#[test]
fn test_cleanup_inactive_sessions() {
    let state = StateManager::new();

    state.set_data(1, "model_name", json!("Summer"));
    state.set_state(2, UserState::EnteringPrompt);

    // Nothing is stale against a long TTL
    assert_eq!(state.cleanup_inactive_sessions(Duration::from_secs(3600)), 0);

    // Everything is stale against a zero TTL
    std::thread::sleep(Duration::from_millis(5));
    assert_eq!(state.cleanup_inactive_sessions(Duration::ZERO), 2);

    assert_eq!(state.get_state(2), UserState::Idle);
    assert!(state.get_data(1, "model_name").is_none());
}
