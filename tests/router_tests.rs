use serde_json::json;

use photoshoot_bot::api_client::ModelSummary;
use photoshoot_bot::bot::callback_handler::synthesized_model_name;
use photoshoot_bot::bot::ui_builder::{
    format_photo_progress, format_training_confirmation, model_button_label, model_type_label,
    models_keyboard,
};
use photoshoot_bot::config::{MAX_MODEL_NAME_LEN, MAX_PROMPT_LEN};
use photoshoot_bot::state::{validate_model_name, validate_prompt, StateManager, UserState};

/// Length limits are checked before any transition happens
#[test]
fn test_model_name_limit() {
    assert!(validate_model_name(&"a".repeat(MAX_MODEL_NAME_LEN)).is_ok());
    assert_eq!(
        validate_model_name(&"a".repeat(MAX_MODEL_NAME_LEN + 1)),
        Err("too_long")
    );
}

#[test]
fn test_prompt_limit() {
    assert!(validate_prompt(&"p".repeat(MAX_PROMPT_LEN)).is_ok());
    assert_eq!(validate_prompt(&"p".repeat(600)), Err("too_long"));
}

/// The /train → name → type → photos walk leaves the confirmation step with
/// exactly the data the webhook will receive
#[test]
fn test_training_flow_scratch_walk() {
    let state = StateManager::new();
    let user_id = 7;

    // /train
    state.set_state(user_id, UserState::EnteringModelName);
    // name accepted
    let name = validate_model_name("Summer").unwrap();
    state.set_data(user_id, "model_name", json!(name));
    state.set_state(user_id, UserState::SelectingModelType);
    // type picked
    state.set_data(user_id, "model_type", json!("male"));
    state.set_state(user_id, UserState::UploadingPhotos);
    // four photos, one at a time
    let files = ["f-1", "f-2", "f-3", "f-4"];
    for file in files {
        state.add_to_list(user_id, "photos", json!(file));
    }

    let photos = state.get_string_list(user_id, "photos");
    assert_eq!(photos, files);

    let confirmation = format_training_confirmation(
        None,
        &state.get_string(user_id, "model_name").unwrap(),
        &state.get_string(user_id, "model_type").unwrap(),
        photos.len(),
    );
    assert!(confirmation.contains("Summer"));
    assert!(confirmation.contains(&model_type_label("male", None)));
    assert!(confirmation.contains('4'));
}

#[test]
fn test_photo_progress_counts() {
    let text = format_photo_progress(None, 1, 4);
    assert!(text.contains('1'));
    assert!(text.contains('3'));
}

#[test]
fn test_type_labels_differ_per_language() {
    assert_eq!(model_type_label("male", None), "Male");
    assert_eq!(model_type_label("male", Some("ru")), "Мужчина");
    // Unknown stored types fall back to the default label
    assert_eq!(model_type_label("default", None), "Default");
}

/// Synthesized fallback name: user id plus a timestamp
#[test]
fn test_synthesized_model_name_shape() {
    let name = synthesized_model_name(77);
    assert!(name.starts_with("model_77_"));
    let suffix = name.rsplit('_').next().unwrap();
    assert_eq!(suffix.len(), 14); // YYYYMMDDHHMMSS
    assert!(suffix.chars().all(|c| c.is_ascii_digit()));
}

#[test]
fn test_models_keyboard_encodes_model_ids() {
    let models = vec![
        ModelSummary {
            model_id: 7,
            name: Some("Summer".to_string()),
            status: Some("ready".to_string()),
        },
        ModelSummary {
            model_id: 9,
            name: None,
            status: None,
        },
    ];
    let keyboard = models_keyboard(&models, None);

    // One row per model plus the cancel row
    assert_eq!(keyboard.inline_keyboard.len(), 3);
    assert_eq!(keyboard.inline_keyboard[0][0].text, "Summer");
    // A nameless model gets a numbered placeholder
    assert_eq!(model_button_label(&models[1], None), "Model #9");
}
