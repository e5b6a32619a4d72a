//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::api_client::ModelSummary;
use crate::db::TelegramModel;
use crate::localization::{t_args_lang, t_lang};

/// Main menu shown after /start and at flow ends
pub fn main_menu_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback(t_lang("menu-train", language_code), "cmd_train"),
            InlineKeyboardButton::callback(t_lang("menu-generate", language_code), "cmd_generate"),
        ],
        vec![
            InlineKeyboardButton::callback(t_lang("menu-models", language_code), "cmd_models"),
            InlineKeyboardButton::callback(t_lang("menu-credits", language_code), "cmd_credits"),
        ],
    ])
}

/// Single back-to-menu button for terminal messages
pub fn home_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        t_lang("menu-home", language_code),
        "cmd_start",
    )]])
}

/// Single cancel button pointing at the given callback id
pub fn cancel_keyboard(language_code: Option<&str>, callback_data: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        t_lang("btn-cancel", language_code),
        callback_data.to_string(),
    )]])
}

/// Model type picker shown after the name is accepted
pub fn model_type_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback(t_lang("type-male", language_code), "type_male"),
            InlineKeyboardButton::callback(t_lang("type-female", language_code), "type_female"),
        ],
        vec![InlineKeyboardButton::callback(
            t_lang("btn-cancel-training", language_code),
            "cancel_training",
        )],
    ])
}

pub fn training_confirm_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(t_lang("btn-start-training", language_code), "start_training"),
        InlineKeyboardButton::callback(t_lang("btn-cancel", language_code), "cancel_training"),
    ]])
}

/// Re-offers the same confirm step after a webhook failure
pub fn training_retry_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(t_lang("btn-retry", language_code), "start_training"),
        InlineKeyboardButton::callback(
            t_lang("btn-cancel-training", language_code),
            "cancel_training",
        ),
    ]])
}

pub fn media_group_ready_keyboard(
    language_code: Option<&str>,
    group_id: &str,
) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            t_lang("btn-start-training-group", language_code),
            format!("start_training_{group_id}"),
        ),
        InlineKeyboardButton::callback(t_lang("btn-upload-again", language_code), "cmd_train"),
    ]])
}

pub fn media_group_retry_keyboard(
    language_code: Option<&str>,
    group_id: &str,
) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            t_lang("btn-retry", language_code),
            format!("start_training_{group_id}"),
        ),
        InlineKeyboardButton::callback(t_lang("btn-upload-again", language_code), "cmd_train"),
    ]])
}

/// One button per model, as reported by the models webhook
pub fn models_keyboard(models: &[ModelSummary], language_code: Option<&str>) -> InlineKeyboardMarkup {
    let mut buttons: Vec<Vec<InlineKeyboardButton>> = models
        .iter()
        .map(|model| {
            vec![InlineKeyboardButton::callback(
                model_button_label(model, language_code),
                format!("model_{}", model.model_id),
            )]
        })
        .collect();
    buttons.push(vec![InlineKeyboardButton::callback(
        t_lang("btn-cancel", language_code),
        "cancel_generation",
    )]);
    InlineKeyboardMarkup::new(buttons)
}

pub fn model_button_label(model: &ModelSummary, language_code: Option<&str>) -> String {
    match model.name.as_deref().filter(|name| !name.is_empty()) {
        Some(name) => name.to_string(),
        None => t_args_lang(
            "model-fallback-name",
            language_code,
            &[("id", model.model_id.to_string())],
        ),
    }
}

pub fn generation_confirm_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            t_lang("btn-start-generation", language_code),
            "start_generation",
        )],
        vec![InlineKeyboardButton::callback(
            t_lang("btn-edit-prompt", language_code),
            "edit_prompt",
        )],
        vec![InlineKeyboardButton::callback(
            t_lang("btn-cancel", language_code),
            "cancel_generation",
        )],
    ])
}

pub fn generation_retry_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(t_lang("btn-retry", language_code), "start_generation"),
        InlineKeyboardButton::callback(t_lang("btn-cancel", language_code), "cancel_generation"),
    ]])
}

/// Follow-up actions attached to every delivered image
pub fn image_actions_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(t_lang("btn-generate-more", language_code), "cmd_generate"),
        InlineKeyboardButton::callback(t_lang("menu-models", language_code), "cmd_models"),
    ]])
}

/// Human-readable label for a stored model type
pub fn model_type_label(model_type: &str, language_code: Option<&str>) -> String {
    match model_type {
        "male" => t_lang("type-label-male", language_code),
        "female" => t_lang("type-label-female", language_code),
        _ => t_lang("type-label-default", language_code),
    }
}

/// Training confirmation repeating everything the webhook will receive
pub fn format_training_confirmation(
    language_code: Option<&str>,
    model_name: &str,
    model_type: &str,
    photo_count: usize,
) -> String {
    t_args_lang(
        "training-confirmation",
        language_code,
        &[
            ("name", model_name.to_string()),
            ("type", model_type_label(model_type, language_code)),
            ("count", photo_count.to_string()),
        ],
    )
}

pub fn format_photo_progress(
    language_code: Option<&str>,
    count: usize,
    max_photos: usize,
) -> String {
    t_args_lang(
        "photo-progress",
        language_code,
        &[
            ("count", count.to_string()),
            ("remaining", max_photos.saturating_sub(count).to_string()),
        ],
    )
}

/// Numbered model listing with per-status labels
pub fn format_models_list(models: &[TelegramModel], language_code: Option<&str>) -> String {
    let mut result = t_lang("models-title", language_code);
    result.push('\n');
    for model in models {
        let status_label = match model.status.as_str() {
            "completed" | "ready" => t_lang("status-ready", language_code),
            "failed" | "error" => t_lang("status-failed", language_code),
            _ => t_lang("status-training", language_code),
        };
        result.push_str(&format!("\n🔹 {} — {}", model.name, status_label));
    }
    result
}
