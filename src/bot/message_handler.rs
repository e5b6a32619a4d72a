//! Message Handler module for processing incoming Telegram messages
//!
//! Commands are matched first; anything else is routed by the user's
//! current conversation state. Length limits are enforced before any state
//! transition — an oversized name or prompt leaves the user exactly where
//! they were.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{debug, info, warn};

use crate::config::{MAX_MODEL_NAME_LEN, MAX_PROMPT_LEN};
use crate::localization::{t_args_lang, t_lang};
use crate::state::{validate_model_name, validate_prompt, UserState};

use super::ui_builder::{
    cancel_keyboard, format_models_list, generation_confirm_keyboard, home_keyboard,
    main_menu_keyboard, model_type_keyboard, models_keyboard,
};
use super::AppDeps;

pub async fn handle_message(bot: &Bot, msg: &Message, deps: &Arc<AppDeps>) -> Result<()> {
    if msg.text().is_some() {
        handle_text_message(bot, msg, deps).await
    } else if msg.photo().is_some() {
        super::media_handler::handle_photo_message(bot, msg, deps).await
    } else {
        handle_unsupported_message(bot, msg).await
    }
}

async fn handle_text_message(bot: &Bot, msg: &Message, deps: &Arc<AppDeps>) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let text = msg.text().unwrap_or_default();
    let language_code = user.language_code.as_deref();

    debug!(user_id, message_length = text.len(), "Received text message from user");
    remember_contact(deps, user_id, msg.chat.id, language_code);

    match text.trim() {
        "/start" => return handle_start(bot, msg, deps).await,
        "/help" => {
            bot.send_message(msg.chat.id, t_lang("help-message", language_code))
                .await?;
            return Ok(());
        }
        "/train" => return start_train_flow(bot, msg.chat.id, user_id, language_code, deps).await,
        "/generate" => {
            return start_generate_flow(bot, msg.chat.id, user_id, language_code, deps).await
        }
        "/models" => return list_models(bot, msg.chat.id, user_id, language_code, deps).await,
        "/credits" => return show_credits(bot, msg.chat.id, user_id, language_code, deps).await,
        "/cancel" => return cancel_flow(bot, msg.chat.id, user_id, language_code, deps).await,
        _ => {}
    }

    match deps.state.get_state(user_id) {
        UserState::EnteringModelName => {
            handle_model_name_input(bot, msg.chat.id, user_id, text, language_code, deps, false)
                .await
        }
        UserState::EnteringModelNameForMediaGroup => {
            handle_model_name_input(bot, msg.chat.id, user_id, text, language_code, deps, true)
                .await
        }
        UserState::EnteringPrompt => {
            handle_prompt_input(bot, msg.chat.id, user_id, text, language_code, deps).await
        }
        state => {
            debug!(user_id, ?state, "Text outside of any input state");
            bot.send_message(msg.chat.id, t_lang("unknown-input", language_code))
                .await?;
            Ok(())
        }
    }
}

async fn handle_start(bot: &Bot, msg: &Message, deps: &Arc<AppDeps>) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let language_code = user.language_code.as_deref();
    let username = user.username.as_deref();
    let first_name = Some(user.first_name.as_str());

    // Lazy registration: first /start creates the row, later ones refresh it.
    match deps.db.get_user(user_id).await {
        Some(_) => {
            deps.db.update_user(user_id, username, first_name).await;
        }
        None => {
            deps.db.create_user(user_id, username, first_name).await;
            info!(user_id, "Registered new user");
        }
    }

    deps.state.reset_state(user_id);
    bot.send_message(msg.chat.id, t_lang("welcome-message", language_code))
        .reply_markup(main_menu_keyboard(language_code))
        .await?;
    Ok(())
}

/// Entry point shared by /train and the `cmd_train` menu button.
pub async fn start_train_flow(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
) -> Result<()> {
    info!(user_id, "Starting training flow");
    // A fresh flow must not inherit the previous model's name or photos.
    deps.state
        .clear_data_except(user_id, &["chat_id", "language_code"]);
    deps.state.set_state(user_id, UserState::EnteringModelName);

    bot.send_message(
        chat_id,
        t_args_lang(
            "train-intro",
            language_code,
            &[("max", MAX_MODEL_NAME_LEN.to_string())],
        ),
    )
    .reply_markup(cancel_keyboard(language_code, "cancel_training"))
    .await?;
    Ok(())
}

/// Entry point shared by /generate and the `cmd_generate` menu button.
pub async fn start_generate_flow(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
) -> Result<()> {
    info!(user_id, "Starting generation flow");

    // The listing is cached in scratch; the relay drops the cache when a
    // training run completes.
    let cached = deps
        .state
        .get_data(user_id, "user_models")
        .and_then(|value| serde_json::from_value(value).ok());
    let models: Vec<crate::api_client::ModelSummary> = match cached {
        Some(models) => models,
        None => match deps.api.fetch_models(user_id).await {
            Ok(models) => {
                if let Ok(value) = serde_json::to_value(&models) {
                    deps.state.set_data(user_id, "user_models", value);
                }
                models
            }
            Err(e) => {
                warn!(user_id, error = %e, "Failed to fetch models for generation");
                bot.send_message(chat_id, t_lang("error-generic", language_code))
                    .reply_markup(home_keyboard(language_code))
                    .await?;
                return Ok(());
            }
        },
    };

    if models.is_empty() {
        bot.send_message(chat_id, t_lang("no-models", language_code))
            .reply_markup(main_menu_keyboard(language_code))
            .await?;
        return Ok(());
    }

    deps.state.set_state(user_id, UserState::SelectingModel);
    bot.send_message(chat_id, t_lang("choose-model", language_code))
        .reply_markup(models_keyboard(&models, language_code))
        .await?;
    Ok(())
}

pub async fn list_models(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
) -> Result<()> {
    let models = deps.db.get_user_models(user_id).await;
    let text = if models.is_empty() {
        t_lang("models-empty", language_code)
    } else {
        format_models_list(&models, language_code)
    };
    bot.send_message(chat_id, text)
        .reply_markup(main_menu_keyboard(language_code))
        .await?;
    Ok(())
}

pub async fn show_credits(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
) -> Result<()> {
    let text = match deps.api.fetch_credits(user_id).await {
        Ok(credits) => t_args_lang(
            "credits-balance",
            language_code,
            &[("credits", credits.to_string())],
        ),
        Err(e) => {
            warn!(user_id, error = %e, "Failed to fetch credits");
            t_lang("credits-failed", language_code)
        }
    };
    bot.send_message(chat_id, text)
        .reply_markup(main_menu_keyboard(language_code))
        .await?;
    Ok(())
}

pub async fn cancel_flow(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
) -> Result<()> {
    info!(user_id, "Cancelling current flow");
    if let Some(group_id) = deps.state.get_string(user_id, "media_group_id") {
        deps.media_groups.remove(&group_id).await;
    }
    deps.state.reset_state(user_id);
    bot.send_message(chat_id, t_lang("cancelled", language_code))
        .reply_markup(main_menu_keyboard(language_code))
        .await?;
    Ok(())
}

async fn handle_model_name_input(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    text: &str,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
    for_media_group: bool,
) -> Result<()> {
    let name = match validate_model_name(text) {
        Ok(name) => name,
        Err(reason) => {
            info!(user_id, reason, length = text.len(), "Rejected model name");
            bot.send_message(
                chat_id,
                t_args_lang(
                    "model-name-too-long",
                    language_code,
                    &[("max", MAX_MODEL_NAME_LEN.to_string())],
                ),
            )
            .await?;
            return Ok(());
        }
    };

    deps.state.set_data(user_id, "model_name", json!(name.as_str()));
    let next_state = if for_media_group {
        UserState::SelectingModelTypeForMediaGroup
    } else {
        UserState::SelectingModelType
    };
    deps.state.set_state(user_id, next_state);

    bot.send_message(
        chat_id,
        t_args_lang("model-name-saved", language_code, &[("name", name)]),
    )
    .reply_markup(model_type_keyboard(language_code))
    .await?;
    Ok(())
}

async fn handle_prompt_input(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    text: &str,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
) -> Result<()> {
    let prompt = match validate_prompt(text) {
        Ok(prompt) => prompt,
        Err(reason) => {
            info!(user_id, reason, length = text.len(), "Rejected prompt");
            bot.send_message(
                chat_id,
                t_args_lang(
                    "prompt-too-long",
                    language_code,
                    &[("max", MAX_PROMPT_LEN.to_string())],
                ),
            )
            .await?;
            return Ok(());
        }
    };

    deps.state.set_data(user_id, "prompt", json!(prompt.as_str()));
    deps.state.set_state(user_id, UserState::GeneratingImages);

    bot.send_message(
        chat_id,
        t_args_lang("prompt-saved", language_code, &[("prompt", prompt)]),
    )
    .reply_markup(generation_confirm_keyboard(language_code))
    .await?;
    Ok(())
}

async fn handle_unsupported_message(bot: &Bot, msg: &Message) -> Result<()> {
    let language_code = msg
        .from
        .as_ref()
        .and_then(|user| user.language_code.as_ref())
        .map(|s| s.as_str());
    debug!(chat_id = msg.chat.id.0, "Received unsupported message type");
    bot.send_message(msg.chat.id, t_lang("unknown-input", language_code))
        .await?;
    Ok(())
}

/// Keep the chat id and language around for flows and notifications that
/// outlive the current update.
pub fn remember_contact(
    deps: &Arc<AppDeps>,
    user_id: i64,
    chat_id: ChatId,
    language_code: Option<&str>,
) {
    deps.state.set_data(user_id, "chat_id", json!(chat_id.0));
    if let Some(code) = language_code {
        deps.state.set_data(user_id, "language_code", json!(code));
    }
}
