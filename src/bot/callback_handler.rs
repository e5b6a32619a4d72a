//! Callback Handler module for processing inline keyboard callback queries
//!
//! Callback ids are parsed by prefix; where one button id is reachable from
//! two flows (the model-type picker), the user's state decides which flow
//! it belongs to. A webhook failure keeps the user's state so the retry
//! button re-enters the same confirm step.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{debug, info, warn};

use crate::api_client::{ModelSummary, TrainingRequest};
use crate::config::MAX_MODEL_NAME_LEN;
use crate::localization::{t_args_lang, t_lang};
use crate::state::UserState;

use super::message_handler::{
    cancel_flow, list_models, remember_contact, show_credits, start_generate_flow,
    start_train_flow,
};
use super::ui_builder::{
    cancel_keyboard, generation_retry_keyboard, home_keyboard, main_menu_keyboard,
    media_group_retry_keyboard, training_retry_keyboard,
};
use super::{edit_or_send, AppDeps};

/// Handle callback queries from inline keyboards
pub async fn handle_callback(bot: &Bot, q: &CallbackQuery, deps: &Arc<AppDeps>) -> Result<()> {
    let user_id = q.from.id.0 as i64;
    let language_code = q.from.language_code.clone();
    let language_code = language_code.as_deref();
    let chat_id = q
        .message
        .as_ref()
        .map(|message| message.chat().id)
        .unwrap_or(ChatId(user_id));
    let data = q.data.as_deref().unwrap_or("");

    debug!(user_id, data, "Received callback query from user");
    remember_contact(deps, user_id, chat_id, language_code);

    if let Some(command) = data.strip_prefix("cmd_") {
        handle_menu_command(bot, chat_id, user_id, language_code, deps, command).await?;
    } else if let Some(model_type) = data.strip_prefix("type_") {
        handle_type_selection(bot, chat_id, user_id, language_code, deps, model_type).await?;
    } else if let Some(group_id) = data.strip_prefix("start_training_") {
        handle_media_group_confirm(bot, chat_id, user_id, language_code, deps, group_id).await?;
    } else if data == "start_training" {
        handle_training_confirm(bot, chat_id, user_id, language_code, deps).await?;
    } else if let Some(model_id) = data.strip_prefix("model_") {
        handle_model_selection(bot, chat_id, user_id, language_code, deps, model_id).await?;
    } else if data == "start_generation" {
        handle_generation_confirm(bot, chat_id, user_id, language_code, deps).await?;
    } else if data == "edit_prompt" {
        handle_edit_prompt(bot, chat_id, user_id, language_code, deps).await?;
    } else if data.starts_with("cancel_") {
        cancel_flow(bot, chat_id, user_id, language_code, deps).await?;
    } else {
        warn!(user_id, data, "Unknown callback data");
        bot.send_message(chat_id, t_lang("unknown-input", language_code))
            .await?;
    }

    // Answer the callback query to remove the loading state
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn handle_menu_command(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
    command: &str,
) -> Result<()> {
    match command {
        "start" => {
            deps.state.reset_state(user_id);
            bot.send_message(chat_id, t_lang("welcome-message", language_code))
                .reply_markup(main_menu_keyboard(language_code))
                .await?;
        }
        "train" => start_train_flow(bot, chat_id, user_id, language_code, deps).await?,
        "generate" => start_generate_flow(bot, chat_id, user_id, language_code, deps).await?,
        "models" => list_models(bot, chat_id, user_id, language_code, deps).await?,
        "credits" => show_credits(bot, chat_id, user_id, language_code, deps).await?,
        other => {
            warn!(user_id, command = other, "Unknown menu command");
            bot.send_message(chat_id, t_lang("unknown-input", language_code))
                .await?;
        }
    }
    Ok(())
}

async fn handle_type_selection(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
    model_type: &str,
) -> Result<()> {
    if !matches!(model_type, "male" | "female") {
        warn!(user_id, model_type, "Unknown model type in callback");
        return Ok(());
    }

    match deps.state.get_state(user_id) {
        UserState::SelectingModelType => {
            deps.state.set_data(user_id, "model_type", json!(model_type));
            deps.state.set_state(user_id, UserState::UploadingPhotos);
            info!(user_id, model_type, "Model type selected, waiting for photos");
            bot.send_message(
                chat_id,
                t_args_lang(
                    "upload-instructions",
                    language_code,
                    &[("count", deps.config.max_photos.to_string())],
                ),
            )
            .reply_markup(cancel_keyboard(language_code, "cancel_training"))
            .await?;
        }
        UserState::SelectingModelTypeForMediaGroup => {
            deps.state.set_data(user_id, "model_type", json!(model_type));
            let Some(group_id) = deps.state.get_string(user_id, "media_group_id") else {
                warn!(user_id, "Media group id missing at type selection");
                deps.state.reset_state(user_id);
                bot.send_message(chat_id, t_lang("flow-state-lost", language_code))
                    .reply_markup(main_menu_keyboard(language_code))
                    .await?;
                return Ok(());
            };
            dispatch_media_group_training(bot, chat_id, user_id, language_code, deps, &group_id)
                .await?;
        }
        state => {
            debug!(user_id, ?state, "Type button outside of a type-selection step");
        }
    }
    Ok(())
}

/// Confirm button of the one-at-a-time upload flow.
async fn handle_training_confirm(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
) -> Result<()> {
    let photos = deps.state.get_string_list(user_id, "photos");
    if photos.is_empty() {
        warn!(user_id, "Training confirmed with no photos in scratch");
        deps.state.reset_state(user_id);
        bot.send_message(chat_id, t_lang("flow-state-lost", language_code))
            .reply_markup(main_menu_keyboard(language_code))
            .await?;
        return Ok(());
    }

    let model_name = deps
        .state
        .get_string(user_id, "model_name")
        .unwrap_or_else(|| synthesized_model_name(user_id));
    let model_type = deps
        .state
        .get_string(user_id, "model_type")
        .unwrap_or_else(|| "default".to_string());

    deps.state.set_state(user_id, UserState::TrainingModel);
    let request = TrainingRequest {
        model_name: model_name.clone(),
        model_type: model_type.clone(),
        file_paths: photos.clone(),
        telegram_id: user_id,
        photo_quality: deps.config.photo_quality,
        max_photo_size: deps.config.max_photo_dimension,
    };

    match deps.api.start_training(&request).await {
        Ok(()) => {
            deps.db
                .create_model(user_id, &model_name, &model_type, "training")
                .await;
            bot.send_message(
                chat_id,
                t_args_lang(
                    "training-started",
                    language_code,
                    &[("count", photos.len().to_string())],
                ),
            )
            .reply_markup(home_keyboard(language_code))
            .await?;
            deps.state.reset_state(user_id);
        }
        Err(e) => {
            warn!(user_id, error = %e, "Training webhook failed");
            // State stays put so the retry button re-enters this step.
            bot.send_message(chat_id, t_lang("training-failed", language_code))
                .reply_markup(training_retry_keyboard(language_code))
                .await?;
        }
    }
    Ok(())
}

/// Confirm button attached to a finalized media group.
async fn handle_media_group_confirm(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
    group_id: &str,
) -> Result<()> {
    if !deps.media_groups.contains(group_id).await {
        warn!(user_id, group_id, "Confirmed media group no longer exists");
        deps.state.reset_state(user_id);
        bot.send_message(chat_id, t_lang("media-group-missing", language_code))
            .reply_markup(main_menu_keyboard(language_code))
            .await?;
        return Ok(());
    }

    if deps.state.get_string(user_id, "model_name").is_none() {
        // Album arrived before any /train dialogue: collect a name first.
        deps.state
            .set_data(user_id, "media_group_id", json!(group_id));
        deps.state
            .set_state(user_id, UserState::EnteringModelNameForMediaGroup);
        bot.send_message(
            chat_id,
            t_args_lang(
                "media-group-name-prompt",
                language_code,
                &[("max", MAX_MODEL_NAME_LEN.to_string())],
            ),
        )
        .reply_markup(cancel_keyboard(language_code, "cancel_training"))
        .await?;
        return Ok(());
    }

    dispatch_media_group_training(bot, chat_id, user_id, language_code, deps, group_id).await
}

/// Forward a finalized media group to the training webhook. The buffer is
/// deleted only when the dispatch succeeds.
async fn dispatch_media_group_training(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
    group_id: &str,
) -> Result<()> {
    let Some(file_paths) = deps.media_groups.file_paths(group_id).await else {
        warn!(user_id, group_id, "Media group vanished before dispatch");
        deps.state.reset_state(user_id);
        bot.send_message(chat_id, t_lang("media-group-missing", language_code))
            .reply_markup(main_menu_keyboard(language_code))
            .await?;
        return Ok(());
    };

    let model_name = deps
        .state
        .get_string(user_id, "model_name")
        .unwrap_or_else(|| synthesized_model_name(user_id));
    let model_type = deps
        .state
        .get_string(user_id, "model_type")
        .unwrap_or_else(|| "default".to_string());
    let status_message_id = deps.media_groups.status_message_id(group_id).await;

    deps.state.set_state(user_id, UserState::TrainingModel);
    let request = TrainingRequest {
        model_name: model_name.clone(),
        model_type: model_type.clone(),
        file_paths: file_paths.clone(),
        telegram_id: user_id,
        photo_quality: deps.config.photo_quality,
        max_photo_size: deps.config.max_photo_dimension,
    };

    match deps.api.start_training(&request).await {
        Ok(()) => {
            info!(user_id, group_id, photos = file_paths.len(), "Media group dispatched");
            deps.db
                .create_model(user_id, &model_name, &model_type, "training")
                .await;
            let text = t_args_lang(
                "training-started",
                language_code,
                &[("count", file_paths.len().to_string())],
            );
            edit_or_send(
                bot,
                chat_id,
                status_message_id,
                &text,
                Some(home_keyboard(language_code)),
            )
            .await?;
            deps.media_groups.remove(group_id).await;
            deps.state.clear_data(user_id, Some("media_group_id"));
            deps.state.reset_state(user_id);
        }
        Err(e) => {
            warn!(user_id, group_id, error = %e, "Media group training webhook failed");
            let text = t_lang("training-failed", language_code);
            edit_or_send(
                bot,
                chat_id,
                status_message_id,
                &text,
                Some(media_group_retry_keyboard(language_code, group_id)),
            )
            .await?;
        }
    }
    Ok(())
}

async fn handle_model_selection(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
    model_id: &str,
) -> Result<()> {
    if deps.state.get_state(user_id) != UserState::SelectingModel {
        debug!(user_id, "Model button outside of model selection");
        return Ok(());
    }
    let Ok(model_id) = model_id.parse::<i64>() else {
        warn!(user_id, model_id, "Malformed model id in callback");
        bot.send_message(chat_id, t_lang("unknown-input", language_code))
            .await?;
        return Ok(());
    };

    deps.state.set_data(user_id, "model_id", json!(model_id));
    deps.state.set_state(user_id, UserState::EnteringPrompt);
    info!(user_id, model_id, "Model selected for generation");

    let model_name = resolve_model_name(deps, user_id, model_id, language_code).await;
    let text = format!(
        "{}\n\n{}",
        t_args_lang("model-chosen", language_code, &[("name", model_name)]),
        t_lang("enter-prompt", language_code)
    );
    bot.send_message(chat_id, text)
        .reply_markup(cancel_keyboard(language_code, "cancel_generation"))
        .await?;
    Ok(())
}

/// Name for the chosen model: cached listing first, then the persistent
/// store, then a numbered placeholder.
async fn resolve_model_name(
    deps: &Arc<AppDeps>,
    user_id: i64,
    model_id: i64,
    language_code: Option<&str>,
) -> String {
    let cached: Option<Vec<ModelSummary>> = deps
        .state
        .get_data(user_id, "user_models")
        .and_then(|value| serde_json::from_value(value).ok());
    if let Some(name) = cached.and_then(|models| {
        models
            .into_iter()
            .find(|model| model.model_id == model_id)
            .and_then(|model| model.name)
            .filter(|name| !name.is_empty())
    }) {
        return name;
    }
    if let Some(model) = deps.db.get_model_details(model_id).await {
        return model.name;
    }
    t_args_lang(
        "model-fallback-name",
        language_code,
        &[("id", model_id.to_string())],
    )
}

async fn handle_generation_confirm(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
) -> Result<()> {
    let (Some(model_id), Some(prompt)) = (
        deps.state.get_i64(user_id, "model_id"),
        deps.state.get_string(user_id, "prompt"),
    ) else {
        warn!(user_id, "Generation confirmed without model id or prompt");
        deps.state.reset_state(user_id);
        bot.send_message(chat_id, t_lang("flow-state-lost", language_code))
            .reply_markup(main_menu_keyboard(language_code))
            .await?;
        return Ok(());
    };

    match deps
        .api
        .generate_images(model_id, &prompt, user_id, deps.config.default_num_images)
        .await
    {
        Ok(prompt_id) => {
            info!(user_id, model_id, ?prompt_id, "Generation dispatched");
            deps.db
                .create_prompt(user_id, model_id, &prompt, "processing")
                .await;
            bot.send_message(chat_id, t_lang("generation-started", language_code))
                .reply_markup(home_keyboard(language_code))
                .await?;
            deps.state.reset_state(user_id);
        }
        Err(e) => {
            warn!(user_id, model_id, error = %e, "Generation webhook failed");
            bot.send_message(chat_id, t_lang("generation-failed", language_code))
                .reply_markup(generation_retry_keyboard(language_code))
                .await?;
        }
    }
    Ok(())
}

async fn handle_edit_prompt(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    language_code: Option<&str>,
    deps: &Arc<AppDeps>,
) -> Result<()> {
    deps.state.set_state(user_id, UserState::EnteringPrompt);
    bot.send_message(chat_id, t_lang("enter-new-prompt", language_code))
        .reply_markup(cancel_keyboard(language_code, "cancel_generation"))
        .await?;
    Ok(())
}

/// Fallback name when the user never entered one: unique enough to not
/// collide across retries of the same batch.
pub fn synthesized_model_name(user_id: i64) -> String {
    format!("model_{}_{}", user_id, Utc::now().format("%Y%m%d%H%M%S"))
}
