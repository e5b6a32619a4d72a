//! Media Handler module for photo messages and media-group albums
//!
//! Single photos accumulate in the user's scratch until the batch is full;
//! album photos go through the media-group aggregator, which debounces the
//! burst and reports back once nothing new has arrived for a quiet period.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId};
use tracing::{debug, info, warn};

use crate::localization::{t_args_lang, t_lang};
use crate::media_group::{PhotoRegistration, FINALIZE_DELAY};
use crate::state::UserState;

use super::message_handler::remember_contact;
use super::ui_builder::{
    format_training_confirmation, media_group_ready_keyboard, training_confirm_keyboard,
};
use super::{edit_or_send, AppDeps};

pub async fn handle_photo_message(bot: &Bot, msg: &Message, deps: &Arc<AppDeps>) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let language_code = user.language_code.as_deref();

    debug!(user_id, "Received photo message from user");
    remember_contact(deps, user_id, msg.chat.id, language_code);

    if let Some(group_id) = msg.media_group_id() {
        let group_id = group_id.0.clone();
        return handle_media_group_photo(bot, msg, deps, group_id, user_id, language_code).await;
    }

    let state = deps.state.get_state(user_id);
    if state != UserState::UploadingPhotos {
        debug!(user_id, ?state, "Photo outside of the upload step");
        bot.send_message(msg.chat.id, t_lang("photos-not-expected", language_code))
            .await?;
        return Ok(());
    }

    let Some(file_url) = photo_file_url(bot, msg).await? else {
        return Ok(());
    };

    deps.state.add_to_list(user_id, "photos", json!(file_url));
    let photos = deps.state.get_string_list(user_id, "photos");
    let count = photos.len();
    info!(user_id, count, "Photo added to training batch");

    bot.send_message(
        msg.chat.id,
        super::ui_builder::format_photo_progress(language_code, count, deps.config.max_photos),
    )
    .await?;

    if count >= deps.config.max_photos {
        let model_name = deps
            .state
            .get_string(user_id, "model_name")
            .unwrap_or_else(|| "—".to_string());
        let model_type = deps
            .state
            .get_string(user_id, "model_type")
            .unwrap_or_else(|| "default".to_string());
        bot.send_message(
            msg.chat.id,
            format_training_confirmation(language_code, &model_name, &model_type, count),
        )
        .reply_markup(training_confirm_keyboard(language_code))
        .await?;
        info!(user_id, "Offered training confirmation");
    }
    Ok(())
}

async fn handle_media_group_photo(
    bot: &Bot,
    msg: &Message,
    deps: &Arc<AppDeps>,
    group_id: String,
    user_id: i64,
    language_code: Option<&str>,
) -> Result<()> {
    let chat_id = msg.chat.id;
    info!(user_id, %group_id, "Received media group photo");

    let Some(file_url) = photo_file_url(bot, msg).await? else {
        return Ok(());
    };

    match deps
        .media_groups
        .register_photo(&group_id, user_id, chat_id.0, file_url)
        .await
    {
        PhotoRegistration::ForeignUser => return Ok(()),
        PhotoRegistration::NewGroup { .. } => {
            let status = bot
                .send_message(chat_id, t_lang("media-group-collecting", language_code))
                .await?;
            deps.media_groups
                .set_status_message(&group_id, status.id.0)
                .await;
        }
        PhotoRegistration::Added {
            count,
            status_message_id,
        }
        | PhotoRegistration::AlreadyKnown {
            count,
            status_message_id,
        } => {
            if let Some(message_id) = status_message_id {
                let text = t_args_lang(
                    "media-group-progress",
                    language_code,
                    &[("count", count.to_string())],
                );
                if let Err(e) = bot
                    .edit_message_text(chat_id, MessageId(message_id), text)
                    .await
                {
                    warn!(%group_id, error = %e, "Failed to update media group status message");
                }
            }
        }
    }

    // Debounce: every photo replaces the pending finalize task, so the one
    // that eventually runs fires a full delay after the latest arrival.
    let task = tokio::spawn(finalize_after_quiet_period(
        bot.clone(),
        Arc::clone(deps),
        group_id.clone(),
        language_code.map(|code| code.to_string()),
    ));
    deps.media_groups.install_finalize_task(&group_id, task).await;
    Ok(())
}

async fn finalize_after_quiet_period(
    bot: Bot,
    deps: Arc<AppDeps>,
    group_id: String,
    language_code: Option<String>,
) {
    tokio::time::sleep(FINALIZE_DELAY).await;

    let Some(batch) = deps.media_groups.try_finalize(&group_id).await else {
        return;
    };
    let language_code = language_code.as_deref();
    let text = t_args_lang(
        "media-group-ready",
        language_code,
        &[("count", batch.photo_count.to_string())],
    );
    let keyboard = media_group_ready_keyboard(language_code, &group_id);
    if let Err(e) = edit_or_send(
        &bot,
        ChatId(batch.chat_id),
        batch.status_message_id,
        &text,
        Some(keyboard),
    )
    .await
    {
        warn!(%group_id, error = %e, "Failed to announce a ready media group");
    }
}

/// Resolve the largest size of an incoming photo to a downloadable URL —
/// the reference forwarded to the training webhook.
async fn photo_file_url(bot: &Bot, msg: &Message) -> Result<Option<String>> {
    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
        return Ok(None);
    };
    let file = bot.get_file(photo.file.id.clone()).await?;
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );
    Ok(Some(url))
}
