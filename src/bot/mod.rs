//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: commands and state-routed text messages
//! - `media_handler`: single photos and media-group albums
//! - `callback_handler`: inline keyboard callback queries
//! - `ui_builder`: keyboards and message formatting
//!
//! The endpoint wrappers here form the dispatch boundary: a handler error is
//! logged, the affected user gets a generic failure message, the configured
//! admin gets the details, and the dispatcher keeps serving everyone else.

pub mod callback_handler;
pub mod media_handler;
pub mod message_handler;
pub mod ui_builder;

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, MessageId};
use tracing::{error, warn};

use crate::api_client::ApiClient;
use crate::config::Config;
use crate::db::Db;
use crate::localization::t_lang;
use crate::media_group::MediaGroupAggregator;
use crate::state::StateManager;

/// Shared application state, accessible from all handlers.
pub struct AppDeps {
    pub config: Config,
    pub state: Arc<StateManager>,
    pub media_groups: Arc<MediaGroupAggregator>,
    pub api: ApiClient,
    pub db: Db,
}

pub async fn message_endpoint(bot: Bot, msg: Message, deps: Arc<AppDeps>) -> Result<()> {
    if let Err(err) = message_handler::handle_message(&bot, &msg, &deps).await {
        let user_id = msg.from.as_ref().map(|user| user.id.0 as i64);
        report_handler_error(&bot, &deps, msg.chat.id, user_id, &err).await;
    }
    Ok(())
}

pub async fn callback_endpoint(bot: Bot, q: CallbackQuery, deps: Arc<AppDeps>) -> Result<()> {
    let user_id = q.from.id.0 as i64;
    let chat_id = q
        .message
        .as_ref()
        .map(|message| message.chat().id)
        .unwrap_or(ChatId(user_id));
    if let Err(err) = callback_handler::handle_callback(&bot, &q, &deps).await {
        report_handler_error(&bot, &deps, chat_id, Some(user_id), &err).await;
    }
    Ok(())
}

/// Dispatch-boundary catch-all: one user's failure must not take the loop
/// down, and the admin hears about it.
async fn report_handler_error(
    bot: &Bot,
    deps: &Arc<AppDeps>,
    chat_id: ChatId,
    user_id: Option<i64>,
    err: &anyhow::Error,
) {
    error!(chat_id = chat_id.0, error = %format!("{err:#}"), "Handler failed");

    let language_code = user_id.and_then(|id| deps.state.get_string(id, "language_code"));
    if let Err(send_err) = bot
        .send_message(chat_id, t_lang("error-generic", language_code.as_deref()))
        .await
    {
        error!(chat_id = chat_id.0, error = %send_err, "Failed to notify user about an error");
    }

    if let Some(admin_id) = deps.config.admin_telegram_id {
        let details = format!("⚠️ Handler error for chat {}: {err:#}", chat_id.0);
        if let Err(send_err) = bot.send_message(ChatId(admin_id), details).await {
            error!(admin_id, error = %send_err, "Failed to escalate an error to the admin");
        }
    }
}

/// Edit a message in place, falling back to a fresh message when the target
/// no longer exists or cannot be edited.
pub async fn edit_or_send(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<i32>,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<()> {
    if let Some(message_id) = message_id {
        let edit = match keyboard.clone() {
            Some(kb) => {
                bot.edit_message_text(chat_id, MessageId(message_id), text)
                    .reply_markup(kb)
                    .await
            }
            None => bot.edit_message_text(chat_id, MessageId(message_id), text).await,
        };
        match edit {
            Ok(_) => return Ok(()),
            Err(e) => warn!(
                chat_id = chat_id.0,
                message_id,
                error = %e,
                "Edit failed, sending a new message instead"
            ),
        }
    }
    match keyboard {
        Some(kb) => {
            bot.send_message(chat_id, text).reply_markup(kb).await?;
        }
        None => {
            bot.send_message(chat_id, text).await?;
        }
    }
    Ok(())
}
