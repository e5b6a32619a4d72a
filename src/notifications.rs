//! # Notification Relay Module
//!
//! Maps asynchronous status callbacks from the external service (model
//! trained, images generated) to direct messages. Delivery never consults
//! the user's conversational position — training runs for minutes and the
//! user has usually moved on.
//!
//! No deduplication is performed: if the upstream delivers the same status
//! twice, the user is notified twice.

use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{info, warn};

use crate::bot::ui_builder::image_actions_keyboard;
use crate::db::Db;
use crate::localization::{t_args_lang, t_lang};
use crate::state::StateManager;

/// Inbound status payload, discriminated by its `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum StatusUpdate {
    #[serde(rename = "model_status_update")]
    Model(ModelStatusUpdate),
    #[serde(rename = "prompt_status_update")]
    Prompt(PromptStatusUpdate),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelStatusUpdate {
    pub model_id: i64,
    pub status: String,
    pub telegram_id: i64,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptStatusUpdate {
    pub prompt_id: i64,
    pub status: String,
    pub telegram_id: i64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The service reports either of these for a finished training run.
pub fn model_training_succeeded(status: &str) -> bool {
    matches!(status, "completed" | "ready")
}

/// A successful training run invalidates the cached model listing, so the
/// next /generate re-fetches it. Failures leave the cache alone.
pub fn refresh_models_cache(state: &StateManager, update: &ModelStatusUpdate) {
    if model_training_succeeded(&update.status) {
        state.clear_data(update.telegram_id, Some("user_models"));
    }
}

/// User-facing text for a model status update.
pub fn model_status_message(update: &ModelStatusUpdate, language_code: Option<&str>) -> String {
    if model_training_succeeded(&update.status) {
        t_args_lang(
            "notify-model-ready",
            language_code,
            &[("id", update.model_id.to_string())],
        )
    } else {
        let error = update
            .error
            .clone()
            .unwrap_or_else(|| t_lang("unknown-error", language_code));
        t_args_lang("notify-model-failed", language_code, &[("error", error)])
    }
}

/// What a prompt status update turns into, before any transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptNotification {
    /// One intro message, then one photo message per image.
    Images { intro: String, images: Vec<String> },
    /// Completed but nothing attached — a data-consistency warning the user
    /// must see, exactly once.
    EmptyResult(String),
    Failed(String),
}

pub fn plan_prompt_notification(
    update: &PromptStatusUpdate,
    language_code: Option<&str>,
) -> PromptNotification {
    if update.status == "completed" {
        if update.images.is_empty() {
            PromptNotification::EmptyResult(t_lang("notify-images-empty", language_code))
        } else {
            PromptNotification::Images {
                intro: t_args_lang(
                    "notify-images-ready",
                    language_code,
                    &[("count", update.images.len().to_string())],
                ),
                images: update.images.clone(),
            }
        }
    } else {
        let error = update
            .error
            .clone()
            .unwrap_or_else(|| t_lang("unknown-error", language_code));
        PromptNotification::Failed(t_args_lang(
            "notify-images-failed",
            language_code,
            &[("error", error)],
        ))
    }
}

/// Delivers status updates to users and keeps the persistent store and the
/// cached model listing in step.
pub struct NotificationRelay {
    bot: Bot,
    state: Arc<StateManager>,
    db: Db,
}

impl NotificationRelay {
    pub fn new(bot: Bot, state: Arc<StateManager>, db: Db) -> Self {
        Self { bot, state, db }
    }

    pub async fn handle_update(&self, update: StatusUpdate) -> Result<()> {
        match update {
            StatusUpdate::Model(update) => self.on_model_status(update).await,
            StatusUpdate::Prompt(update) => self.on_prompt_status(update).await,
        }
    }

    async fn on_model_status(&self, update: ModelStatusUpdate) -> Result<()> {
        info!(
            model_id = update.model_id,
            status = %update.status,
            telegram_id = update.telegram_id,
            "Model status update"
        );
        self.db
            .update_model(update.model_id, &update.status, update.error.as_deref())
            .await;

        refresh_models_cache(&self.state, &update);

        let language_code = self.state.get_string(update.telegram_id, "language_code");
        let text = model_status_message(&update, language_code.as_deref());
        self.bot
            .send_message(ChatId(update.telegram_id), text)
            .await?;
        Ok(())
    }

    async fn on_prompt_status(&self, update: PromptStatusUpdate) -> Result<()> {
        info!(
            prompt_id = update.prompt_id,
            status = %update.status,
            telegram_id = update.telegram_id,
            images = update.images.len(),
            "Prompt status update"
        );
        self.db
            .update_prompt(update.prompt_id, &update.status, update.error.as_deref())
            .await;

        let language_code = self.state.get_string(update.telegram_id, "language_code");
        let language_code = language_code.as_deref();
        let chat_id = ChatId(update.telegram_id);

        match plan_prompt_notification(&update, language_code) {
            PromptNotification::Images { intro, images } => {
                self.bot.send_message(chat_id, intro).await?;
                for image_url in images {
                    if let Err(e) = self.send_image(chat_id, &image_url, language_code).await {
                        warn!(
                            telegram_id = update.telegram_id,
                            image_url = %image_url,
                            error = %e,
                            "Falling back to a plain link for an image"
                        );
                        self.bot.send_message(chat_id, image_url).await?;
                    }
                }
            }
            PromptNotification::EmptyResult(text) | PromptNotification::Failed(text) => {
                self.bot.send_message(chat_id, text).await?;
            }
        }
        Ok(())
    }

    async fn send_image(
        &self,
        chat_id: ChatId,
        image_url: &str,
        language_code: Option<&str>,
    ) -> Result<()> {
        let url = image_url
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid image URL: {e}"))?;
        self.bot
            .send_photo(chat_id, teloxide::types::InputFile::url(url))
            .reply_markup(image_actions_keyboard(language_code))
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for NotificationRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationRelay").finish_non_exhaustive()
    }
}
