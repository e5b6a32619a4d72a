//! # External API Client Module
//!
//! Outbound calls to the training/generation service webhooks. Calls share
//! one `reqwest::Client` with the configured timeout; a timed-out call is a
//! failure, never retried automatically — retry stays a user decision.
//!
//! Failures are logged with the endpoint, status and a truncated response
//! body so a bad deploy on the other side can be diagnosed from bot logs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::config::Config;

/// Longest response-body slice that ends up in logs.
const LOG_BODY_LIMIT: usize = 500;

/// Payload of the training webhook.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingRequest {
    pub model_name: String,
    pub model_type: String,
    pub file_paths: Vec<String>,
    pub telegram_id: i64,
    /// Compression targets for the external resize pipeline.
    pub photo_quality: u8,
    pub max_photo_size: u32,
}

/// One model as reported by the models webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    #[serde(alias = "id")]
    pub model_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model_id: i64,
    prompt: &'a str,
    telegram_id: i64,
    num_images: u32,
}

#[derive(Debug, Serialize)]
struct TelegramIdRequest {
    telegram_id: i64,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    training_webhook_url: String,
    generation_webhook_url: String,
    models_webhook_url: String,
    credits_webhook_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            training_webhook_url: config.training_webhook_url.clone(),
            generation_webhook_url: config.generation_webhook_url.clone(),
            models_webhook_url: config.models_webhook_url.clone(),
            credits_webhook_url: config.credits_webhook_url.clone(),
        })
    }

    /// Submit a training batch. Completion arrives later through the
    /// notification ingress.
    pub async fn start_training(&self, request: &TrainingRequest) -> Result<()> {
        info!(
            model_name = %request.model_name,
            model_type = %request.model_type,
            photos = request.file_paths.len(),
            telegram_id = request.telegram_id,
            "Submitting training batch"
        );
        let response = self
            .http
            .post(&self.training_webhook_url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.training_webhook_url))?;
        require_success(&self.training_webhook_url, response).await?;
        Ok(())
    }

    /// Start image generation. Returns the prompt id when the service
    /// replies with one synchronously.
    pub async fn generate_images(
        &self,
        model_id: i64,
        prompt: &str,
        telegram_id: i64,
        num_images: u32,
    ) -> Result<Option<i64>> {
        info!(model_id, telegram_id, num_images, "Submitting generation request");
        let request = GenerationRequest {
            model_id,
            prompt,
            telegram_id,
            num_images,
        };
        let response = self
            .http
            .post(&self.generation_webhook_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.generation_webhook_url))?;
        let response = require_success(&self.generation_webhook_url, response).await?;

        // The body is informational; a non-JSON reply still counts as
        // accepted.
        let prompt_id = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("prompt_id").and_then(|id| id.as_i64()));
        Ok(prompt_id)
    }

    /// Models available for generation, as the external service sees them.
    pub async fn fetch_models(&self, telegram_id: i64) -> Result<Vec<ModelSummary>> {
        let response = self
            .http
            .post(&self.models_webhook_url)
            .json(&TelegramIdRequest { telegram_id })
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.models_webhook_url))?;
        let response = require_success(&self.models_webhook_url, response).await?;
        let models = response
            .json::<Vec<ModelSummary>>()
            .await
            .with_context(|| format!("{} returned malformed JSON", self.models_webhook_url))?;
        info!(telegram_id, count = models.len(), "Fetched user models");
        Ok(models)
    }

    /// Credit balance; the service answers with a bare number.
    pub async fn fetch_credits(&self, telegram_id: i64) -> Result<i64> {
        let response = self
            .http
            .post(&self.credits_webhook_url)
            .json(&TelegramIdRequest { telegram_id })
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.credits_webhook_url))?;
        let response = require_success(&self.credits_webhook_url, response).await?;
        let body = response.text().await.unwrap_or_default();
        let credits = body.trim().parse::<i64>().with_context(|| {
            format!(
                "{} returned a non-numeric balance: {}",
                self.credits_webhook_url,
                truncate_chars(&body, LOG_BODY_LIMIT)
            )
        })?;
        Ok(credits)
    }
}

async fn require_success(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!(
        endpoint,
        status = %status,
        body = %truncate_chars(&body, LOG_BODY_LIMIT),
        "Webhook call failed"
    );
    anyhow::bail!("{endpoint} returned {status}")
}

/// Truncate on a character boundary so logging can't panic mid-codepoint.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
