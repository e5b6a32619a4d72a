//! # Configuration Module
//!
//! All runtime options come from the environment (a `.env` file is loaded at
//! startup). Missing mandatory values abort the process; everything else has
//! a default suitable for local development.

use anyhow::{Context, Result};

/// Maximum length of a model name entered by the user.
pub const MAX_MODEL_NAME_LEN: usize = 30;
/// Maximum length of a generation prompt entered by the user.
pub const MAX_PROMPT_LEN: usize = 500;

#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot auth token (mandatory).
    pub telegram_bot_token: String,
    /// Postgres connection string for the persistent store (mandatory).
    pub database_url: String,
    /// Shared secret expected in the notification ingress header; empty
    /// disables the check.
    pub webhook_secret: Option<String>,
    /// Bind address for the notification ingress / health server.
    pub notify_bind_addr: String,
    /// Admin user for error escalation.
    pub admin_telegram_id: Option<i64>,
    /// Base URL of the external API; relative endpoint paths are joined
    /// onto it.
    pub api_base_url: String,
    pub training_webhook_url: String,
    pub generation_webhook_url: String,
    pub models_webhook_url: String,
    pub credits_webhook_url: String,
    /// Photos required for a non-album training batch.
    pub max_photos: usize,
    /// Images requested per generation.
    pub default_num_images: u32,
    /// Timeout applied to every outbound webhook call.
    pub http_timeout_secs: u64,
    /// Compression target forwarded to the training pipeline (0-100).
    pub photo_quality: u8,
    /// Longest-side target forwarded to the training pipeline, in pixels.
    pub max_photo_dimension: u32,
    /// Sessions (and abandoned media-group buffers) idle longer than this
    /// are swept.
    pub session_ttl_hours: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let telegram_bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .context("TELEGRAM_BOT_TOKEN must be set")?;
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let webhook_secret =
            std::env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());

        let port = env_or("PORT", "8080");
        let notify_bind_addr = format!("0.0.0.0:{port}");

        let admin_telegram_id = std::env::var("ADMIN_TELEGRAM_ID")
            .ok()
            .and_then(|v| v.trim().parse().ok());

        let api_base_url = env_or("API_BASE_URL", "http://localhost:3000");
        let training_webhook_url = resolve_endpoint(
            &api_base_url,
            &env_or("TRAIN_MODEL_ENDPOINT", "/api/bot/train-model"),
        );
        let generation_webhook_url = resolve_endpoint(
            &api_base_url,
            &env_or("GENERATE_IMAGES_ENDPOINT", "/api/bot/generate"),
        );
        let models_webhook_url = resolve_endpoint(
            &api_base_url,
            &env_or("MODELS_ENDPOINT", "/api/bot/my-models"),
        );
        let credits_webhook_url = resolve_endpoint(
            &api_base_url,
            &env_or("CREDITS_ENDPOINT", "/api/bot/my-credits"),
        );

        Ok(Self {
            telegram_bot_token,
            database_url,
            webhook_secret,
            notify_bind_addr,
            admin_telegram_id,
            api_base_url,
            training_webhook_url,
            generation_webhook_url,
            models_webhook_url,
            credits_webhook_url,
            max_photos: parse_or("MAX_PHOTOS", 4),
            default_num_images: parse_or("DEFAULT_NUM_IMAGES", 4),
            http_timeout_secs: parse_or("HTTP_TIMEOUT_SECS", 60),
            photo_quality: parse_or("PHOTO_QUALITY", 95),
            max_photo_dimension: parse_or("MAX_PHOTO_DIMENSION", 1024),
            session_ttl_hours: parse_or("SESSION_TTL_HOURS", 24),
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Join an endpoint onto the API base URL. Absolute URLs are taken as-is so
/// a single endpoint can be pointed at a different host.
pub fn resolve_endpoint(base: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_endpoint() {
        assert_eq!(
            resolve_endpoint("http://localhost:3000", "/api/bot/train-model"),
            "http://localhost:3000/api/bot/train-model"
        );
        assert_eq!(
            resolve_endpoint("http://localhost:3000/", "api/bot/generate"),
            "http://localhost:3000/api/bot/generate"
        );
    }

    #[test]
    fn test_resolve_absolute_endpoint() {
        assert_eq!(
            resolve_endpoint("http://localhost:3000", "https://hooks.example.com/start"),
            "https://hooks.example.com/start"
        );
    }
}
