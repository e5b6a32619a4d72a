//! # Persistent Store Module
//!
//! Thin data-access layer over the Postgres tables shared with the external
//! service (`telegram_users`, `telegram_models`, `telegram_prompts`).
//!
//! Every operation maps both "not found" and a database error to
//! `None`/empty, logging the error. Conversation handlers treat the store as
//! best-effort and must keep working when it is unavailable.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{debug, error};

/// Credits granted to a newly registered user.
const STARTING_CREDITS: i64 = 500;

#[derive(Debug, Clone, FromRow)]
pub struct TelegramUser {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub credits: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TelegramModel {
    pub id: i64,
    pub telegram_user_id: i64,
    pub name: String,
    #[sqlx(rename = "type")]
    pub model_type: String,
    pub status: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TelegramPrompt {
    pub id: i64,
    pub telegram_user_id: i64,
    pub model_id: i64,
    pub prompt: String,
    pub status: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn get_user(&self, telegram_id: i64) -> Option<TelegramUser> {
        let result = sqlx::query_as::<_, TelegramUser>(
            "SELECT * FROM telegram_users WHERE telegram_id = $1",
        )
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await;
        match result {
            Ok(user) => user,
            Err(e) => {
                error!(telegram_id, error = %e, "Failed to fetch user");
                None
            }
        }
    }

    pub async fn create_user(
        &self,
        telegram_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
    ) -> Option<TelegramUser> {
        let result = sqlx::query_as::<_, TelegramUser>(
            "INSERT INTO telegram_users (telegram_id, username, first_name, credits)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(telegram_id)
        .bind(username)
        .bind(first_name)
        .bind(STARTING_CREDITS)
        .fetch_optional(&self.pool)
        .await;
        match result {
            Ok(user) => {
                debug!(telegram_id, "Created user");
                user
            }
            Err(e) => {
                error!(telegram_id, error = %e, "Failed to create user");
                None
            }
        }
    }

    pub async fn update_user(
        &self,
        telegram_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
    ) -> Option<TelegramUser> {
        let result = sqlx::query_as::<_, TelegramUser>(
            "UPDATE telegram_users SET username = $2, first_name = $3
             WHERE telegram_id = $1
             RETURNING *",
        )
        .bind(telegram_id)
        .bind(username)
        .bind(first_name)
        .fetch_optional(&self.pool)
        .await;
        match result {
            Ok(user) => user,
            Err(e) => {
                error!(telegram_id, error = %e, "Failed to update user");
                None
            }
        }
    }

    pub async fn get_user_models(&self, telegram_id: i64) -> Vec<TelegramModel> {
        let result = sqlx::query_as::<_, TelegramModel>(
            "SELECT * FROM telegram_models WHERE telegram_user_id = $1 ORDER BY created_at",
        )
        .bind(telegram_id)
        .fetch_all(&self.pool)
        .await;
        match result {
            Ok(models) => models,
            Err(e) => {
                error!(telegram_id, error = %e, "Failed to fetch user models");
                Vec::new()
            }
        }
    }

    pub async fn get_model_details(&self, model_id: i64) -> Option<TelegramModel> {
        let result =
            sqlx::query_as::<_, TelegramModel>("SELECT * FROM telegram_models WHERE id = $1")
                .bind(model_id)
                .fetch_optional(&self.pool)
                .await;
        match result {
            Ok(model) => model,
            Err(e) => {
                error!(model_id, error = %e, "Failed to fetch model details");
                None
            }
        }
    }

    pub async fn create_model(
        &self,
        telegram_user_id: i64,
        name: &str,
        model_type: &str,
        status: &str,
    ) -> Option<TelegramModel> {
        let result = sqlx::query_as::<_, TelegramModel>(
            "INSERT INTO telegram_models (telegram_user_id, name, type, status)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(telegram_user_id)
        .bind(name)
        .bind(model_type)
        .bind(status)
        .fetch_optional(&self.pool)
        .await;
        match result {
            Ok(model) => {
                debug!(telegram_user_id, name, "Created model");
                model
            }
            Err(e) => {
                error!(telegram_user_id, error = %e, "Failed to create model");
                None
            }
        }
    }

    pub async fn update_model(
        &self,
        model_id: i64,
        status: &str,
        error_text: Option<&str>,
    ) -> Option<TelegramModel> {
        let result = sqlx::query_as::<_, TelegramModel>(
            "UPDATE telegram_models SET status = $2, error = $3
             WHERE id = $1
             RETURNING *",
        )
        .bind(model_id)
        .bind(status)
        .bind(error_text)
        .fetch_optional(&self.pool)
        .await;
        match result {
            Ok(model) => model,
            Err(e) => {
                error!(model_id, error = %e, "Failed to update model");
                None
            }
        }
    }

    pub async fn create_prompt(
        &self,
        telegram_user_id: i64,
        model_id: i64,
        prompt: &str,
        status: &str,
    ) -> Option<TelegramPrompt> {
        let result = sqlx::query_as::<_, TelegramPrompt>(
            "INSERT INTO telegram_prompts (telegram_user_id, model_id, prompt, status)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(telegram_user_id)
        .bind(model_id)
        .bind(prompt)
        .bind(status)
        .fetch_optional(&self.pool)
        .await;
        match result {
            Ok(prompt) => {
                debug!(telegram_user_id, model_id, "Created prompt");
                prompt
            }
            Err(e) => {
                error!(telegram_user_id, error = %e, "Failed to create prompt");
                None
            }
        }
    }

    pub async fn update_prompt(
        &self,
        prompt_id: i64,
        status: &str,
        error_text: Option<&str>,
    ) -> Option<TelegramPrompt> {
        let result = sqlx::query_as::<_, TelegramPrompt>(
            "UPDATE telegram_prompts SET status = $2, error = $3
             WHERE id = $1
             RETURNING *",
        )
        .bind(prompt_id)
        .bind(status)
        .bind(error_text)
        .fetch_optional(&self.pool)
        .await;
        match result {
            Ok(prompt) => prompt,
            Err(e) => {
                error!(prompt_id, error = %e, "Failed to update prompt");
                None
            }
        }
    }
}
