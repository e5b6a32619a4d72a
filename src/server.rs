//! # Notification Ingress Module
//!
//! Small HTTP surface the external service posts status updates to, plus a
//! health route for the hosting platform. Requests are authenticated with
//! the shared-secret header when one is configured.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::notifications::{NotificationRelay, StatusUpdate};

const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

pub struct Ingress {
    pub relay: NotificationRelay,
    pub webhook_secret: Option<String>,
}

pub fn router(ingress: Arc<Ingress>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/webhook", post(receive_update))
        .with_state(ingress)
}

pub async fn serve(addr: &str, ingress: Arc<Ingress>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind notification ingress on {addr}"))?;
    info!(addr, "Notification ingress listening");
    axum::serve(listener, router(ingress)).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "OK", "message": "Photoshoot bot is running" }))
}

async fn receive_update(
    State(ingress): State<Arc<Ingress>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if let Some(secret) = &ingress.webhook_secret {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(secret.as_str()) {
            warn!("Rejected ingress call with a bad secret token");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "invalid secret token" })),
            );
        }
    }

    // Transport updates reach us over long polling; a stray webhook copy of
    // one is not an error.
    if payload.get("update_id").is_some() {
        debug!("Ignoring transport update on the notification ingress");
        return (StatusCode::OK, Json(json!({ "status": "OK" })));
    }

    match serde_json::from_value::<StatusUpdate>(payload) {
        Ok(update) => match ingress.relay.handle_update(update).await {
            Ok(()) => (StatusCode::OK, Json(json!({ "status": "OK" }))),
            Err(e) => {
                error!(error = %e, "Failed to process status update");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": e.to_string() })),
                )
            }
        },
        Err(e) => {
            warn!(error = %e, "Received an unknown update type");
            (StatusCode::OK, Json(json!({ "status": "ignored" })))
        }
    }
}
