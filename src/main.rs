use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use photoshoot_bot::api_client::ApiClient;
use photoshoot_bot::bot::{callback_endpoint, message_endpoint, AppDeps};
use photoshoot_bot::config::Config;
use photoshoot_bot::db::Db;
use photoshoot_bot::media_group::MediaGroupAggregator;
use photoshoot_bot::notifications::NotificationRelay;
use photoshoot_bot::server::{self, Ingress};
use photoshoot_bot::state::StateManager;

/// How often idle sessions and abandoned media groups are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Photoshoot Telegram Bot");

    let config = Config::from_env()?;
    let db = Db::connect(&config.database_url).await?;
    let api = ApiClient::new(&config)?;
    let state = Arc::new(StateManager::new());
    let media_groups = Arc::new(MediaGroupAggregator::new());
    let bot = Bot::new(&config.telegram_bot_token);

    // Notification ingress: the external service posts status updates here.
    let relay = NotificationRelay::new(bot.clone(), Arc::clone(&state), db.clone());
    let ingress = Arc::new(Ingress {
        relay,
        webhook_secret: config.webhook_secret.clone(),
    });
    let bind_addr = config.notify_bind_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = server::serve(&bind_addr, ingress).await {
            error!(error = %e, "Notification ingress server failed");
        }
    });

    // Periodic sweep of idle sessions and abandoned media-group buffers.
    let session_ttl = Duration::from_secs(config.session_ttl_hours * 3600);
    {
        let state = Arc::clone(&state);
        let media_groups = Arc::clone(&media_groups);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let sessions = state.cleanup_inactive_sessions(session_ttl);
                let groups = media_groups.sweep_stale(session_ttl).await;
                if sessions + groups > 0 {
                    info!(sessions, groups, "Swept idle sessions and media groups");
                }
            }
        });
    }

    let deps = Arc::new(AppDeps {
        config,
        state,
        media_groups,
        api,
        db,
    });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_endpoint))
        .branch(Update::filter_callback_query().endpoint(callback_endpoint));

    info!("Bot initialized, starting dispatcher");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![deps])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
