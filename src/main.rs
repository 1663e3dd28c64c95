mod commands;
mod config;
mod messages;
mod platform;
mod relay;
mod scheduler;
mod services;
mod session;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::CommandRegistry;
use crate::config::Config;
use crate::relay::Relay;
use crate::scheduler::tasks::register_builtin_tasks;
use crate::scheduler::Scheduler;
use crate::services::Services;
use crate::session::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chatrelay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Messenger: {}", config.messenger.is_some());
    info!("  Telegram: {}", config.telegram.is_some());
    info!("  Chunk size: {}", config.relay.chunk_size);
    info!("  Session idle TTL: {}s", config.sessions.idle_ttl_secs);

    let services = Services::from_config(&config.services)?;
    let commands = CommandRegistry::builtin()?;
    info!(
        "Loaded {} commands: {:?}",
        commands.len(),
        commands.list().map(|c| c.name).collect::<Vec<_>>()
    );

    let sessions = Arc::new(SessionStore::new(config.sessions.idle_ttl()));
    let relay = Arc::new(Relay::new(
        config.relay.clone(),
        commands,
        services,
        sessions.clone(),
    ));

    // Background maintenance
    let mut scheduler = Scheduler::new().await?;
    register_builtin_tasks(&mut scheduler, sessions, &config.sessions.sweep_cron).await?;
    info!("Background jobs: {:?}", scheduler.job_names());
    scheduler.start().await?;

    // Run every configured platform until one stops
    let mut platforms = JoinSet::new();
    if let Some(messenger) = config.messenger.clone() {
        platforms.spawn(platform::messenger::run(
            relay.clone(),
            messenger,
            config.services.timeout(),
        ));
    }
    if let Some(telegram) = config.telegram.clone() {
        platforms.spawn(platform::telegram::run(relay.clone(), telegram));
    }

    info!("Relay is starting...");
    let outcome = match platforms.join_next().await {
        Some(Ok(result)) => result,
        Some(Err(e)) => Err(anyhow::Error::new(e).context("Platform task panicked")),
        None => Ok(()),
    };
    if let Err(e) = &outcome {
        error!("Platform stopped: {:#}", e);
    }

    platforms.shutdown().await;
    scheduler.shutdown().await?;

    outcome
}
