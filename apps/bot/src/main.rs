mod caption;
mod config;
mod dispatcher;
mod errors;
mod policy;
mod state;
mod telegram;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::caption::CaptionFont;
use crate::config::{Config, ConfigError};
use crate::dispatcher::start_pool;
use crate::state::BotState;
use crate::telegram::poller::poll_updates;
use crate::telegram::TelegramClient;

/// How long in-flight photos get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; nothing starts with a bad environment
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting captionbot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        debug = config.debug,
        workers = config.workers,
        failure_mode = ?config.failure_mode,
        "Configuration loaded"
    );

    // Parse the font once; every render borrows it
    let font = CaptionFont::load(&config.font_path).map_err(ConfigError::from)?;
    info!(
        "Font loaded from {} ({} glyphs)",
        config.font_path.display(),
        font.glyph_count()
    );

    // Initialize Bot API client and check the token
    let client = TelegramClient::new(
        config.token.clone(),
        Duration::from_secs(config.poll_timeout_secs),
    )?;
    let me = client.get_me().await?;
    info!(
        "Authorized as @{} (id {})",
        me.username.as_deref().unwrap_or(&me.first_name),
        me.id
    );

    let state = BotState::new(&config, Arc::new(font), Arc::new(client.clone()));

    let shutdown = CancellationToken::new();
    let (events_tx, events_rx) = mpsc::channel(config.workers * 2);

    let poller = tokio::spawn(poll_updates(
        Arc::new(client),
        config.poll_timeout_secs,
        events_tx,
        shutdown.clone(),
    ));

    let mut seed = StdRng::from_entropy();
    let mut done = start_pool(
        state,
        events_rx,
        config.workers,
        config.failure_mode,
        &shutdown,
        &mut seed,
    );

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let result = tokio::select! {
        result = &mut done => result,
        _ = sigint.recv() => shut_down(&shutdown, &mut done, "SIGINT").await,
        _ = sigterm.recv() => shut_down(&shutdown, &mut done, "SIGTERM").await,
    };

    // A strict-mode failure stops the pool on its own; the poller still needs telling.
    shutdown.cancel();
    if let Err(e) = poller.await {
        error!("Update poller task failed: {e}");
    }

    match result {
        Ok(()) => {
            info!("Stopped without error");
            Ok(())
        }
        Err(e) => {
            error!("Stopped with error: {e}");
            Err(e.into())
        }
    }
}

async fn shut_down(
    shutdown: &CancellationToken,
    done: &mut dispatcher::PoolDone,
    signal_name: &str,
) -> Result<(), errors::BotError> {
    info!("Received {signal_name}, waiting up to {}s for workers", SHUTDOWN_GRACE.as_secs());
    shutdown.cancel();

    match tokio::time::timeout(SHUTDOWN_GRACE, done).await {
        Ok(result) => result,
        Err(_) => {
            error!("Workers did not stop within {}s, exiting", SHUTDOWN_GRACE.as_secs());
            std::process::exit(1);
        }
    }
}
