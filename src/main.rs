//! Personal21 - progress command line
//!
//! Runs one progress command against the device store:
//! `summary` (default), `water <ml>`, `sleep <hours>`, `mindset <chapter>`,
//! `sync <user-id>` and `watch <user-id>`.
//!
//! Cloud commands need a configured remote and read the session token from
//! `PERSONAL21_ACCESS_TOKEN`.

use anyhow::{bail, Context};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use personal21::config::{load_config, AppConfig};
use personal21::notify::TracingNotifier;
use personal21::progress::{LocalProgressStore, SqliteStorage};
use personal21::realtime::{ConnectionState, PhoenixTransport, QueryCache};
use personal21::tracker::TrackerOptions;
use personal21::{HttpRemoteStore, ProgressTracker, RealtimeBridge};

const ACCESS_TOKEN_VAR: &str = "PERSONAL21_ACCESS_TOKEN";

enum Command {
    Summary,
    Water(u32),
    Sleep(f32),
    Mindset(u8),
    Sync(Uuid),
    Watch(Uuid),
}

fn parse_command(args: &[String]) -> anyhow::Result<Command> {
    let value = |name: &str| {
        args.get(1)
            .with_context(|| format!("usage: personal21 {} <value>", name))
    };

    match args.first().map(String::as_str) {
        None | Some("summary") => Ok(Command::Summary),
        Some("water") => Ok(Command::Water(value("water")?.parse().context("invalid ml")?)),
        Some("sleep") => Ok(Command::Sleep(value("sleep")?.parse().context("invalid hours")?)),
        Some("mindset") => Ok(Command::Mindset(
            value("mindset")?.parse().context("invalid chapter")?,
        )),
        Some("sync") => Ok(Command::Sync(value("sync")?.parse().context("invalid user id")?)),
        Some("watch") => Ok(Command::Watch(value("watch")?.parse().context("invalid user id")?)),
        Some(other) => bail!("unknown command: {}", other),
    }
}

fn open_tracker(config: &AppConfig) -> anyhow::Result<ProgressTracker<HttpRemoteStore>> {
    std::fs::create_dir_all(&config.data_dir).context("failed to create data directory")?;

    let storage = SqliteStorage::open(&config.database_path()).context("failed to open progress store")?;
    let store = LocalProgressStore::with_key(Arc::new(storage), config.storage.progress_key.clone());

    let remote = if config.cloud_enabled() {
        let remote = HttpRemoteStore::new(&config.remote).context("failed to create remote store")?;
        remote.set_access_token(std::env::var(ACCESS_TOKEN_VAR).ok());
        Some(Arc::new(remote))
    } else {
        tracing::info!("Cloud sync disabled, running local-only");
        None
    };

    Ok(ProgressTracker::new(store, remote, TrackerOptions::from_config(config)))
}

/// Follow remote changes for a user until the channel ends.
async fn watch(
    config: &AppConfig,
    tracker: &ProgressTracker<HttpRemoteStore>,
    user_id: Uuid,
) -> anyhow::Result<()> {
    let mut transport = PhoenixTransport::new(&config.remote, &config.realtime)
        .context("failed to create realtime transport")?;
    if let Ok(token) = std::env::var(ACCESS_TOKEN_VAR) {
        transport = transport.with_access_token(token);
    }

    let bridge = RealtimeBridge::new(
        Arc::new(transport),
        Arc::new(QueryCache::new()),
        Arc::new(TracingNotifier),
    );
    tracker.listen_to(&bridge);

    let mut events = tracker.subscribe();
    let mut states = bridge.subscribe_state();
    bridge.connect(user_id).await.context("failed to open realtime channel")?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => tracing::info!("Progress event: {:?}", event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            state = states.recv() => match state {
                Ok(ConnectionState::Disconnected) | Err(RecvError::Closed) => break,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
            },
        }
    }

    bridge.disconnect();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Personal21 v{}", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;

    let config = load_config().context("failed to load config")?;
    let tracker = open_tracker(&config)?;

    match command {
        Command::Summary => {}
        Command::Water(ml) => {
            tracker.add_water_intake(ml);
        }
        Command::Sleep(hours) => {
            tracker.add_sleep_time(hours);
        }
        Command::Mindset(chapter) => {
            tracker.complete_mindset_chapter(chapter);
        }
        Command::Sync(user_id) => {
            if !config.cloud_enabled() {
                bail!("cloud sync is disabled or no remote is configured");
            }
            match tracker.login(user_id).await {
                Some(source) => tracing::info!("Progress reconciled from {:?}", source),
                None => bail!("could not reach the remote store"),
            }
            if !tracker.push_now().await {
                bail!("failed to push progress");
            }
            tracker.logout();
        }
        Command::Watch(user_id) => {
            if !config.realtime_enabled() {
                bail!("realtime is disabled or no remote is configured");
            }
            if tracker.login(user_id).await.is_none() {
                tracing::warn!("Starting watch without a fresh remote copy");
            }
            watch(&config, &tracker, user_id).await?;
            tracker.logout();
        }
    }

    let snapshot = tracker.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}
