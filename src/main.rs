use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portal_autofill::api::{routes::create_router, state::AppState};
use portal_autofill::autofill::ProfileRegistry;
use portal_autofill::config::Config;
use portal_autofill::payload::now_millis;

const MAILBOX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    let profiles = ProfileRegistry::load(config.profiles_path.as_deref())
        .context("Failed to load site profiles")?;
    tracing::info!("Loaded {} site profiles", profiles.len());

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, profiles));

    // Drop mailbox entries nobody came to collect
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(MAILBOX_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = sweeper.mailbox.purge_stale_at(now_millis());
            if purged > 0 {
                tracing::debug!("Purged {} stale mailbox entries", purged);
            }
        }
    });

    let app = create_router(state);

    tracing::info!("Portal autofill sidecar starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
