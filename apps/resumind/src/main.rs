mod client;
mod config;
mod errors;
mod facade;
mod llm_client;
mod models;
mod platform;
mod probe;
mod resume;
mod routes;
mod session;
mod shared_state;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::client::PlatformClient;
use crate::config::{Config, PlatformBackend};
use crate::platform::hosted::HostedPlatform;
use crate::platform::memory::MemoryPlatform;
use crate::platform::{Environment, Platform};
use crate::resume::{ResumeStore, TextSnapshotRenderer};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Resumind v{} ({} backend)",
        env!("CARGO_PKG_VERSION"),
        config.backend.name()
    );

    let platform: Arc<dyn Platform> = match config.backend {
        PlatformBackend::Memory => {
            Arc::new(MemoryPlatform::new().with_user(&config.platform_user))
        }
        PlatformBackend::Hosted => {
            let hosted = config
                .hosted
                .as_ref()
                .context("hosted backend selected without hosted settings")?;
            Arc::new(HostedPlatform::connect(&config, hosted).await?)
        }
    };

    // The platform attaches to the environment some time after startup; the
    // client's probe picks it up whenever that happens.
    let env = Environment::new();
    let client = Arc::new(PlatformClient::new(env.clone(), config.probe_interval()));
    client.init();

    let attach_delay = config.attach_delay();
    tokio::spawn(async move {
        tokio::time::sleep(attach_delay).await;
        env.inject(platform);
        info!("Platform attached after {}ms", attach_delay.as_millis());
    });

    let resumes = ResumeStore::new(
        client.facade().clone(),
        Arc::new(TextSnapshotRenderer::default()),
    );

    // Clean up uploads a previous run left half-finished. Uploads started by
    // this run are never touched, so this can race with request handling.
    {
        let shared = client.state().clone();
        let resumes = resumes.clone();
        tokio::spawn(async move {
            shared.settled().await;
            let report = resumes.recover().await;
            if report.intents_resolved > 0 {
                info!(
                    "Recovered {} interrupted upload(s), removed {} blob(s)",
                    report.intents_resolved, report.blobs_removed
                );
            }
            if report.intents_deferred > 0 {
                warn!(
                    "{} interrupted upload(s) left for the next start",
                    report.intents_deferred
                );
            }
        });
    }

    let state = AppState {
        client: client.clone(),
        resumes,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    client.shutdown();
    info!("Resumind stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for the shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
