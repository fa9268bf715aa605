mod api;
mod classify;
mod config;
mod error;
mod models;
mod notify;
mod proxy;
mod registry;
mod services;
mod slack;

use std::net::SocketAddr;
use std::time::Duration;

use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::create_router;
use crate::config::Config;
use crate::notify::Broadcaster;
use crate::proxy::ProxyForwarder;
use crate::registry::StackRegistry;
use crate::services::Manager;
use crate::slack::SlackClient;

/// Keeps elapsed times on the status card moving even when traffic is idle.
const BROADCAST_REFRESH: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cf_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        "starting cf-relay in front of {}",
        config.cloudformation_endpoint
    );

    let registry = StackRegistry::new();
    let slack = SlackClient::new(config.slack_token.clone())?;
    let forwarder = ProxyForwarder::new(config.cloudformation_endpoint.clone())?;

    let (notify_tx, notify_rx) = tokio::sync::mpsc::channel(16);

    let broadcaster = Broadcaster::new(
        slack,
        registry.clone(),
        config.slack_channel.clone(),
        config.slack_header.clone(),
    );
    tokio::spawn(broadcaster.run(notify_rx));

    let ticker_tx = notify_tx.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(BROADCAST_REFRESH);
        loop {
            ticker.tick().await;
            if ticker_tx.send(()).await.is_err() {
                break;
            }
        }
    });

    let manager = Manager::new(registry, forwarder, notify_tx);

    // Create router
    let app = create_router(manager).layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let addr = addr.parse::<SocketAddr>()?;
    tracing::info!("relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
