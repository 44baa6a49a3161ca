pub mod auth;
pub mod error;
pub mod models;
pub mod modules;
pub mod proxy;
mod utils;

use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info};

use auth::{DemoUserDirectory, MemoryRefreshStore, TokenService, TokenSettings};
use proxy::upstream::UpstreamClient;
use proxy::{AppState, AxumServer, GatewayConfig, ServiceRegistry};

/// Assemble the shared state from a validated config
pub fn build_state(config: &GatewayConfig) -> anyhow::Result<AppState> {
    let users = DemoUserDirectory::new().context("Failed to load user directory")?;
    let token_service = TokenService::new(
        &TokenSettings::from_config(config)?,
        Arc::new(MemoryRefreshStore::new()),
        Arc::new(users),
    )
    .context("Failed to initialize token service")?;

    let registry = ServiceRegistry::new(config);
    if registry.is_empty() {
        tracing::warn!("No backend services configured; every /api/{{service}} call will fail");
    }

    Ok(AppState {
        token_service: Arc::new(token_service),
        registry: Arc::new(registry),
        upstream: Arc::new(
            UpstreamClient::new(
                config.request_deadline(),
                Some(config.upstream_proxy.clone()),
            )
            .context("Failed to build upstream client")?,
        ),
    })
}

/// Load config, start the gateway and serve until Ctrl-C
pub async fn run() -> anyhow::Result<()> {
    modules::init_logger();

    let config = modules::load_gateway_config().context("Invalid gateway configuration")?;
    let state = build_state(&config)?;

    let (server, handle) = AxumServer::start(config.get_bind_address(), config.port, state)
        .await
        .with_context(|| {
            format!(
                "Failed to bind address {}:{}",
                config.get_bind_address(),
                config.port
            )
        })?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    server.stop();
    handle.await.context("Server task failed")?;
    Ok(())
}
