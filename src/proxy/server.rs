use crate::auth::TokenService;
use crate::proxy::registry::ServiceRegistry;
use crate::proxy::upstream::UpstreamClient;
use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Json, Response},
    routing::{any, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Request bodies above this size are rejected before they reach a handler
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Axum application state
#[derive(Clone)]
pub struct AppState {
    pub token_service: Arc<TokenService>,
    pub registry: Arc<ServiceRegistry>,
    pub upstream: Arc<UpstreamClient>,
}

/// Build the gateway router
pub fn build_router(state: AppState) -> Router {
    use crate::proxy::handlers;

    // Everything under /api requires a valid access token
    let protected = Router::new()
        .route("/api/modules", get(handlers::gateway::handle_modules))
        .route("/api/:service", any(handlers::gateway::handle_forward))
        // `*rest` never matches an empty tail
        .route("/api/:service/", any(handlers::gateway::handle_forward))
        .route("/api/:service/*rest", any(handlers::gateway::handle_forward))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::proxy::middleware::auth_middleware,
        ));

    Router::new()
        .route("/", get(root_handler))
        .route("/healthz", get(health_check_handler))
        .route("/auth/login", post(handlers::auth::handle_login))
        .route("/auth/refresh", post(handlers::auth::handle_refresh))
        .route("/auth/logout", post(handlers::auth::handle_logout))
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(crate::proxy::middleware::cors_layer())
        .with_state(state)
}

/// Axum server instance
pub struct AxumServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
    local_addr: SocketAddr,
}

impl AxumServer {
    /// Start Axum server
    pub async fn start(
        host: &str,
        port: u16,
        state: AppState,
    ) -> std::io::Result<(Self, tokio::task::JoinHandle<()>)> {
        let app = build_router(state);

        // Bind address
        let addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Gateway listening at http://{}", local_addr);

        // Create shutdown channel
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let server_instance = Self {
            shutdown_tx: Some(shutdown_tx),
            local_addr,
        };

        // Start server in new task
        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(app.clone());

                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!(
                                            "Connection handling finished or errored: {:?}",
                                            err
                                        );
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("Gateway stopped listening");
                        break;
                    }
                }
            }
        });

        Ok((server_instance, handle))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn root_handler() -> Response {
    Json(serde_json::json!({
        "status": "API gateway + auth running"
    }))
    .into_response()
}

/// Health check handler
async fn health_check_handler() -> Response {
    Json(serde_json::json!({
        "status": "ok"
    }))
    .into_response()
}
