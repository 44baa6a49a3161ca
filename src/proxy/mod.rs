// proxy module - edge gateway: routing, auth gate and forwarding

pub mod config;
pub mod handlers; // API endpoint handlers
pub mod middleware; // Axum middleware
pub mod path_resolver;
pub mod registry;
pub mod relay;
pub mod server;
pub mod upstream; // Upstream client

pub use config::GatewayConfig;
pub use registry::ServiceRegistry;
pub use server::{AppState, AxumServer};
