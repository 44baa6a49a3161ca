use reqwest::{Client, Proxy};

use crate::error::{GatewayError, GatewayResult};
use crate::proxy::config::UpstreamProxyConfig;

/// Create an HTTP client with specified proxy configuration.
///
/// No client-wide timeout is set; every call carries its own deadline.
pub fn create_client_with_proxy(
    proxy_config: Option<UpstreamProxyConfig>,
) -> GatewayResult<Client> {
    let mut builder =
        Client::builder().user_agent(concat!("clinic-gateway/", env!("CARGO_PKG_VERSION")));

    if let Some(config) = proxy_config {
        if config.enabled {
            let proxy = Proxy::all(&config.url).map_err(|e| {
                GatewayError::Config(format!("Invalid proxy address {:?}: {}", config.url, e))
            })?;
            builder = builder.proxy(proxy);
            tracing::info!("HTTP client upstream proxy enabled: {}", config.url);
        }
    }

    builder
        .build()
        .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {}", e)))
}
