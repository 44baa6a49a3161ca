use std::fs;
use std::path::Path;

use crate::error::{GatewayError, GatewayResult};
use crate::proxy::GatewayConfig;

/// Environment variable naming an optional JSON config file
pub const CONFIG_FILE_ENV: &str = "GATEWAY_CONFIG";

/// Load and validate the gateway configuration.
///
/// Reads the JSON file named by `GATEWAY_CONFIG` when it is set, otherwise
/// assembles the config from environment variables.
pub fn load_gateway_config() -> GatewayResult<GatewayConfig> {
    let mut config = match std::env::var(CONFIG_FILE_ENV) {
        Ok(path) if !path.trim().is_empty() => load_config_file(Path::new(path.trim()))?,
        _ => GatewayConfig::from_vars(std::env::vars())?,
    };

    config.validate()?;
    tracing::info!(
        "Configuration loaded: port {}, {} backend service(s)",
        config.port,
        config.services.len()
    );
    Ok(config)
}

/// Load a config file without validating it
pub fn load_config_file(path: &Path) -> GatewayResult<GatewayConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        GatewayError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        GatewayError::Config(format!("Failed to parse config file {:?}: {}", path, e))
    })
}
