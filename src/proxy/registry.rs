use std::collections::HashMap;

use crate::proxy::config::GatewayConfig;

/// Service name -> backend base URL. Built once at startup, never mutated.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    services: HashMap<String, String>,
}

impl ServiceRegistry {
    pub fn new(config: &GatewayConfig) -> Self {
        let services: HashMap<String, String> = config
            .services
            .iter()
            .map(|(name, base)| (name.to_lowercase(), base.clone()))
            .collect();

        for (name, base) in &services {
            tracing::info!("Registered service {} -> {}", name, base);
        }

        Self { services }
    }

    /// Case-insensitive lookup of a service's base URL
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.services
            .get(&name.to_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
