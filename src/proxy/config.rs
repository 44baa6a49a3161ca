use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult};

/// Environment prefix that marks a backend service entry (`SERVICE_PHARMACY=http://...`)
pub const SERVICE_ENV_PREFIX: &str = "SERVICE_";

/// Gateway configuration, assembled and validated once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Whether to listen on all interfaces
    /// - false: 127.0.0.1 only (default)
    /// - true: 0.0.0.0
    #[serde(default)]
    pub allow_lan_access: bool,

    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,

    /// HS256 signing secret shared by access and refresh tokens
    #[serde(default)]
    pub jwt_secret: String,

    /// Access token lifetime, e.g. "2m"
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: String,

    /// Refresh token lifetime, e.g. "1h"
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: String,

    /// Outbound request deadline (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Egress proxy for outbound calls
    #[serde(default)]
    pub upstream_proxy: UpstreamProxyConfig,

    /// Service short name -> backend base URL
    #[serde(default)]
    pub services: BTreeMap<String, String>,
}

/// Egress proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpstreamProxyConfig {
    /// Whether enabled
    pub enabled: bool,
    /// Proxy address (http://, https://, socks5://)
    pub url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            allow_lan_access: false,
            port: default_port(),
            jwt_secret: String::new(),
            access_token_ttl: default_access_token_ttl(),
            refresh_token_ttl: default_refresh_token_ttl(),
            request_timeout: default_request_timeout(),
            upstream_proxy: UpstreamProxyConfig::default(),
            services: BTreeMap::new(),
        }
    }
}

fn default_port() -> u16 {
    5000
}

fn default_access_token_ttl() -> String {
    "2m".to_string()
}

fn default_refresh_token_ttl() -> String {
    "1h".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

impl GatewayConfig {
    /// Get the actual listening address
    pub fn get_bind_address(&self) -> &str {
        if self.allow_lan_access {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }

    /// Build a config from `(key, value)` pairs, typically `std::env::vars()`.
    ///
    /// Unknown keys are ignored. Every `SERVICE_<NAME>` key contributes a
    /// backend whose short name is `<NAME>` lowercased.
    pub fn from_vars<I>(vars: I) -> GatewayResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::default();

        for (key, value) in vars {
            match key.as_str() {
                "PORT" => {
                    config.port = value
                        .trim()
                        .parse()
                        .map_err(|e| {
                            GatewayError::Config(format!("Invalid PORT {:?}: {}", value, e))
                        })?;
                }
                "ALLOW_LAN_ACCESS" => {
                    config.allow_lan_access = matches!(
                        value.trim().to_ascii_lowercase().as_str(),
                        "1" | "true" | "yes"
                    );
                }
                "JWT_SECRET" => config.jwt_secret = value,
                "JWT_EXP" => config.access_token_ttl = value,
                "REFRESH_EXP" => config.refresh_token_ttl = value,
                "REQUEST_TIMEOUT" => {
                    let deadline = parse_duration(&value)?;
                    if deadline.subsec_nanos() != 0 {
                        return Err(GatewayError::Config(format!(
                            "REQUEST_TIMEOUT must be a whole number of seconds, got {:?}",
                            value
                        )));
                    }
                    config.request_timeout = deadline.as_secs();
                }
                "UPSTREAM_PROXY" => {
                    config.upstream_proxy = UpstreamProxyConfig {
                        enabled: !value.trim().is_empty(),
                        url: value,
                    };
                }
                _ => {
                    if let Some(name) = key.strip_prefix(SERVICE_ENV_PREFIX) {
                        if !name.is_empty() {
                            config.services.insert(name.to_lowercase(), value);
                        }
                    }
                }
            }
        }

        Ok(config)
    }

    /// Check every field that startup depends on.
    ///
    /// Service names are lowercased in place; two entries that collide after
    /// lowercasing are rejected.
    pub fn validate(&mut self) -> GatewayResult<()> {
        if self.jwt_secret.trim().is_empty() {
            return Err(GatewayError::Config(
                "JWT_SECRET is required to sign tokens".to_string(),
            ));
        }

        check_token_lifetime("access_token_ttl", self.access_token_lifetime()?)?;
        check_token_lifetime("refresh_token_ttl", self.refresh_token_lifetime()?)?;

        if self.request_timeout == 0 {
            return Err(GatewayError::Config(
                "request_timeout must be at least 1 second".to_string(),
            ));
        }

        if self.upstream_proxy.enabled {
            let parsed = url::Url::parse(&self.upstream_proxy.url).map_err(|e| {
                GatewayError::Config(format!(
                    "Invalid upstream proxy {:?}: {}",
                    self.upstream_proxy.url, e
                ))
            })?;
            if !matches!(parsed.scheme(), "http" | "https" | "socks5" | "socks5h")
                || parsed.host_str().is_none()
            {
                return Err(GatewayError::Config(format!(
                    "Upstream proxy must be an http(s) or socks5 URL, got {}",
                    self.upstream_proxy.url
                )));
            }
        }

        let mut normalized = BTreeMap::new();
        for (name, base) in &self.services {
            let key = name.trim().to_lowercase();
            if key.is_empty() || key.contains('/') {
                return Err(GatewayError::Config(format!(
                    "Invalid service name {:?}",
                    name
                )));
            }

            let parsed = url::Url::parse(base).map_err(|e| {
                GatewayError::Config(format!("Invalid URL for service {}: {} ({})", key, base, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
                return Err(GatewayError::Config(format!(
                    "Service {} must use an absolute http(s) URL, got {}",
                    key, base
                )));
            }

            if normalized.insert(key.clone(), base.trim().to_string()).is_some() {
                return Err(GatewayError::Config(format!(
                    "Service {} is configured more than once",
                    key
                )));
            }
        }
        self.services = normalized;

        Ok(())
    }

    pub fn access_token_lifetime(&self) -> GatewayResult<Duration> {
        parse_duration(&self.access_token_ttl)
    }

    pub fn refresh_token_lifetime(&self) -> GatewayResult<Duration> {
        parse_duration(&self.refresh_token_ttl)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Expiry timestamps are computed as `now + ttl`; reject lifetimes that push
/// that past the representable calendar.
fn check_token_lifetime(field: &str, ttl: Duration) -> GatewayResult<()> {
    let fits = chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
        .is_some();
    if fits {
        Ok(())
    } else {
        Err(GatewayError::Config(format!("{} is too large: {:?}", field, ttl)))
    }
}

static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s*(ms|s|m|h|d)?$").expect("duration pattern is valid"));

/// Parse a lifetime such as `"90"`, `"90s"`, `"2m"`, `"1h"` or `"1d"`.
/// A bare number is seconds. Zero is rejected.
pub fn parse_duration(input: &str) -> GatewayResult<Duration> {
    let trimmed = input.trim();
    let caps = DURATION_RE
        .captures(trimmed)
        .ok_or_else(|| GatewayError::Config(format!("Invalid duration {:?}", input)))?;

    let amount: u64 = caps[1]
        .parse()
        .map_err(|e| GatewayError::Config(format!("Invalid duration {:?}: {}", input, e)))?;

    let duration = match caps.get(2).map(|m| m.as_str()) {
        Some("ms") => Duration::from_millis(amount),
        None | Some("s") => Duration::from_secs(amount),
        Some("m") => Duration::from_secs(amount.saturating_mul(60)),
        Some("h") => Duration::from_secs(amount.saturating_mul(3600)),
        Some("d") => Duration::from_secs(amount.saturating_mul(86_400)),
        Some(other) => {
            return Err(GatewayError::Config(format!("Unknown duration unit {}", other)))
        }
    };

    if duration.is_zero() {
        return Err(GatewayError::Config(format!(
            "Duration must be positive, got {:?}",
            input
        )));
    }

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration(" 15s ").unwrap(), Duration::from_secs(15));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-5m").is_err());
    }

    #[test]
    fn test_from_vars_collects_services() {
        let mut config = GatewayConfig::from_vars(vars(&[
            ("JWT_SECRET", "s3cret"),
            ("PORT", "8080"),
            ("SERVICE_PHARMACY", "http://pharmacy:4004/"),
            ("SERVICE_Doctors", "http://doctors:4002"),
            ("SERVICE_", "http://ignored"),
            ("HOME", "/root"),
        ]))
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services["pharmacy"], "http://pharmacy:4004/");
        assert_eq!(config.services["doctors"], "http://doctors:4002");
        assert_eq!(config.access_token_lifetime().unwrap(), Duration::from_secs(120));
        assert_eq!(config.request_deadline(), Duration::from_secs(15));
    }

    #[test]
    fn test_validate_requires_secret() {
        let mut config = GatewayConfig::from_vars(vars(&[("SERVICE_X", "http://x")])).unwrap();
        assert!(matches!(config.validate(), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_urls_and_duplicates() {
        let mut config = GatewayConfig {
            jwt_secret: "k".to_string(),
            ..GatewayConfig::default()
        };
        config
            .services
            .insert("files".to_string(), "ftp://files".to_string());
        assert!(config.validate().is_err());

        let mut config = GatewayConfig {
            jwt_secret: "k".to_string(),
            ..GatewayConfig::default()
        };
        config
            .services
            .insert("Pharmacy".to_string(), "http://a".to_string());
        config
            .services
            .insert("pharmacy".to_string(), "http://b".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_timeout_must_be_whole_seconds() {
        let config = GatewayConfig::from_vars(vars(&[("REQUEST_TIMEOUT", "30s")])).unwrap();
        assert_eq!(config.request_deadline(), Duration::from_secs(30));

        let config = GatewayConfig::from_vars(vars(&[("REQUEST_TIMEOUT", "2000ms")])).unwrap();
        assert_eq!(config.request_deadline(), Duration::from_secs(2));

        for value in ["1500ms", "500ms"] {
            assert!(matches!(
                GatewayConfig::from_vars(vars(&[("REQUEST_TIMEOUT", value)])),
                Err(GatewayError::Config(_))
            ));
        }
    }

    #[test]
    fn test_validate_rejects_oversized_token_lifetime() {
        let mut config = GatewayConfig {
            jwt_secret: "k".to_string(),
            access_token_ttl: "1000000000d".to_string(),
            ..GatewayConfig::default()
        };
        assert!(matches!(config.validate(), Err(GatewayError::Config(_))));

        let mut config = GatewayConfig {
            jwt_secret: "k".to_string(),
            refresh_token_ttl: "3650d".to_string(),
            ..GatewayConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_checks_upstream_proxy() {
        let mut config = GatewayConfig::from_vars(vars(&[
            ("JWT_SECRET", "k"),
            ("UPSTREAM_PROXY", "ftp://proxy.local:21"),
        ]))
        .unwrap();
        assert!(matches!(config.validate(), Err(GatewayError::Config(_))));

        let mut config = GatewayConfig::from_vars(vars(&[
            ("JWT_SECRET", "k"),
            ("UPSTREAM_PROXY", "not a url"),
        ]))
        .unwrap();
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::from_vars(vars(&[
            ("JWT_SECRET", "k"),
            ("UPSTREAM_PROXY", "socks5://127.0.0.1:1080"),
        ]))
        .unwrap();
        config.validate().unwrap();
        assert!(config.upstream_proxy.enabled);
    }

    #[test]
    fn test_config_file_defaults() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"jwt_secret": "k", "services": {"patients": "http://p"}}"#)
                .unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.refresh_token_ttl, "1h");
        assert!(!config.upstream_proxy.enabled);
        assert_eq!(config.get_bind_address(), "127.0.0.1");
    }
}
