use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rpc::transport::Endpoint;
use crate::rpc::DEFAULT_CONNECT_TIMEOUT_MS;

/// Client configuration loaded from defaults and environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub connect_timeout_ms: u64,
    pub log_level: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50001,
            tls: false,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            log_level: "info".to_string(),
        }
    }
}

impl ClientSettings {
    /// Defaults overridden by `LEDGERLINE_*` environment variables
    pub fn load() -> Self {
        let mut settings = Self::default();

        if let Ok(val) = std::env::var("LEDGERLINE_HOST") {
            settings.host = val;
        }
        if let Ok(val) = std::env::var("LEDGERLINE_PORT") {
            if let Ok(port) = val.parse() {
                settings.port = port;
            }
        }
        if let Ok(val) = std::env::var("LEDGERLINE_TLS") {
            settings.tls = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(val) = std::env::var("LEDGERLINE_CONNECT_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                settings.connect_timeout_ms = ms;
            }
        }
        if let Ok(val) = std::env::var("LEDGERLINE_LOG_LEVEL") {
            settings.log_level = val;
        }

        settings
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port, self.tls)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ClientSettings::default();
        assert_eq!(settings.port, 50001);
        assert!(!settings.tls);
        assert_eq!(settings.connect_timeout_ms, 5000);
    }

    #[test]
    fn test_endpoint_from_settings() {
        let settings = ClientSettings {
            host: "ledger.example".to_string(),
            port: 50002,
            tls: true,
            ..ClientSettings::default()
        };
        let endpoint = settings.endpoint();
        assert_eq!(endpoint.addr(), "ledger.example:50002");
        assert!(endpoint.tls);
    }
}
