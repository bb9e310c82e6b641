//! Server configuration, loaded from environment variables.
//!
//! - `CAP_CONNECTORS`: comma-separated enabled connector names
//! - `CAP_CACHE_TTL`: cache TTL in seconds (default 300)
//! - `CAP_FETCH_TIMEOUT`: per-connector fetch budget in seconds (default 30)
//! - `CAP_<CONNECTOR>_<KEY>`: connector-specific config, e.g.
//!   `CAP_GOOGLE_CALENDAR_ACCESS_TOKEN`, `CAP_GMAIL_ACCESS_TOKEN`

use std::collections::HashMap;

/// Default cache TTL: 5 minutes.
const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default per-connector fetch timeout.
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_name: String,
    pub server_version: String,
    pub cache_ttl_secs: u64,
    pub fetch_timeout_secs: u64,
    pub enabled_connectors: Vec<String>,
    pub connector_configs: HashMap<String, HashMap<String, String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: "claw-agent-protocol".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            enabled_connectors: Vec::new(),
            connector_configs: HashMap::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit variable set (testable form of
    /// `from_env`).
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let mut config = Self::default();

        if let Some(list) = vars.get("CAP_CONNECTORS") {
            config.enabled_connectors = list
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect();
        }

        if let Some(ttl) = vars.get("CAP_CACHE_TTL").and_then(|v| v.parse().ok()) {
            config.cache_ttl_secs = ttl;
        }
        if let Some(timeout) = vars.get("CAP_FETCH_TIMEOUT").and_then(|v| v.parse().ok()) {
            config.fetch_timeout_secs = timeout;
        }

        // Per-connector config: CAP_<NAME>_<KEY> for each enabled connector.
        // Keyed off the enabled list so multi-word connector names
        // (google_calendar) resolve their full prefix.
        for name in &config.enabled_connectors {
            let prefix = format!("CAP_{}_", name.to_uppercase());
            let mut connector_config = HashMap::new();
            for (key, value) in &vars {
                if let Some(rest) = key.strip_prefix(&prefix) {
                    connector_config.insert(rest.to_lowercase(), value.clone());
                }
            }
            if !connector_config.is_empty() {
                config.connector_configs.insert(name.clone(), connector_config);
            }
        }

        config
    }
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
    fn test_defaults() {
        let config = ServerConfig::from_vars(vars(&[]));
        assert_eq!(config.cache_ttl_secs, 300);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert!(config.enabled_connectors.is_empty());
    }

    #[test]
    fn test_connector_list_parsing() {
        let config = ServerConfig::from_vars(vars(&[(
            "CAP_CONNECTORS",
            "google_calendar, gmail ,",
        )]));
        assert_eq!(config.enabled_connectors, vec!["google_calendar", "gmail"]);
    }

    #[test]
    fn test_connector_config_scan() {
        let config = ServerConfig::from_vars(vars(&[
            ("CAP_CONNECTORS", "google_calendar,gmail"),
            ("CAP_GOOGLE_CALENDAR_ACCESS_TOKEN", "ya29.cal"),
            ("CAP_GOOGLE_CALENDAR_CALENDAR_ID", "work@example.com"),
            ("CAP_GMAIL_ACCESS_TOKEN", "ya29.mail"),
            ("CAP_CACHE_TTL", "60"),
        ]));

        let calendar = &config.connector_configs["google_calendar"];
        assert_eq!(calendar["access_token"], "ya29.cal");
        assert_eq!(calendar["calendar_id"], "work@example.com");
        assert_eq!(config.connector_configs["gmail"]["access_token"], "ya29.mail");
        assert_eq!(config.cache_ttl_secs, 60);
    }

    #[test]
    fn test_invalid_ttl_falls_back_to_default() {
        let config = ServerConfig::from_vars(vars(&[("CAP_CACHE_TTL", "soon")]));
        assert_eq!(config.cache_ttl_secs, 300);
    }
}
