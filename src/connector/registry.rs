//! Connector registry: construction and shelf indexing.
//!
//! Built once at startup from the enabled-connector list; read-only
//! afterwards. Construction is a closed table, so an unknown name is a
//! configuration error at load rather than a late binding failure, and one
//! bad connector never prevents the others from loading.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::CapError;
use crate::types::Shelf;

use super::gmail::GmailConnector;
use super::google_calendar::GoogleCalendarConnector;
use super::Connector;

#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: Vec<Arc<dyn Connector>>,
    shelf_index: HashMap<Shelf, Vec<Arc<dyn Connector>>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct every enabled connector. A connector that fails to build is
    /// logged and excluded; the rest still load.
    pub fn from_config(config: &ServerConfig) -> Self {
        let mut registry = Self::new();

        for name in &config.enabled_connectors {
            let connector_config = config
                .connector_configs
                .get(name)
                .cloned()
                .unwrap_or_default();
            match build_connector(name, connector_config) {
                Ok(connector) => {
                    log::info!("loaded connector: {name}");
                    registry.register(connector);
                }
                Err(e) => log::error!("failed to load connector {name}: {e}"),
            }
        }

        registry
    }

    /// Add a connector, indexing it under each shelf it declares.
    /// Registration order is preserved per shelf and later breaks merge-order
    /// ties in the aggregator.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        for shelf in connector.supported_shelves() {
            self.shelf_index
                .entry(*shelf)
                .or_default()
                .push(connector.clone());
        }
        self.connectors.push(connector);
    }

    /// Connectors serving `shelf`, in registration order. Empty (not an
    /// error) when no connector covers it.
    pub fn connectors_for(&self, shelf: Shelf) -> &[Arc<dyn Connector>] {
        self.shelf_index
            .get(&shelf)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all(&self) -> &[Arc<dyn Connector>] {
        &self.connectors
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

/// Closed construction table mapping configured names to connectors.
fn build_connector(
    name: &str,
    config: HashMap<String, String>,
) -> Result<Arc<dyn Connector>, CapError> {
    match name {
        "google_calendar" => Ok(Arc::new(GoogleCalendarConnector::new(config))),
        "gmail" => Ok(Arc::new(GmailConnector::new(config))),
        other => Err(CapError::Configuration(format!(
            "unknown connector: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(connectors: &[&str]) -> ServerConfig {
        ServerConfig {
            enabled_connectors: connectors.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_connector_is_excluded_not_fatal() {
        let registry =
            ConnectorRegistry::from_config(&config_with(&["google_calendar", "fitbit", "gmail"]));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_shelf_index_follows_declarations() {
        let registry = ConnectorRegistry::from_config(&config_with(&["google_calendar", "gmail"]));

        assert_eq!(registry.connectors_for(Shelf::Calendar).len(), 1);
        assert_eq!(registry.connectors_for(Shelf::Comms).len(), 1);
        assert_eq!(
            registry.connectors_for(Shelf::Calendar)[0].name(),
            "google_calendar"
        );
        assert_eq!(registry.connectors_for(Shelf::Comms)[0].name(), "gmail");
    }

    #[test]
    fn test_uncovered_shelf_yields_empty_slice() {
        let registry = ConnectorRegistry::from_config(&config_with(&["gmail"]));
        assert!(registry.connectors_for(Shelf::Tasks).is_empty());
        assert!(registry.connectors_for(Shelf::Identity).is_empty());
    }

    #[test]
    fn test_empty_config_builds_empty_registry() {
        let registry = ConnectorRegistry::from_config(&config_with(&[]));
        assert!(registry.is_empty());
    }
}
