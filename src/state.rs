//! Shared request context.
//!
//! Everything a shelf request needs (configuration, the connector registry,
//! the shelf cache), constructed once at startup and passed by reference
//! into request handlers. Nothing here is a process-wide singleton; tests
//! assemble their own.

use std::time::Duration;

use crate::cache::CacheManager;
use crate::config::ServerConfig;
use crate::connector::registry::ConnectorRegistry;

pub struct CapState {
    pub config: ServerConfig,
    pub registry: ConnectorRegistry,
    pub cache: CacheManager,
}

impl CapState {
    /// Build the full context from configuration: constructs and indexes
    /// every enabled connector, then the cache.
    pub fn new(config: ServerConfig) -> Self {
        let registry = ConnectorRegistry::from_config(&config);
        Self::with_registry(config, registry)
    }

    /// Context around an explicitly assembled registry (tests, embedding).
    pub fn with_registry(config: ServerConfig, registry: ConnectorRegistry) -> Self {
        let cache = CacheManager::new(Duration::from_secs(config.cache_ttl_secs));
        Self {
            config,
            registry,
            cache,
        }
    }
}
