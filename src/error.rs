//! Error taxonomy for shelf aggregation.
//!
//! Errors are classified by blast radius:
//! - Degradable: one connector's contribution drops to empty for the request
//! - Startup: the connector is excluded at registry build, others load
//! - Hard: the aggregate request itself fails (malformed filters only)

use thiserror::Error;

use crate::types::Shelf;

#[derive(Debug, Error)]
pub enum CapError {
    /// Invalid or unknown connector name, or bad startup configuration.
    /// Excludes that connector; never fatal to the process.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Credentials absent or rejected upstream.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Transport or API failure in an external system.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A connector was invoked for a shelf it never declared. This is a
    /// registry-wiring bug, not an upstream condition.
    #[error("Connector {connector} does not support the {shelf} shelf")]
    UnsupportedShelf { connector: String, shelf: Shelf },

    /// A canonical object failed its schema contract.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Filter parameters that cannot be canonicalized into a cache key.
    /// The only error an aggregate request surfaces to its caller.
    #[error("Invalid filter parameters: {0}")]
    InvalidFilter(String),

    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CapError {
    /// True when a per-connector failure degrades that connector's
    /// contribution to empty instead of failing the aggregate request.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            CapError::Authentication(_)
                | CapError::Upstream(_)
                | CapError::Http(_)
                | CapError::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degradable_classification() {
        assert!(CapError::Authentication("no token".into()).is_degradable());
        assert!(CapError::Upstream("HTTP 503".into()).is_degradable());
        assert!(!CapError::Configuration("unknown connector".into()).is_degradable());
        assert!(!CapError::InvalidFilter("limit".into()).is_degradable());
        assert!(!CapError::UnsupportedShelf {
            connector: "gmail".into(),
            shelf: Shelf::Tasks,
        }
        .is_degradable());
    }

    #[test]
    fn test_display_names_shelf() {
        let err = CapError::UnsupportedShelf {
            connector: "gmail".into(),
            shelf: Shelf::Calendar,
        };
        assert_eq!(
            err.to_string(),
            "Connector gmail does not support the calendar shelf"
        );
    }
}
