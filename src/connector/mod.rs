//! Source connectors: one per external system.
//!
//! A connector declares the shelves it serves and normalizes raw upstream
//! records into canonical objects. The registry indexes connectors by that
//! declaration and never probes capabilities dynamically.

pub mod gmail;
pub mod google_calendar;
pub mod registry;

use async_trait::async_trait;

use crate::error::CapError;
use crate::filters::FilterParams;
use crate::types::{CanonicalObject, Shelf};

/// The adapter contract every source connector implements.
///
/// Shelf-fetch methods for undeclared shelves keep their default bodies,
/// which signal `UnsupportedShelf`, so a wiring bug is distinguishable from
/// a supported-but-empty result. Fetch methods must not fail for "no
/// results"; only for transport or auth failure.
#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    /// The closed set of shelves this connector can serve.
    fn supported_shelves(&self) -> &[Shelf];

    /// Authenticate with the external service. Idempotent; leaves the
    /// connector authenticated or not, and fails with
    /// `CapError::Authentication` when credentials are absent or rejected.
    async fn authenticate(&self) -> Result<(), CapError>;

    async fn fetch_identity(&self, _filters: &FilterParams) -> Result<Vec<CanonicalObject>, CapError> {
        Err(self.unsupported(Shelf::Identity))
    }

    async fn fetch_calendar(&self, _filters: &FilterParams) -> Result<Vec<CanonicalObject>, CapError> {
        Err(self.unsupported(Shelf::Calendar))
    }

    async fn fetch_comms(&self, _filters: &FilterParams) -> Result<Vec<CanonicalObject>, CapError> {
        Err(self.unsupported(Shelf::Comms))
    }

    async fn fetch_docs(&self, _filters: &FilterParams) -> Result<Vec<CanonicalObject>, CapError> {
        Err(self.unsupported(Shelf::Docs))
    }

    async fn fetch_tasks(&self, _filters: &FilterParams) -> Result<Vec<CanonicalObject>, CapError> {
        Err(self.unsupported(Shelf::Tasks))
    }

    fn supports(&self, shelf: Shelf) -> bool {
        self.supported_shelves().contains(&shelf)
    }

    /// Dispatch a shelf request to the matching capability method.
    async fn fetch_shelf(&self, shelf: Shelf, filters: &FilterParams) -> Result<Vec<CanonicalObject>, CapError> {
        match shelf {
            Shelf::Identity => self.fetch_identity(filters).await,
            Shelf::Calendar => self.fetch_calendar(filters).await,
            Shelf::Comms => self.fetch_comms(filters).await,
            Shelf::Docs => self.fetch_docs(filters).await,
            Shelf::Tasks => self.fetch_tasks(filters).await,
        }
    }

    fn unsupported(&self, shelf: Shelf) -> CapError {
        CapError::UnsupportedShelf {
            connector: self.name().to_string(),
            shelf,
        }
    }
}
