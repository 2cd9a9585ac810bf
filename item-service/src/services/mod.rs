pub mod memory;
pub mod metrics;
pub mod mongo;
pub mod store;

pub use self::metrics::{get_metrics, init_metrics};
pub use memory::InMemoryItemStore;
pub use mongo::MongoItemStore;
pub use store::{ItemStore, ListFilter, StoreError};

use crate::config::{StoreBackend, StoreConfig};
use service_core::error::AppError;
use std::sync::Arc;

/// Opens the configured backend. Runs once at startup; the handle is then
/// shared by every request.
pub async fn connect_store(config: &StoreConfig) -> Result<Arc<dyn ItemStore>, AppError> {
    match config.backend {
        StoreBackend::Mongo => Ok(Arc::new(MongoItemStore::connect(config).await?)),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory item store; data is lost on restart");
            Ok(Arc::new(InMemoryItemStore::new()))
        }
    }
}
