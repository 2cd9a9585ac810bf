use crate::models::Item;
use async_trait::async_trait;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Item '{id}' not found in partition '{pk}'")]
    NotFound { id: String, pk: String },

    #[error("Item '{id}' already exists in partition '{pk}'")]
    Conflict { id: String, pk: String },

    /// The store could not be reached; retrying later may succeed.
    #[error("Document store unavailable: {0}")]
    Unavailable(anyhow::Error),

    /// The item cannot be represented in the store's format.
    #[error("Item cannot be stored: {0}")]
    Invalid(anyhow::Error),

    #[error("Document store error: {0}")]
    Backend(anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::NotFound(anyhow::Error::new(err)),
            StoreError::Conflict { .. } => AppError::Conflict(anyhow::Error::new(err)),
            StoreError::Invalid(_) => AppError::BadRequest(anyhow::Error::new(err)),
            StoreError::Unavailable(e) => AppError::ServiceUnavailable(e),
            StoreError::Backend(e) => AppError::DatabaseError(e),
        }
    }
}

/// Which slice of the collection `list` returns. Results are ordered by
/// `(pk, id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    /// Restrict to one partition; `None` scans every partition.
    pub pk: Option<String>,
    pub limit: u32,
    pub offset: u64,
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Inserts a new item; fails with `Conflict` if `(id, pk)` is taken.
    async fn create(&self, item: Item) -> Result<Item, StoreError>;
    async fn read(&self, id: &str, pk: &str) -> Result<Item, StoreError>;
    /// Creates or fully replaces the item at `(item.id, item.pk)`.
    async fn upsert(&self, item: Item) -> Result<Item, StoreError>;
    async fn delete(&self, id: &str, pk: &str) -> Result<(), StoreError>;
    async fn list(&self, filter: ListFilter) -> Result<Vec<Item>, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}
