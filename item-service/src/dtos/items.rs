use serde::Deserialize;
use service_core::error::AppError;

/// `?pk=` on point operations.
#[derive(Debug, Default, Deserialize)]
pub struct PartitionKeyQuery {
    pub pk: Option<String>,
}

impl PartitionKeyQuery {
    pub fn required(self) -> Result<String, AppError> {
        self.pk.filter(|pk| !pk.is_empty()).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Missing 'pk' (partition key) query parameter"
            ))
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemListParams {
    pub pk: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u64>,
}

impl ItemListParams {
    /// Requested page size, clamped to `1..=max_page_size`. Defaults to the
    /// maximum.
    pub fn page_size(&self, max_page_size: u32) -> u32 {
        let max = max_page_size.max(1);
        self.limit.unwrap_or(max).clamp(1, max)
    }
}
