use crate::model::SourceError;

/// Provider of the raw price-history export.
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self) -> Result<String, SourceError>;
}
