// Repository trait for history (backfill) data access
use crate::domain::error::HistoryError;
use crate::domain::history::HistoryChunk;
use crate::domain::telemetry::Axis;
use async_trait::async_trait;

#[async_trait]
pub trait HistoryApi: Send + Sync {
    /// Fetch the records of one axis covering `[start_ms, end_ms)`.
    async fn fetch(&self, start_ms: i64, end_ms: i64, axis: Axis) -> Result<HistoryChunk, HistoryError>;
}
