use crate::batch::RecordBatch;
use crate::error::TransformError;

/// Batch-level transform plugin.
///
/// The single capability a data-loading pipeline needs from this crate: take a
/// freshly materialized `RecordBatch` and rewrite its fields in place.
/// Pipelines accept implementations through dependency injection (see the
/// engine's `TransformHost`), either linked in directly or loaded from a `.so`.
///
/// `apply` either converts the whole batch or fails; on failure the batch must
/// be left as it was passed in.
pub trait BatchTransform: Send + Sync {
    /// Transform name for logs.
    fn name(&self) -> &str;

    fn apply(&self, batch: &mut RecordBatch) -> Result<(), TransformError>;
}
