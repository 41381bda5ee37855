use crate::error::ExtractorError;
use crate::snapshot::ImagePayload;
use crate::types::OcrResult;
use futures::future::BoxFuture;

/// Trait that all text recognition strategies must implement.
///
/// The fusion stage only sees the returned [`OcrResult`], so it does not
/// matter whether a local engine or a vision model produced it.
pub trait TextRecognizer: Send + Sync {
    /// Returns the strategy identifier (e.g., "ocrs", "model")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the strategy
    fn description(&self) -> &'static str;

    /// Recognize text in an image snapshot
    fn recognize<'a>(
        &'a self,
        image: &'a ImagePayload,
    ) -> BoxFuture<'a, Result<OcrResult, ExtractorError>>;
}
