//! Text recognition strategies
//!
//! This module contains implementations of the TextRecognizer trait. The
//! pixel engine is conditionally compiled behind the `engine-ocrs` feature;
//! the model-based strategy is always available.

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;

pub mod model;

use crate::client::ModelClient;
use crate::config::{Config, OcrBackend};
use crate::engine::TextRecognizer;
use crate::error::ExtractorError;
use std::sync::Arc;

/// Build the recognizer selected by configuration
pub fn build_recognizer(
    config: &Config,
    client: Arc<dyn ModelClient>,
) -> Result<Arc<dyn TextRecognizer>, ExtractorError> {
    match config.ocr_backend {
        OcrBackend::Model => {
            tracing::info!("Using model-based OCR ({})", config.model.ocr_model);
            Ok(Arc::new(model::ModelOcr::new(
                client,
                config.model.ocr_model.clone(),
            )))
        }
        OcrBackend::Pixel => build_pixel_engine(),
    }
}

#[cfg(feature = "engine-ocrs")]
fn build_pixel_engine() -> Result<Arc<dyn TextRecognizer>, ExtractorError> {
    tracing::info!("Initializing ocrs engine...");
    Ok(Arc::new(ocrs::OcrsEngine::new()?))
}

#[cfg(not(feature = "engine-ocrs"))]
fn build_pixel_engine() -> Result<Arc<dyn TextRecognizer>, ExtractorError> {
    Err(ExtractorError::Initialization(
        "Pixel OCR backend not available. Build with --features engine-ocrs".to_string(),
    ))
}
