//! Model-based OCR
//!
//! Prompts a vision model to transcribe the snapshot and return the
//! structured product fields alongside the raw text, so the signal
//! extractor does not need to run.

use crate::client::{CompletionRequest, ModelClient};
use crate::engine::TextRecognizer;
use crate::error::ExtractorError;
use crate::json::parse_model_json;
use crate::snapshot::ImagePayload;
use crate::types::{lenient, OcrLine, OcrResult, Signals};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use std::sync::Arc;

pub const OCR_PROMPT: &str = "\
You are an OCR engine for product page screenshots. Transcribe ALL visible text \
in reading order, one line per visual line.\n\
Return ONLY a JSON object with exactly these keys:\n\
{\"rawText\": string, \"title\": string, \"price\": string, \"rating\": string, \
\"reviewCount\": string, \"confidence\": number}\n\
- title: the product name as printed\n\
- price: the main price including its currency symbol\n\
- rating: the average star rating as a number, e.g. \"4.5\"\n\
- reviewCount: the number of reviews or ratings, digits only\n\
- confidence: 0-100, how legible the text was\n\
Use an empty string for anything not visible. No prose, no markdown.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelOcrResponse {
    #[serde(default, alias = "text", deserialize_with = "lenient::string")]
    raw_text: String,
    #[serde(default, deserialize_with = "lenient::string")]
    title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    price: String,
    #[serde(default, deserialize_with = "lenient::string")]
    rating: String,
    #[serde(default, deserialize_with = "lenient::string")]
    review_count: String,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
}

/// OCR strategy backed by a vision model
pub struct ModelOcr {
    client: Arc<dyn ModelClient>,
    model: String,
}

impl ModelOcr {
    pub fn new(client: Arc<dyn ModelClient>, model: String) -> Self {
        Self { client, model }
    }

    async fn run(&self, image: &ImagePayload) -> Result<OcrResult, ExtractorError> {
        let start = std::time::Instant::now();

        let raw = self
            .client
            .complete(CompletionRequest {
                model: &self.model,
                prompt: OCR_PROMPT,
                image: Some(image),
                json: true,
            })
            .await?;

        let parsed: ModelOcrResponse = parse_model_json(&raw)?;
        let confidence = normalize_confidence(parsed.confidence.as_ref());

        let lines = parsed
            .raw_text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| OcrLine {
                text: line.to_string(),
                confidence,
                bbox: None,
            })
            .collect();

        tracing::info!(
            model = %self.model,
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = parsed.raw_text.len(),
            confidence,
            "Model OCR complete"
        );

        Ok(OcrResult::new(parsed.raw_text, confidence)
            .with_lines(lines)
            .with_signals(Signals {
                title: parsed.title,
                price: parsed.price,
                rating: parsed.rating,
                review_count: parsed.review_count.replace(',', ""),
            }))
    }
}

impl TextRecognizer for ModelOcr {
    fn name(&self) -> &'static str {
        "model"
    }

    fn description(&self) -> &'static str {
        "Vision model prompted for OCR JSON with structured product fields"
    }

    fn recognize<'a>(
        &'a self,
        image: &'a ImagePayload,
    ) -> BoxFuture<'a, Result<OcrResult, ExtractorError>> {
        self.run(image).boxed()
    }
}

/// Read a model-reported confidence as a 0-100 score.
///
/// Values in (0, 1] are taken as fractions; anything unreadable is 0.
fn normalize_confidence(value: Option<&serde_json::Value>) -> f32 {
    let raw = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0) as f32,
        Some(serde_json::Value::String(s)) => {
            s.trim().trim_end_matches('%').parse().unwrap_or(0.0)
        }
        _ => 0.0,
    };

    let scaled = if raw > 0.0 && raw <= 1.0 {
        raw * 100.0
    } else {
        raw
    };
    crate::types::clamp_confidence(scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockModelClient;
    use crate::error::SchemaError;
    use crate::snapshot::sample_png_data_url;
    use serde_json::json;

    fn image() -> ImagePayload {
        ImagePayload::parse(&sample_png_data_url()).unwrap()
    }

    #[tokio::test]
    async fn test_structured_signals_attached() {
        let client = MockModelClient::new().on(
            "OCR engine",
            r#"{"rawText": "Blue Widget\n$19.99\n1,204 ratings", "title": "Blue Widget",
                "price": "$19.99", "rating": 4.5, "reviewCount": "1,204", "confidence": 88}"#,
        );
        let ocr = ModelOcr::new(Arc::new(client), "ocr-test".to_string());

        let result = ocr.recognize(&image()).await.unwrap();

        assert_eq!(result.confidence, 88.0);
        assert_eq!(result.lines.len(), 3);
        let signals = result.signals.unwrap();
        assert_eq!(signals.title, "Blue Widget");
        assert_eq!(signals.rating, "4.5");
        assert_eq!(signals.review_count, "1204");
    }

    #[tokio::test]
    async fn test_unparsable_reply_is_extractor_error() {
        let client = MockModelClient::new().on("OCR engine", "Sorry, I can't read that.");
        let ocr = ModelOcr::new(Arc::new(client), "ocr-test".to_string());

        let err = ocr.recognize(&image()).await.unwrap_err();
        assert!(matches!(err, ExtractorError::Schema(SchemaError::NoJson)));
    }

    #[test]
    fn test_confidence_normalization() {
        assert!((normalize_confidence(Some(&json!(0.9))) - 90.0).abs() < 1e-3);
        assert_eq!(normalize_confidence(Some(&json!(75))), 75.0);
        assert_eq!(normalize_confidence(Some(&json!("64%"))), 64.0);
        assert_eq!(normalize_confidence(Some(&json!(250))), 100.0);
        assert_eq!(normalize_confidence(Some(&json!(null))), 0.0);
        assert_eq!(normalize_confidence(None), 0.0);
    }
}
