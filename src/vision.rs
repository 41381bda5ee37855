//! Structured vision pass.
//!
//! Asks a vision model for a single JSON object describing the product
//! fields, every visible feature, the visual assets and the backend data
//! the page depends on. The reply goes through the schema-validating parse;
//! array fields the model omits or mistypes come back empty.

use crate::client::{CompletionRequest, ModelClient};
use crate::error::ExtractorError;
use crate::json::parse_model_json;
use crate::snapshot::ImagePayload;
use crate::types::{AssetKind, VisionResult};
use std::sync::{Arc, LazyLock};

static VISION_PROMPT: LazyLock<String> = LazyLock::new(|| {
    format!(
        "You are a UI analyst inspecting a product page screenshot for a {marker}.\n\
Return ONLY a JSON object matching this schema, with no prose and no markdown:\n\
{{\n\
  \"title\": string,\n\
  \"price\": string,\n\
  \"rating\": string,\n\
  \"reviewCount\": string,\n\
  \"primaryImagePresent\": boolean,\n\
  \"visualAssets\": [{{\"type\": one of [{vocabulary}], \"label\": string, \"position\": string, \"confidence\": number 0-100}}],\n\
  \"features\": [{{\"name\": string, \"description\": string, \"dataDisplayed\": string, \
\"dataType\": one of [\"text\", \"number\", \"image\", \"rating\", \"list\", \"action\", \"badge\", \"other\"], \
\"position\": string, \"styling\": string, \"apiSource\": string, \"isMVP\": boolean}}],\n\
  \"apiDependencies\": [{{\"name\": string, \"fields\": [string]}}]\n\
}}\n\
Rules:\n\
- Describe every visible UI feature: title, price, rating, images, buttons, badges, lists.\n\
- dataDisplayed is the exact visible value. Never put image data or base64 in any field; \
describe images in words instead.\n\
- apiDependencies names end in \"API\" or \"Database\".\n\
- Use empty strings and empty arrays for anything not visible.",
        marker = VISION_PROMPT_MARKER,
        vocabulary = AssetKind::VOCABULARY
            .iter()
            .map(|kind| format!("\"{}\"", kind))
            .collect::<Vec<_>>()
            .join(", ")
    )
});

/// Marker phrase unique to the vision prompt
pub const VISION_PROMPT_MARKER: &str = "structured feature inventory";

pub struct VisionExtractor {
    client: Arc<dyn ModelClient>,
    model: String,
}

impl VisionExtractor {
    pub fn new(client: Arc<dyn ModelClient>, model: String) -> Self {
        Self { client, model }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run the vision pass over an image snapshot
    pub async fn extract(&self, image: &ImagePayload) -> Result<VisionResult, ExtractorError> {
        let start = std::time::Instant::now();

        let raw = self
            .client
            .complete(CompletionRequest {
                model: &self.model,
                prompt: VISION_PROMPT.as_str(),
                image: Some(image),
                json: true,
            })
            .await?;

        let result = parse_vision_response(&raw)?;

        tracing::info!(
            model = %self.model,
            elapsed_ms = %start.elapsed().as_millis(),
            features = result.features.len(),
            visual_assets = result.visual_assets.len(),
            "Vision extraction complete"
        );

        Ok(result)
    }
}

/// Validate a vision completion into a [`VisionResult`]
pub fn parse_vision_response(raw: &str) -> Result<VisionResult, ExtractorError> {
    Ok(parse_model_json::<VisionResult>(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockModelClient;
    use crate::error::SchemaError;
    use crate::snapshot::sample_png_data_url;
    use crate::types::DataType;

    #[test]
    fn test_prompt_lists_asset_vocabulary() {
        assert!(VISION_PROMPT.contains(VISION_PROMPT_MARKER));
        assert!(VISION_PROMPT.contains("\"product_image\""));
        assert!(VISION_PROMPT.contains("\"apiDependencies\""));
    }

    #[test]
    fn test_full_response() {
        let raw = r#"{
            "title": "Blue Widget",
            "price": "$19.99",
            "rating": 4.5,
            "reviewCount": 2341,
            "primaryImagePresent": true,
            "visualAssets": [
                {"type": "product_image", "label": "main photo", "position": "left", "confidence": 92}
            ],
            "features": [
                {"name": "Add to Cart Button", "dataDisplayed": "Add to Cart", "dataType": "action"}
            ],
            "apiDependencies": [{"name": "Cart API", "fields": ["sku", "quantity"]}]
        }"#;

        let result = parse_vision_response(raw).unwrap();

        assert_eq!(result.rating, "4.5");
        assert_eq!(result.review_count, "2341");
        assert!(result.primary_image_present);
        assert_eq!(result.visual_assets[0].kind, AssetKind::ProductImage);
        assert_eq!(result.features[0].data_type, DataType::Action);
        assert!(result.features[0].is_mvp);
        assert!(result.api_dependencies[0].fields.contains("sku"));
    }

    #[test]
    fn test_arrays_coerced_when_missing_or_mistyped() {
        let raw = r#"{"title": "Lamp", "visualAssets": "none", "features": null}"#;
        let result = parse_vision_response(raw).unwrap();

        assert_eq!(result.title, "Lamp");
        assert!(result.visual_assets.is_empty());
        assert!(result.features.is_empty());
        assert!(result.api_dependencies.is_empty());
        assert!(!result.primary_image_present);
    }

    #[test]
    fn test_bad_array_items_skipped() {
        let raw = r#"{"features": [{"name": "Price", "dataDisplayed": "$5"}, "junk", 7]}"#;
        let result = parse_vision_response(raw).unwrap();
        assert_eq!(result.features.len(), 1);
        assert_eq!(result.features[0].name, "Price");
    }

    #[test]
    fn test_fenced_response_recovered() {
        let raw = "Sure!\n```json\n{\"title\": \"Desk Lamp\"}\n```";
        assert_eq!(parse_vision_response(raw).unwrap().title, "Desk Lamp");
    }

    #[test]
    fn test_non_object_is_schema_error() {
        let err = parse_vision_response("\"just a string\"").unwrap_err();
        assert!(matches!(
            err,
            ExtractorError::Schema(SchemaError::NotAnObject(_))
        ));
    }

    #[tokio::test]
    async fn test_extract_through_client() {
        let client = MockModelClient::new().on(VISION_PROMPT_MARKER, r#"{"price": "$3.50"}"#);
        let extractor = VisionExtractor::new(Arc::new(client), "vision-test".to_string());
        let image = ImagePayload::parse(&sample_png_data_url()).unwrap();

        let result = extractor.extract(&image).await.unwrap();
        assert_eq!(result.price, "$3.50");
        assert_eq!(extractor.model(), "vision-test");
    }
}
