//! Inbound snapshot classification and image data URL handling.

use crate::error::AnalyzeError;
use base64::Engine as _;

/// Prefix shared by every inline image payload
pub const IMAGE_DATA_PREFIX: &str = "data:image";

/// Whether a value is (or starts with) an inline image payload
pub fn is_image_data(value: &str) -> bool {
    value
        .trim_start()
        .as_bytes()
        .get(..IMAGE_DATA_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(IMAGE_DATA_PREFIX.as_bytes()))
}

/// An image snapshot encoded as a `data:` URL
#[derive(Debug, Clone)]
pub struct ImagePayload {
    data_url: String,
    mime: String,
    bytes: Vec<u8>,
}

impl ImagePayload {
    /// Validate a `data:image/<type>;base64,<data>` URL and decode its bytes
    pub fn parse(data_url: &str) -> Result<Self, AnalyzeError> {
        let data_url = data_url.trim();
        let (header, data) = data_url.split_once(',').ok_or_else(|| {
            AnalyzeError::InvalidRequest("image data URL has no payload separator".to_string())
        })?;

        let meta = header
            .get(5..)
            .filter(|_| header[..5].eq_ignore_ascii_case("data:"))
            .ok_or_else(|| AnalyzeError::InvalidRequest("not a data URL".to_string()))?;

        let mut parts = meta.split(';');
        let mime = parts.next().unwrap_or_default().trim().to_lowercase();
        if !mime.starts_with("image/") {
            return Err(AnalyzeError::InvalidRequest(format!(
                "unsupported payload type: {}",
                mime
            )));
        }
        if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(AnalyzeError::InvalidRequest(
                "image data URL must be base64 encoded".to_string(),
            ));
        }

        let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| AnalyzeError::InvalidRequest(format!("invalid base64 image: {}", e)))?;

        if bytes.is_empty() {
            return Err(AnalyzeError::NoContent);
        }

        Ok(Self {
            data_url: data_url.to_string(),
            mime,
            bytes,
        })
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A single inbound snapshot
#[derive(Debug, Clone)]
pub enum Snapshot {
    Image(ImagePayload),
    Text(String),
}

impl Snapshot {
    /// Decide whether the request carries an image or text.
    ///
    /// Empty or whitespace-only content is rejected before any extractor runs.
    pub fn classify(content: &str) -> Result<Self, AnalyzeError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(AnalyzeError::NoContent);
        }

        if is_image_data(trimmed) {
            Ok(Self::Image(ImagePayload::parse(trimmed)?))
        } else {
            Ok(Self::Text(trimmed.to_string()))
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_png_data_url() -> String {
    // 1x1 transparent PNG
    "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==".to_string()
}
