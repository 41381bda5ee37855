//! Data model shared by the extraction, fusion and presentation stages.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Feature data types
// ============================================================================

/// Kind of data a UI feature presents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Text,
    Number,
    Image,
    Rating,
    List,
    Action,
    Badge,
    Other,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Image => "image",
            Self::Rating => "rating",
            Self::List => "list",
            Self::Action => "action",
            Self::Badge => "badge",
            Self::Other => "other",
        }
    }

    /// Map a free-form type label onto the closed vocabulary.
    ///
    /// Accepts the canonical names plus the synonyms models tend to use
    /// (`button`, `review`, `photo`, `price`, `label`).
    pub fn normalize(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "text" | "string" => Some(Self::Text),
            "number" | "price" | "numeric" => Some(Self::Number),
            "image" | "photo" => Some(Self::Image),
            "rating" | "review" => Some(Self::Rating),
            "list" => Some(Self::List),
            "action" | "button" => Some(Self::Action),
            "badge" | "label" => Some(Self::Badge),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(raw
            .as_str()
            .and_then(DataType::normalize)
            .unwrap_or(DataType::Other))
    }
}

// ============================================================================
// OCR
// ============================================================================

/// Normalized fields derived from recognized text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Signals {
    pub title: String,
    pub price: String,
    pub rating: String,
    pub review_count: String,
}

/// Axis-aligned box around a recognized line, in image pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrLine {
    pub text: String,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

/// Output of one text recognition pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OcrResult {
    pub text: String,
    /// Overall confidence, 0-100
    pub confidence: f32,
    pub lines: Vec<OcrLine>,
    /// Present when the backend already produced structured fields
    pub signals: Option<Signals>,
}

impl OcrResult {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: clamp_confidence(confidence),
            lines: Vec::new(),
            signals: None,
        }
    }

    pub fn with_lines(mut self, lines: Vec<OcrLine>) -> Self {
        self.lines = lines
            .into_iter()
            .map(|line| OcrLine {
                confidence: clamp_confidence(line.confidence),
                ..line
            })
            .collect();
        self
    }

    pub fn with_signals(mut self, signals: Signals) -> Self {
        self.signals = Some(signals);
        self
    }
}

/// Clamp a confidence score to 0-100, mapping NaN to 0
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

// ============================================================================
// Vision
// ============================================================================

/// Closed vocabulary of visual asset types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    ProductImage,
    Thumbnail,
    Logo,
    Icon,
    Badge,
    Banner,
    Button,
    Other,
}

impl AssetKind {
    pub const VOCABULARY: &'static [&'static str] = &[
        "product_image",
        "thumbnail",
        "logo",
        "icon",
        "badge",
        "banner",
        "button",
        "other",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductImage => "product_image",
            Self::Thumbnail => "thumbnail",
            Self::Logo => "logo",
            Self::Icon => "icon",
            Self::Badge => "badge",
            Self::Banner => "banner",
            Self::Button => "button",
            Self::Other => "other",
        }
    }

    fn from_label(raw: &str) -> Self {
        match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "product_image" | "image" | "photo" => Self::ProductImage,
            "thumbnail" => Self::Thumbnail,
            "logo" => Self::Logo,
            "icon" => Self::Icon,
            "badge" => Self::Badge,
            "banner" => Self::Banner,
            "button" => Self::Button,
            _ => Self::Other,
        }
    }
}

impl<'de> Deserialize<'de> for AssetKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(raw.as_str().map(AssetKind::from_label).unwrap_or(AssetKind::Other))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualAsset {
    #[serde(rename = "type", default = "default_asset_kind")]
    pub kind: AssetKind,
    #[serde(default, deserialize_with = "lenient::string")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub position: String,
    #[serde(default, deserialize_with = "lenient::confidence")]
    pub confidence: f32,
}

fn default_asset_kind() -> AssetKind {
    AssetKind::Other
}

/// A feature record as produced by the vision pass and by fusion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(
        default,
        alias = "dataShown",
        alias = "data",
        deserialize_with = "lenient::string"
    )]
    pub data_displayed: String,
    #[serde(default, alias = "type")]
    pub data_type: DataType,
    #[serde(default, deserialize_with = "lenient::string")]
    pub position: String,
    #[serde(default, alias = "visualStyling", deserialize_with = "lenient::string")]
    pub styling: String,
    #[serde(default, alias = "likelySource", deserialize_with = "lenient::string")]
    pub api_source: String,
    #[serde(
        rename = "isMVP",
        default = "default_true",
        alias = "isMvp",
        alias = "required",
        deserialize_with = "lenient::flag_or_true"
    )]
    pub is_mvp: bool,
}

impl FeatureRecord {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            data_displayed: String::new(),
            data_type,
            position: String::new(),
            styling: String::new(),
            api_source: String::new(),
            is_mvp: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDependency {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string_set")]
    pub fields: BTreeSet<String>,
}

/// Output of the structured vision pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionResult {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub price: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub rating: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub review_count: String,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub primary_image_present: bool,
    #[serde(default, deserialize_with = "lenient::vec")]
    pub visual_assets: Vec<VisualAsset>,
    #[serde(default, deserialize_with = "lenient::vec")]
    pub features: Vec<FeatureRecord>,
    #[serde(default, deserialize_with = "lenient::vec")]
    pub api_dependencies: Vec<ApiDependency>,
}

// ============================================================================
// Fusion output
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionSummary {
    pub ocr_confidence: f32,
    pub visual_assets_detected: usize,
    pub primary_image_present: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedOutput {
    pub features: Vec<FeatureRecord>,
    pub api_dependencies: Vec<ApiDependency>,
    pub cross_check: Vec<String>,
    pub summary: FusionSummary,
}

// ============================================================================
// Parsed features and layout
// ============================================================================

/// A feature recovered from a markdown report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub name: String,
    pub description: String,
    pub data_type: DataType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styling: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_source: Option<String>,
    #[serde(rename = "isMVP")]
    pub is_mvp: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Hero,
    Highlighted,
    Detailed,
    List,
    Grid,
    Actions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
    Grid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutSection {
    #[serde(rename = "type")]
    pub kind: SectionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub features: Vec<Feature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<Orientation>,
}

// ============================================================================
// Lenient deserializers
// ============================================================================

/// Field deserializers that never fail on a wrong JSON type.
///
/// Model output is non-deterministic, so a mistyped field degrades to its
/// empty value instead of rejecting the whole object.
pub mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::collections::BTreeSet;

    fn value_to_string(value: &Value) -> String {
        match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(value_to_string(&Value::deserialize(deserializer)?))
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(parse_flag(&Value::deserialize(deserializer)?).unwrap_or(false))
    }

    pub fn flag_or_true<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(parse_flag(&Value::deserialize(deserializer)?).unwrap_or(true))
    }

    fn parse_flag(value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let raw = match &value {
            Value::Number(n) => n.as_f64().unwrap_or(0.0) as f32,
            Value::String(s) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
            _ => 0.0,
        };
        Ok(super::clamp_confidence(raw))
    }

    /// Non-array values become an empty vec; elements that fail to
    /// deserialize are skipped.
    pub fn vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn string_set<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeSet<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .iter()
                .map(value_to_string)
                .filter(|s| !s.is_empty())
                .collect(),
            Value::String(s) => s
                .split(',')
                .map(|field| field.trim().to_string())
                .filter(|field| !field.is_empty())
                .collect(),
            _ => BTreeSet::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_normalize_synonyms() {
        assert_eq!(DataType::normalize("Button"), Some(DataType::Action));
        assert_eq!(DataType::normalize(" review "), Some(DataType::Rating));
        assert_eq!(DataType::normalize("photo"), Some(DataType::Image));
        assert_eq!(DataType::normalize("price"), Some(DataType::Number));
        assert_eq!(DataType::normalize("label"), Some(DataType::Badge));
        assert_eq!(DataType::normalize("carousel"), None);
    }

    #[test]
    fn test_data_type_deserialize_never_fails() {
        let parsed: DataType = serde_json::from_str("\"carousel\"").unwrap();
        assert_eq!(parsed, DataType::Other);
        let parsed: DataType = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, DataType::Other);
        let parsed: DataType = serde_json::from_str("\"rating\"").unwrap();
        assert_eq!(parsed, DataType::Rating);
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(OcrResult::new("x", 140.0).confidence, 100.0);
        assert_eq!(OcrResult::new("x", -3.0).confidence, 0.0);
        assert_eq!(clamp_confidence(f32::NAN), 0.0);
    }

    #[test]
    fn test_feature_record_lenient_fields() {
        let record: FeatureRecord = serde_json::from_str(
            r#"{"name": "Price", "dataShown": 19.99, "type": "price", "required": "no"}"#,
        )
        .unwrap();
        assert_eq!(record.data_displayed, "19.99");
        assert_eq!(record.data_type, DataType::Number);
        assert!(!record.is_mvp);
        assert!(record.description.is_empty());
    }

    #[test]
    fn test_visual_asset_kind_vocabulary() {
        let asset: VisualAsset = serde_json::from_str(
            r#"{"type": "Product Image", "label": "hero shot", "confidence": 130}"#,
        )
        .unwrap();
        assert_eq!(asset.kind, AssetKind::ProductImage);
        assert_eq!(asset.confidence, 100.0);

        let asset: VisualAsset = serde_json::from_str(r#"{"type": "sparkle"}"#).unwrap();
        assert_eq!(asset.kind, AssetKind::Other);
        assert!(AssetKind::VOCABULARY.contains(&asset.kind.as_str()));
    }
}
