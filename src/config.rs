use crate::Args;
use clap::ValueEnum;
use serde::Serialize;

/// Text recognition strategy for image snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackend {
    /// Local pixel-based recognition engine
    Pixel,
    /// Vision model prompted for OCR JSON
    Model,
}

impl OcrBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pixel => "pixel",
            Self::Model => "model",
        }
    }
}

/// Model endpoint settings
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub vision_model: String,
    pub ocr_model: String,
    pub analysis_model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

/// Tunable extraction and fusion constants.
///
/// Both values are heuristics without a derivation; they are kept
/// overridable rather than baked into the algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// OCR confidence (0-100) at or above which an OCR title beats the vision title
    pub ocr_title_threshold: f32,
    /// Minimum character length for a line to be taken as a title
    pub min_title_length: usize,
}

pub const DEFAULT_OCR_TITLE_THRESHOLD: f32 = 75.0;
pub const DEFAULT_MIN_TITLE_LENGTH: usize = 8;

impl Default for Policy {
    fn default() -> Self {
        Self {
            ocr_title_threshold: DEFAULT_OCR_TITLE_THRESHOLD,
            min_title_length: DEFAULT_MIN_TITLE_LENGTH,
        }
    }
}

/// Server configuration, built once at start-up
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_body_size: usize,
    pub ocr_backend: OcrBackend,
    pub model: ModelConfig,
    pub policy: Policy,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_body_size: args.max_body_size,
            ocr_backend: args.ocr_backend,
            model: ModelConfig {
                base_url: args.model_base_url,
                api_key: args.api_key.filter(|key| !key.trim().is_empty()),
                vision_model: args.vision_model,
                ocr_model: args.ocr_model,
                analysis_model: args.analysis_model,
                timeout_secs: args.model_timeout_secs.max(1),
                max_tokens: args.max_tokens,
            },
            policy: Policy {
                ocr_title_threshold: args.ocr_title_threshold.clamp(0.0, 100.0),
                min_title_length: args.min_title_length,
            },
        }
    }
}

#[cfg(test)]
impl Config {
    /// Configuration pointing at a model endpoint, suitable for tests
    pub fn for_tests(base_url: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_body_size: 10 * 1024 * 1024,
            ocr_backend: OcrBackend::Model,
            model: ModelConfig {
                base_url: base_url.to_string(),
                api_key: None,
                vision_model: "vision-test".to_string(),
                ocr_model: "ocr-test".to_string(),
                analysis_model: "analysis-test".to_string(),
                timeout_secs: 5,
                max_tokens: 512,
            },
            policy: Policy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults_from_args() {
        let args = Args::parse_from(["snapshot-inventory-server"]);
        let config = Config::from(args);

        assert_eq!(config.port, 3001);
        assert_eq!(config.ocr_backend, OcrBackend::Model);
        assert_eq!(config.policy, Policy::default());
        assert_eq!(config.policy.ocr_title_threshold, 75.0);
        assert_eq!(config.policy.min_title_length, 8);
    }

    #[test]
    fn test_policy_overrides() {
        let args = Args::parse_from([
            "snapshot-inventory-server",
            "--ocr-backend",
            "pixel",
            "--ocr-title-threshold",
            "140",
            "--min-title-length",
            "5",
            "--api-key",
            "  ",
        ]);
        let config = Config::from(args);

        assert_eq!(config.ocr_backend, OcrBackend::Pixel);
        assert_eq!(config.policy.ocr_title_threshold, 100.0);
        assert_eq!(config.policy.min_title_length, 5);
        assert!(config.model.api_key.is_none());
    }
}
