//! Request pipeline: classify the snapshot, run the extractors, fuse and
//! render.
//!
//! Extractor failures degrade the result instead of failing the request.
//! The only errors surfaced are an empty snapshot, a malformed data URL,
//! and an image for which both extractors failed.

use crate::client::{CompletionRequest, ModelClient};
use crate::config::{Config, Policy};
use crate::engine::TextRecognizer;
use crate::error::AnalyzeError;
use crate::fusion::fuse;
use crate::parser::parse_analysis;
use crate::report::{
    render_report, CROSS_CHECK_HEADING, DEPENDENCIES_HEADING, FEATURES_HEADING, REPORT_TITLE,
    SUMMARY_HEADING,
};
use crate::signals::extract_signals;
use crate::snapshot::{ImagePayload, Snapshot};
use crate::types::{OcrResult, Signals, VisionResult};
use crate::vision::VisionExtractor;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

/// Marker phrase unique to the text analysis prompt
pub const ANALYSIS_PROMPT_MARKER: &str = "Analyze this snapshot";

static ANALYSIS_INSTRUCTIONS: LazyLock<String> = LazyLock::new(|| {
    format!(
        "You are a product analyst. Produce a markdown feature inventory of the product page \
described below, using exactly this structure:\n\n\
{REPORT_TITLE}\n\n\
{FEATURES_HEADING}\n\n\
### [Feature Name]\n\
- **Description**: what the feature is for\n\
- **Data displayed**: the exact visible value\n\
- **Data type**: one of text, number, image, rating, list, action, badge\n\
- **Position**: where it appears on the page\n\
- **Visual styling**: how it looks\n\
- **Likely API/source**: the backend that supplies it\n\
- **Required for implementation**: Yes or No\n\n\
(repeat the block for every visible feature)\n\n\
{DEPENDENCIES_HEADING}\n\n\
- <Name> API: field, field\n\n\
{CROSS_CHECK_HEADING}\n\n\
- any inconsistencies you notice in the content\n\n\
{SUMMARY_HEADING}\n\n\
- how complete the description is\n\n\
Do not invent features that are not described."
    )
});

fn analysis_prompt(content: &str) -> String {
    format!(
        "{}\n\n{}:\n\n{}",
        ANALYSIS_INSTRUCTIONS.as_str(),
        ANALYSIS_PROMPT_MARKER,
        content
    )
}

/// Which extractors contributed to a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMode {
    /// Image: OCR and vision both succeeded
    Fused,
    /// Image: vision failed
    OcrOnly,
    /// Image: OCR failed
    VisionOnly,
    /// Text: the analysis model wrote the report
    TextModel,
    /// Text: the model failed, report built from pattern signals
    TextSignals,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fused => "fused",
            Self::OcrOnly => "ocr-only",
            Self::VisionOnly => "vision-only",
            Self::TextModel => "text-model",
            Self::TextSignals => "text-signals",
        }
    }
}

/// A rendered report with its diagnostics
#[derive(Debug, Clone)]
pub struct Analysis {
    pub report: String,
    pub mode: ExtractionMode,
    /// Absent when no recognition ran
    pub ocr_confidence: Option<f32>,
    pub cross_check_issues: usize,
    pub visual_assets_detected: usize,
    pub features: usize,
}

/// Runs one snapshot through extraction, fusion and rendering
pub struct Analyzer {
    client: Arc<dyn ModelClient>,
    recognizer: Arc<dyn TextRecognizer>,
    vision: VisionExtractor,
    analysis_model: String,
    policy: Policy,
}

impl Analyzer {
    pub fn new(
        client: Arc<dyn ModelClient>,
        recognizer: Arc<dyn TextRecognizer>,
        config: &Config,
    ) -> Self {
        Self {
            vision: VisionExtractor::new(client.clone(), config.model.vision_model.clone()),
            client,
            recognizer,
            analysis_model: config.model.analysis_model.clone(),
            policy: config.policy,
        }
    }

    pub fn recognizer(&self) -> &dyn TextRecognizer {
        self.recognizer.as_ref()
    }

    pub async fn analyze(&self, content: &str) -> Result<Analysis, AnalyzeError> {
        let start = Instant::now();

        let analysis = match Snapshot::classify(content)? {
            Snapshot::Image(image) => self.analyze_image(&image).await?,
            Snapshot::Text(text) => self.analyze_text(&text).await,
        };

        tracing::info!(
            mode = analysis.mode.as_str(),
            ocr_confidence = ?analysis.ocr_confidence,
            features = analysis.features,
            elapsed_ms = %start.elapsed().as_millis(),
            cross_check_issues = analysis.cross_check_issues,
            report_len = analysis.report.len(),
            "Analysis complete"
        );

        Ok(analysis)
    }

    async fn analyze_image(&self, image: &ImagePayload) -> Result<Analysis, AnalyzeError> {
        tracing::debug!(
            mime = image.mime(),
            bytes = image.bytes().len(),
            recognizer = self.recognizer.name(),
            vision_model = self.vision.model(),
            "Running extractors"
        );

        let (ocr, vision) = tokio::join!(
            self.recognizer.recognize(image),
            self.vision.extract(image)
        );

        let (ocr, vision, mode) = match (ocr, vision) {
            (Ok(ocr), Ok(vision)) => (ocr, vision, ExtractionMode::Fused),
            (Ok(ocr), Err(e)) => {
                tracing::warn!(
                    extractor = "vision",
                    model = self.vision.model(),
                    error = %e,
                    "Vision extraction failed, continuing with OCR only"
                );
                (ocr, VisionResult::default(), ExtractionMode::OcrOnly)
            }
            (Err(e), Ok(vision)) => {
                tracing::warn!(
                    extractor = self.recognizer.name(),
                    error = %e,
                    "Text recognition failed, continuing with vision only"
                );
                (OcrResult::default(), vision, ExtractionMode::VisionOnly)
            }
            (Err(ocr_err), Err(vision_err)) => {
                tracing::error!(
                    ocr_error = %ocr_err,
                    vision_error = %vision_err,
                    "Both extractors failed"
                );
                return Err(AnalyzeError::Upstream(format!(
                    "text recognition failed ({}); vision extraction failed ({})",
                    ocr_err, vision_err
                )));
            }
        };

        let signals = match &ocr.signals {
            Some(signals) => signals.clone(),
            None => extract_signals(&ocr.text, &self.policy),
        };

        Ok(self.fuse_and_render(mode, &ocr, &signals, &vision))
    }

    async fn analyze_text(&self, text: &str) -> Analysis {
        let prompt = analysis_prompt(text);
        let completion = self
            .client
            .complete(CompletionRequest {
                model: &self.analysis_model,
                prompt: &prompt,
                image: None,
                json: false,
            })
            .await;

        match completion {
            Ok(report) => {
                let report = report.trim().to_string();
                Analysis {
                    features: parse_analysis(&report).features.len(),
                    report,
                    mode: ExtractionMode::TextModel,
                    ocr_confidence: None,
                    cross_check_issues: 0,
                    visual_assets_detected: 0,
                }
            }
            Err(e) => {
                tracing::warn!(
                    extractor = self.analysis_model.as_str(),
                    error = %e,
                    "Text analysis failed, building report from text signals"
                );
                let ocr = OcrResult::new(text, 100.0);
                let signals = extract_signals(text, &self.policy);
                self.fuse_and_render(
                    ExtractionMode::TextSignals,
                    &ocr,
                    &signals,
                    &VisionResult::default(),
                )
            }
        }
    }

    fn fuse_and_render(
        &self,
        mode: ExtractionMode,
        ocr: &OcrResult,
        signals: &Signals,
        vision: &VisionResult,
    ) -> Analysis {
        let fused = fuse(ocr, signals, vision, &self.policy);

        Analysis {
            report: render_report(&fused),
            mode,
            ocr_confidence: Some(fused.summary.ocr_confidence),
            cross_check_issues: fused.cross_check.len(),
            visual_assets_detected: fused.summary.visual_assets_detected,
            features: fused.features.len(),
        }
    }
}
