//! Local pixel OCR over snapshot images with ocrs.
//!
//! Detection and recognition models are fetched into the user cache the
//! first time the engine is built.

use crate::engine::TextRecognizer;
use crate::error::ExtractorError;
use crate::snapshot::ImagePayload;
use crate::types::{OcrLine, OcrResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams};
use rten::Model;
use std::path::PathBuf;
use std::sync::Arc;

/// A model file fetched once into the user cache
struct ModelFile {
    name: &'static str,
    url: &'static str,
}

const DETECTION_MODEL: ModelFile = ModelFile {
    name: "text-detection.rten",
    url: "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten",
};

const RECOGNITION_MODEL: ModelFile = ModelFile {
    name: "text-recognition.rten",
    url: "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten",
};

const MAX_MODEL_BYTES: u64 = 64 * 1024 * 1024;

/// Pixel OCR engine wrapping the ocrs library
pub struct OcrsEngine {
    engine: Arc<OcrsOcrEngine>,
}

impl OcrsEngine {
    /// Create the engine, downloading models if needed
    pub fn new() -> Result<Self, ExtractorError> {
        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(DETECTION_MODEL.load()?),
            recognition_model: Some(RECOGNITION_MODEL.load()?),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            ExtractorError::Initialization(format!("Failed to create OCR engine: {}", e))
        })?;

        tracing::info!("ocrs engine ready");

        Ok(Self {
            engine: Arc::new(engine),
        })
    }
}

impl TextRecognizer for OcrsEngine {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        "Pure Rust pixel OCR engine - local, no model endpoint required"
    }

    fn recognize<'a>(
        &'a self,
        image: &'a ImagePayload,
    ) -> BoxFuture<'a, Result<OcrResult, ExtractorError>> {
        let engine = Arc::clone(&self.engine);
        let bytes = image.bytes().to_vec();

        async move {
            tokio::task::spawn_blocking(move || recognize_bytes(&engine, &bytes))
                .await
                .map_err(|e| ExtractorError::Engine(format!("OCR task failed: {}", e)))?
        }
        .boxed()
    }
}

/// Decode an image and run detection + recognition over it
fn recognize_bytes(engine: &OcrsOcrEngine, bytes: &[u8]) -> Result<OcrResult, ExtractorError> {
    let start = std::time::Instant::now();

    let img = image::load_from_memory(bytes)
        .map_err(|e| ExtractorError::Decode(format!("Failed to load image: {}", e)))?;

    // ImageSource::from_bytes expects RGB8 in HWC layout
    let rgb_img = img.into_rgb8();
    let dimensions = rgb_img.dimensions();

    let img_source = ImageSource::from_bytes(rgb_img.as_raw(), dimensions).map_err(|e| {
        ExtractorError::Engine(format!("Failed to create image source: {}", e))
    })?;

    let ocr_input = engine
        .prepare_input(img_source)
        .map_err(|e| ExtractorError::Engine(format!("Failed to prepare input: {}", e)))?;

    let word_rects = engine
        .detect_words(&ocr_input)
        .map_err(|e| ExtractorError::Engine(format!("Failed to detect words: {}", e)))?;

    let line_rects = engine.find_text_lines(&ocr_input, &word_rects);

    let line_texts = engine
        .recognize_text(&ocr_input, &line_rects)
        .map_err(|e| ExtractorError::Engine(format!("Failed to recognize text: {}", e)))?;

    let lines: Vec<OcrLine> = line_texts
        .iter()
        .filter_map(|line| line.as_ref())
        .map(|line| {
            line.words()
                .map(|word| word.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.trim().is_empty())
        .map(|text| OcrLine {
            confidence: line_confidence(&text),
            text,
            bbox: None,
        })
        .collect();

    let text = lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let confidence = text_confidence(&lines);

    tracing::debug!(
        lines = lines.len(),
        width = dimensions.0,
        height = dimensions.1,
        confidence,
        elapsed_ms = %start.elapsed().as_millis(),
        "ocrs recognition finished"
    );

    Ok(OcrResult::new(text, confidence).with_lines(lines))
}

// ============================================================================
// Line scoring
// ============================================================================

// ocrs reports no confidence of its own. A recognized line is scored by how
// much it reads like product page copy: known characters, word or price
// shaped tokens, no long runs of one glyph.

/// 0-100 score for one recognized line
fn line_confidence(line: &str) -> f32 {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return 0.0;
    }

    let score = 0.5 * charset_score(line) + 0.35 * token_score(&tokens) + 0.15 * run_score(line);
    (score * 100.0).clamp(0.0, 100.0)
}

/// Line scores averaged by line length
fn text_confidence(lines: &[OcrLine]) -> f32 {
    let total: usize = lines.iter().map(|line| line.text.chars().count()).sum();
    if total == 0 {
        return 0.0;
    }

    lines
        .iter()
        .map(|line| line.confidence * line.text.chars().count() as f32)
        .sum::<f32>()
        / total as f32
}

fn charset_score(line: &str) -> f32 {
    let (total, stray) = line
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(total, stray), c| {
            let known = c.is_alphanumeric() || c.is_ascii_punctuation() || is_page_glyph(c);
            (total + 1, stray + usize::from(!known))
        });

    if total == 0 {
        return 0.0;
    }
    1.0 - (stray as f32 / total as f32 * 5.0).min(1.0)
}

fn token_score(tokens: &[&str]) -> f32 {
    let readable = tokens.iter().filter(|token| is_readable_token(token)).count();
    readable as f32 / tokens.len() as f32
}

/// A word, a number or price, a lone article, or a run of rating/separator glyphs
fn is_readable_token(token: &str) -> bool {
    let core = token.trim_matches(|c: char| !c.is_alphanumeric());
    if core.is_empty() {
        return token.chars().all(is_page_glyph) || matches!(token, "&" | "-" | "|" | "/");
    }

    let chars = core.chars().count();
    let letters = core.chars().filter(|c| c.is_alphabetic()).count();
    let numeric = core
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == ',');

    numeric
        || (chars == 1 && matches!(core, "a" | "A" | "I"))
        || (letters >= 2 && letters * 5 >= chars * 3)
}

/// Longest run of one repeated glyph; digits and stars repeat legitimately
fn run_score(line: &str) -> f32 {
    let mut longest = 0;
    let mut current = 0;
    let mut prev = None;

    for c in line.chars() {
        let counts = !c.is_whitespace() && !c.is_ascii_digit() && !matches!(c, '★' | '☆');
        current = if counts && Some(c) == prev { current + 1 } else { 1 };
        if counts {
            longest = longest.max(current);
        }
        prev = Some(c);
    }

    match longest {
        0..=3 => 1.0,
        4..=5 => 0.6,
        _ => 0.2,
    }
}

/// Currency, rating stars and bullets
fn is_page_glyph(c: char) -> bool {
    matches!(
        c,
        '€' | '£' | '¥' | '₹' | '¢' | '₩' | '₽' | '★' | '☆' | '•' | '–' | '—' | '’' | '“' | '”'
    )
}

// ============================================================================
// Model cache
// ============================================================================

impl ModelFile {
    fn load(&self) -> Result<Model, ExtractorError> {
        let path = self.cached_path()?;
        Model::load_file(&path).map_err(init_error(self.name))
    }

    fn cached_path(&self) -> Result<PathBuf, ExtractorError> {
        let dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(env!("CARGO_PKG_NAME"));
        let path = dir.join(self.name);

        if path.exists() {
            tracing::debug!(model = self.name, path = %path.display(), "Using cached OCR model");
            return Ok(path);
        }

        std::fs::create_dir_all(&dir).map_err(init_error("model cache directory"))?;

        tracing::info!(model = self.name, url = self.url, "Downloading OCR model");
        let mut body = ureq::get(self.url)
            .call()
            .map_err(init_error(self.name))?
            .into_body();
        let bytes = body
            .with_config()
            .limit(MAX_MODEL_BYTES)
            .read_to_vec()
            .map_err(init_error(self.name))?;

        // A partial download must never be found under the final name
        let partial = path.with_extension("part");
        std::fs::write(&partial, &bytes).map_err(init_error(self.name))?;
        std::fs::rename(&partial, &path).map_err(init_error(self.name))?;

        tracing::info!(model = self.name, bytes = bytes.len(), "OCR model cached");
        Ok(path)
    }
}

fn init_error<E: std::fmt::Display>(what: &'static str) -> impl Fn(E) -> ExtractorError {
    move |e| ExtractorError::Initialization(format!("{}: {}", what, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> OcrLine {
        OcrLine {
            confidence: line_confidence(text),
            text: text.to_string(),
            bbox: None,
        }
    }

    #[test]
    fn test_blank_line_scores_zero() {
        assert_eq!(line_confidence(""), 0.0);
        assert_eq!(line_confidence("   "), 0.0);
        assert_eq!(text_confidence(&[]), 0.0);
    }

    #[test]
    fn test_product_copy_scores_high() {
        for text in [
            "Wireless Mouse with Silent Clicks",
            "$14.99",
            "€25 | Free delivery",
            "★★★★☆ 4.5 out of 5",
            "2,341 ratings",
            "Café crème – 250 ml",
        ] {
            let score = line_confidence(text);
            assert!(score > 90.0, "{:?} scored {}", text, score);
        }
    }

    #[test]
    fn test_garbled_line_scores_low() {
        let score = line_confidence("§±®©¥€£¢¤");
        assert!(score < 50.0, "got {}", score);
    }

    #[test]
    fn test_letter_fragments_score_lower() {
        let score = line_confidence("a b c d e f g");
        assert!(score < 75.0, "got {}", score);
    }

    #[test]
    fn test_repeated_glyph_run() {
        assert_eq!(run_score("Hello World"), 1.0);
        assert_eq!(run_score("★★★★★ 10000"), 1.0);
        assert!(run_score("Sooooooo good") < 1.0);
    }

    #[test]
    fn test_text_confidence_weighted_by_length() {
        let lines = [line("Blue Widget"), line("§§§§§§§§§§§")];
        let overall = text_confidence(&lines);
        assert!(overall > 35.0 && overall < 65.0, "got {}", overall);
    }
}
