//! Confidence-weighted fusion of the OCR and vision passes.
//!
//! `fuse` is a pure function of its inputs and the [`Policy`]: it never
//! fails, and identical inputs give identical output.

use crate::config::Policy;
use crate::snapshot::is_image_data;
use crate::types::{
    clamp_confidence, DataType, FeatureRecord, FusedOutput, FusionSummary, OcrResult, Signals,
    VisionResult, VisualAsset,
};

/// Number of assets listed in the visual asset rollup
pub const MAX_ASSETS_IN_ROLLUP: usize = 8;

/// Fields resolved between the two passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Title,
    Price,
    Rating,
    ReviewCount,
}

impl FieldKind {
    /// Numeric fields always take the vision value when both passes report one
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Title)
    }
}

/// Resolve one field from its OCR and vision candidates.
///
/// - both empty: empty
/// - one side empty: the other side
/// - numeric field: vision
/// - title: OCR when `ocr_confidence` reaches the policy threshold, else vision
pub fn pick_preferred_value(
    field: FieldKind,
    ocr_value: &str,
    vision_value: &str,
    ocr_confidence: f32,
    policy: &Policy,
) -> String {
    let ocr_value = ocr_value.trim();
    let vision_value = vision_value.trim();

    let chosen = match (ocr_value.is_empty(), vision_value.is_empty()) {
        (true, true) => "",
        (false, true) => ocr_value,
        (true, false) => vision_value,
        (false, false) if field.is_numeric() => vision_value,
        (false, false) => {
            if ocr_confidence >= policy.ocr_title_threshold {
                ocr_value
            } else {
                vision_value
            }
        }
    };

    chosen.to_string()
}

/// Merge both passes into one feature inventory
pub fn fuse(
    ocr: &OcrResult,
    ocr_signals: &Signals,
    vision: &VisionResult,
    policy: &Policy,
) -> FusedOutput {
    let ocr_confidence = clamp_confidence(ocr.confidence);

    let resolve = |field, ocr_value: &str, vision_value: &str| {
        pick_preferred_value(field, ocr_value, vision_value, ocr_confidence, policy)
    };
    let fused = Signals {
        title: resolve(FieldKind::Title, &ocr_signals.title, &vision.title),
        price: resolve(FieldKind::Price, &ocr_signals.price, &vision.price),
        rating: resolve(FieldKind::Rating, &ocr_signals.rating, &vision.rating),
        review_count: resolve(
            FieldKind::ReviewCount,
            &ocr_signals.review_count,
            &vision.review_count,
        ),
    };

    // Features echoing the snapshot payload are not real page content
    let model_features: Vec<FeatureRecord> = vision
        .features
        .iter()
        .filter(|feature| !feature.name.trim().is_empty())
        .filter(|feature| !leaks_image_payload(feature))
        .cloned()
        .collect();

    let mut features: Vec<FeatureRecord> = SYNTHESIS_RULES
        .iter()
        .filter(|rule| !has_feature_named(&model_features, rule.keyword))
        .filter_map(|rule| (rule.build)(&fused))
        .collect();
    features.extend(model_features);

    if let Some(rollup) = visual_asset_rollup(&vision.visual_assets) {
        features.push(rollup);
    }

    features.retain(|feature| !(names_primary_image(&feature.name) && leaks_image_payload(feature)));

    let issues = cross_check(ocr_signals, vision);
    if !issues.is_empty() {
        tracing::debug!(issues = issues.len(), "OCR and vision disagree");
    }

    FusedOutput {
        features,
        api_dependencies: vision.api_dependencies.clone(),
        cross_check: issues,
        summary: FusionSummary {
            ocr_confidence,
            visual_assets_detected: vision.visual_assets.len(),
            primary_image_present: vision.primary_image_present,
        },
    }
}

// ============================================================================
// Synthesis
// ============================================================================

/// A feature synthesized from a fused field, skipped when a model feature
/// already carries `keyword` in its name.
struct SynthesisRule {
    keyword: &'static str,
    build: fn(&Signals) -> Option<FeatureRecord>,
}

const SYNTHESIS_RULES: &[SynthesisRule] = &[
    SynthesisRule {
        keyword: "title",
        build: synthesize_title,
    },
    SynthesisRule {
        keyword: "price",
        build: synthesize_price,
    },
    SynthesisRule {
        keyword: "rating",
        build: synthesize_rating,
    },
];

fn synthesize_title(signals: &Signals) -> Option<FeatureRecord> {
    if signals.title.is_empty() {
        return None;
    }
    Some(FeatureRecord {
        description: "Main product name shown at the top of the page".to_string(),
        data_displayed: signals.title.clone(),
        position: "Top of page".to_string(),
        styling: "Large bold heading".to_string(),
        api_source: "Product Catalog API".to_string(),
        ..FeatureRecord::new("Product Title", DataType::Text)
    })
}

fn synthesize_price(signals: &Signals) -> Option<FeatureRecord> {
    if signals.price.is_empty() {
        return None;
    }
    Some(FeatureRecord {
        description: "Current selling price of the product".to_string(),
        data_displayed: signals.price.clone(),
        position: "Below the title".to_string(),
        styling: "Prominent, emphasized text".to_string(),
        api_source: "Pricing API".to_string(),
        ..FeatureRecord::new("Price", DataType::Number)
    })
}

fn synthesize_rating(signals: &Signals) -> Option<FeatureRecord> {
    let summary = rating_sentence(&signals.rating, &signals.review_count)?;
    Some(FeatureRecord {
        description: "Average customer rating and number of reviews".to_string(),
        data_displayed: summary,
        position: "Near the title".to_string(),
        styling: "Star icons with review count".to_string(),
        api_source: "Reviews API".to_string(),
        ..FeatureRecord::new("Rating and Review Summary", DataType::Rating)
    })
}

/// "4.5 out of 5 stars from 2,341 reviews", or whichever half is known
fn rating_sentence(rating: &str, review_count: &str) -> Option<String> {
    let stars = (!rating.is_empty()).then(|| {
        if rating.to_lowercase().contains("out of") {
            rating.to_string()
        } else {
            format!("{} out of 5 stars", rating)
        }
    });
    let reviews = (!review_count.is_empty())
        .then(|| format!("{} reviews", format_thousands(review_count)));

    match (stars, reviews) {
        (Some(stars), Some(reviews)) => Some(format!("{} from {}", stars, reviews)),
        (Some(stars), None) => Some(stars),
        (None, Some(reviews)) => Some(reviews),
        (None, None) => None,
    }
}

/// Group an integer count with thousands separators; other text is kept as-is
pub fn format_thousands(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return raw.to_string();
    }

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return "0".to_string();
    }

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

fn visual_asset_rollup(assets: &[VisualAsset]) -> Option<FeatureRecord> {
    if assets.is_empty() {
        return None;
    }

    let listed = assets
        .iter()
        .take(MAX_ASSETS_IN_ROLLUP)
        .map(|asset| {
            if asset.label.is_empty() {
                asset.kind.as_str().to_string()
            } else {
                format!("{} ({})", asset.kind.as_str(), asset.label)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    Some(FeatureRecord {
        description: format!("{} visual assets detected on the page", assets.len()),
        data_displayed: listed,
        position: "Throughout the page".to_string(),
        styling: "Images and graphics".to_string(),
        api_source: "Product Media API".to_string(),
        ..FeatureRecord::new("Visual Assets", DataType::List)
    })
}

// ============================================================================
// Filters and checks
// ============================================================================

fn has_feature_named(features: &[FeatureRecord], keyword: &str) -> bool {
    features
        .iter()
        .any(|feature| feature.name.to_lowercase().contains(keyword))
}

/// Whether a feature carries an inline image payload as its displayed data
fn leaks_image_payload(feature: &FeatureRecord) -> bool {
    is_image_data(&feature.data_displayed) || is_image_data(&feature.description)
}

fn names_primary_image(name: &str) -> bool {
    let name = name.to_lowercase();
    (name.contains("image") || name.contains("photo"))
        && (name.contains("primary") || name.contains("main") || name.contains("product"))
}

/// Diagnostic notes where the passes disagree on title or price
fn cross_check(ocr: &Signals, vision: &VisionResult) -> Vec<String> {
    let mut issues = Vec::new();

    let (ocr_title, vision_title) = (ocr.title.trim(), vision.title.trim());
    if !ocr_title.is_empty()
        && !vision_title.is_empty()
        && ocr_title.to_lowercase() != vision_title.to_lowercase()
    {
        issues.push(format!(
            "Title mismatch: OCR read \"{}\" but vision reported \"{}\"",
            ocr_title, vision_title
        ));
    }

    let (ocr_price, vision_price) = (ocr.price.trim(), vision.price.trim());
    if !ocr_price.is_empty() && !vision_price.is_empty() && ocr_price != vision_price {
        issues.push(format!(
            "Price mismatch: OCR read \"{}\" but vision reported \"{}\"",
            ocr_price, vision_price
        ));
    }

    issues
}
