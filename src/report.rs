//! Markdown rendering of a fused result.
//!
//! Section order and fallback lines are part of the report format that
//! [`crate::parser`] and downstream consumers rely on.

use crate::types::{FeatureRecord, FusedOutput};
use std::fmt::Write;

pub const REPORT_TITLE: &str = "# Product Page Feature Analysis";
pub const FEATURES_HEADING: &str = "## Visible Features";
pub const DEPENDENCIES_HEADING: &str = "## Data Dependencies Map";
pub const CROSS_CHECK_HEADING: &str = "## Cross-Check";
pub const SUMMARY_HEADING: &str = "## Confidence Summary";

/// Listed when the fused result names no dependencies
pub const FALLBACK_DEPENDENCIES: [&str; 3] = [
    "- Product Catalog API: title, description, images",
    "- Pricing API: price, currency, discounts",
    "- Reviews API: rating, reviewCount",
];

pub const NO_CONFLICTS_LINE: &str = "- No conflicts detected between OCR and vision results";
pub const NO_FEATURES_LINE: &str = "_No visible features were detected._";

/// Render the full report
pub fn render_report(output: &FusedOutput) -> String {
    let mut out = String::new();

    out.push_str(REPORT_TITLE);
    out.push_str("\n\n");

    out.push_str(FEATURES_HEADING);
    out.push_str("\n\n");
    if output.features.is_empty() {
        out.push_str(NO_FEATURES_LINE);
        out.push_str("\n\n");
    }
    for feature in &output.features {
        render_feature(&mut out, feature);
    }

    out.push_str(DEPENDENCIES_HEADING);
    out.push_str("\n\n");
    let dependencies: Vec<_> = output
        .api_dependencies
        .iter()
        .filter(|dep| !dep.name.trim().is_empty())
        .collect();
    if dependencies.is_empty() {
        for line in FALLBACK_DEPENDENCIES {
            out.push_str(line);
            out.push('\n');
        }
    }
    for dep in dependencies {
        let name = single_line(&dep.name);
        if dep.fields.is_empty() {
            let _ = writeln!(out, "- {}", name);
        } else {
            let fields = dep.fields.iter().cloned().collect::<Vec<_>>().join(", ");
            let _ = writeln!(out, "- {}: {}", name, single_line(&fields));
        }
    }
    out.push('\n');

    out.push_str(CROSS_CHECK_HEADING);
    out.push_str("\n\n");
    if output.cross_check.is_empty() {
        out.push_str(NO_CONFLICTS_LINE);
        out.push('\n');
    }
    for issue in &output.cross_check {
        let _ = writeln!(out, "- {}", single_line(issue));
    }
    out.push('\n');

    let summary = &output.summary;
    out.push_str(SUMMARY_HEADING);
    out.push_str("\n\n");
    let _ = writeln!(out, "- OCR confidence: {:.0}%", summary.ocr_confidence);
    let _ = writeln!(
        out,
        "- Visual assets detected: {}",
        summary.visual_assets_detected
    );
    let _ = writeln!(
        out,
        "- Primary product image present: {}",
        yes_no(summary.primary_image_present)
    );

    out
}

fn render_feature(out: &mut String, feature: &FeatureRecord) {
    let _ = writeln!(out, "### [{}]", heading_name(&feature.name));

    let optional_fields = [
        ("Description", &feature.description),
        ("Data displayed", &feature.data_displayed),
    ];
    for (label, value) in optional_fields {
        write_field(out, label, value);
    }

    let _ = writeln!(out, "- **Data type**: {}", feature.data_type.as_str());

    let optional_fields = [
        ("Position", &feature.position),
        ("Visual styling", &feature.styling),
        ("Likely API/source", &feature.api_source),
    ];
    for (label, value) in optional_fields {
        write_field(out, label, value);
    }

    let _ = writeln!(
        out,
        "- **Required for implementation**: {}",
        yes_no(feature.is_mvp)
    );
    out.push('\n');
}

fn write_field(out: &mut String, label: &str, value: &str) {
    let value = single_line(value);
    if !value.is_empty() {
        let _ = writeln!(out, "- **{}**: {}", label, value);
    }
}

/// Brackets would end the heading name early when parsed back
fn heading_name(name: &str) -> String {
    single_line(name).replace('[', "(").replace(']', ")")
}

fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}
