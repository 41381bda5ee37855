//! Markdown report parser.
//!
//! Recovers typed [`Feature`] records from a rendered report or from model
//! prose that loosely follows the same template. Every rule is a table
//! entry evaluated in order; the first label or keyword that matches wins.
//! Missing sections yield empty results, never errors.

use crate::codegen::mock_data;
use crate::types::{DataType, Feature};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Result of parsing one markdown document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedAnalysis {
    pub features: Vec<Feature>,
    pub api_dependencies: Vec<String>,
    pub raw_text: String,
}

static FEATURE_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*#{3,6}[ \t]+\[?([^\n\]]+)\]?").unwrap());
static ANY_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*#{1,6}[ \t]+(.*)$").unwrap());
static DEPENDENCY_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*[-•*][ \t]*(?:\*\*)?([A-Za-z][A-Za-z /]*?(?:API|Database))\b").unwrap()
});
static LEADING_BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*•][ \t]+").unwrap());

// ============================================================================
// Field rules
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKey {
    Description,
    DataDisplayed,
    DataType,
    Position,
    Styling,
    ApiSource,
    Required,
}

/// Labels per field, highest priority first
const FIELD_LABELS: &[(FieldKey, &[&str])] = &[
    (FieldKey::Description, &["Description"]),
    (
        FieldKey::DataDisplayed,
        &["Data displayed", "Data Displayed", "Data shown", "Displayed data"],
    ),
    (FieldKey::DataType, &["Data type", "Type"]),
    (FieldKey::Position, &["Position"]),
    (FieldKey::Styling, &["Visual styling", "Styling"]),
    (
        FieldKey::ApiSource,
        &["Likely API/source", "Likely source", "Source"],
    ),
    (FieldKey::Required, &["Required for implementation"]),
];

struct FieldRule {
    key: FieldKey,
    patterns: Vec<Regex>,
}

static FIELD_RULES: LazyLock<Vec<FieldRule>> = LazyLock::new(|| {
    FIELD_LABELS
        .iter()
        .map(|(key, labels)| FieldRule {
            key: *key,
            patterns: labels.iter().map(|label| label_pattern(label)).collect(),
        })
        .collect()
});

/// Optional bullet, optional bold, the label, a colon, then the rest of the line
fn label_pattern(label: &str) -> Regex {
    Regex::new(&format!(
        r"(?im)^[ \t]*(?:[-*•][ \t]*)?(?:\*\*)?{}(?:\*\*)?[ \t]*:[ \t]*(?:\*\*)?[ \t]*(.*)$",
        regex::escape(label)
    ))
    .unwrap()
}

/// Keyword inference used when no explicit data type is given
struct InferenceRule {
    data_type: DataType,
    name_keywords: &'static [&'static str],
    data_keywords: &'static [&'static str],
}

const INFERENCE_RULES: &[InferenceRule] = &[
    InferenceRule {
        data_type: DataType::Rating,
        name_keywords: &["rating", "star"],
        data_keywords: &["out of 5"],
    },
    InferenceRule {
        data_type: DataType::Image,
        name_keywords: &["image", "photo"],
        data_keywords: &[],
    },
    InferenceRule {
        data_type: DataType::Number,
        name_keywords: &["price", "count"],
        data_keywords: &[],
    },
    InferenceRule {
        data_type: DataType::List,
        name_keywords: &["review", "list"],
        data_keywords: &[],
    },
    InferenceRule {
        data_type: DataType::Action,
        name_keywords: &["button", "action", "cart", "add to"],
        data_keywords: &[],
    },
    InferenceRule {
        data_type: DataType::Badge,
        name_keywords: &["badge", "label"],
        data_keywords: &[],
    },
];

// ============================================================================
// Parsing
// ============================================================================

/// Parse a markdown analysis into features and API dependencies
pub fn parse_analysis(text: &str) -> ParsedAnalysis {
    let features: Vec<Feature> = extract_feature_blocks(text)
        .iter()
        .map(parse_feature)
        .collect();

    if features.is_empty() {
        tracing::debug!("No feature blocks found in {} chars of markdown", text.len());
    }

    ParsedAnalysis {
        features,
        api_dependencies: extract_api_dependencies(text),
        raw_text: text.to_string(),
    }
}

struct FeatureBlock {
    name: String,
    body: String,
}

/// Split the document into `### Name` blocks, each ending at the next heading
fn extract_feature_blocks(text: &str) -> Vec<FeatureBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<FeatureBlock> = None;

    for line in text.lines() {
        if !ANY_HEADING_RE.is_match(line) {
            if let Some(block) = current.as_mut() {
                block.body.push_str(line);
                block.body.push('\n');
            }
            continue;
        }

        blocks.extend(current.take());

        let name = FEATURE_HEADING_RE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| clean_value(m.as_str()))
            .unwrap_or_default();

        if !name.is_empty() && !is_dependencies_heading(&name) {
            current = Some(FeatureBlock {
                name,
                body: String::new(),
            });
        }
    }

    blocks.extend(current);
    blocks
}

fn is_dependencies_heading(title: &str) -> bool {
    title.to_lowercase().starts_with("data dependencies")
}

fn parse_feature(block: &FeatureBlock) -> Feature {
    let name = block.name.clone();
    let field = |key| extract_field(&block.body, key);

    let description = field(FieldKey::Description);
    let data_displayed = field(FieldKey::DataDisplayed);
    let data_type = resolve_data_type(&field(FieldKey::DataType), &name, &data_displayed);
    let is_mvp = parse_required(&field(FieldKey::Required));

    Feature {
        description: if data_displayed.is_empty() {
            description
        } else {
            data_displayed
        },
        data_type,
        position: non_empty(field(FieldKey::Position)),
        styling: non_empty(field(FieldKey::Styling)),
        api_source: non_empty(field(FieldKey::ApiSource)),
        is_mvp,
        mock_data: Some(mock_data(data_type, &name)),
        name,
    }
}

/// First non-empty value among the field's label synonyms
fn extract_field(body: &str, key: FieldKey) -> String {
    FIELD_RULES
        .iter()
        .filter(|rule| rule.key == key)
        .flat_map(|rule| rule.patterns.iter())
        .filter_map(|pattern| pattern.captures(body))
        .filter_map(|caps| caps.get(1).map(|m| clean_value(m.as_str())))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

/// Strip bold markers, a leading bullet and surrounding quotes
fn clean_value(raw: &str) -> String {
    let unbolded = raw.replace("**", "");
    let value = LEADING_BULLET_RE.replace(unbolded.trim(), "");
    let value = value.trim();
    let value = value.strip_prefix('"').unwrap_or(value);
    let value = value.strip_suffix('"').unwrap_or(value);
    let value = value.strip_prefix('\'').unwrap_or(value);
    let value = value.strip_suffix('\'').unwrap_or(value);
    value.trim().to_string()
}

/// Explicit type when it names a known type, keyword inference otherwise
fn resolve_data_type(explicit: &str, name: &str, data_displayed: &str) -> DataType {
    let first_word = explicit
        .split(|c: char| !c.is_alphabetic())
        .find(|word| !word.is_empty())
        .unwrap_or_default();

    DataType::normalize(explicit)
        .or_else(|| DataType::normalize(first_word))
        .unwrap_or_else(|| infer_data_type(name, data_displayed))
}

fn infer_data_type(name: &str, data_displayed: &str) -> DataType {
    let name = name.to_lowercase();
    let data = data_displayed.to_lowercase();

    INFERENCE_RULES
        .iter()
        .find(|rule| {
            rule.name_keywords.iter().any(|kw| name.contains(kw))
                || rule.data_keywords.iter().any(|kw| data.contains(kw))
        })
        .map(|rule| rule.data_type)
        .unwrap_or(DataType::Text)
}

fn parse_required(value: &str) -> bool {
    let value = value.to_lowercase();
    !value.starts_with("no")
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Bullet lines naming an API or database in the dependencies section
fn extract_api_dependencies(text: &str) -> Vec<String> {
    let mut in_section = false;
    let mut apis: Vec<String> = Vec::new();

    for line in text.lines() {
        if let Some(caps) = ANY_HEADING_RE.captures(line) {
            let title = clean_value(caps.get(1).map_or("", |m| m.as_str()));
            in_section = is_dependencies_heading(&title);
            continue;
        }
        if !in_section {
            continue;
        }

        if let Some(api) = DEPENDENCY_LINE_RE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
        {
            if !apis.contains(&api) {
                apis.push(api);
            }
        }
    }

    apis
}
