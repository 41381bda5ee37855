//! Grouping of parsed features into page sections.
//!
//! Section rules run in a fixed order. Each rule claims the unclaimed
//! features it matches, up to its cap, so every input feature lands in
//! exactly one section. Whatever no rule claims goes to a trailing
//! "Additional Information" section.

use crate::types::{DataType, Feature, LayoutSection, Orientation, SectionKind};

struct SectionRule {
    kind: SectionKind,
    title: Option<&'static str>,
    layout: Option<Orientation>,
    name_keywords: &'static [&'static str],
    data_type: Option<DataType>,
    cap: Option<usize>,
}

impl SectionRule {
    fn matches(&self, feature: &Feature) -> bool {
        let name = feature.name.to_lowercase();
        self.data_type == Some(feature.data_type)
            || self.name_keywords.iter().any(|kw| name.contains(kw))
    }
}

const SECTION_RULES: &[SectionRule] = &[
    SectionRule {
        kind: SectionKind::Hero,
        title: None,
        layout: None,
        name_keywords: &["title", "price", "rating", "star"],
        data_type: None,
        cap: Some(3),
    },
    SectionRule {
        kind: SectionKind::Highlighted,
        title: None,
        layout: Some(Orientation::Horizontal),
        name_keywords: &["review", "available", "stock"],
        data_type: None,
        cap: Some(3),
    },
    SectionRule {
        kind: SectionKind::Detailed,
        title: Some("About This Product"),
        layout: None,
        name_keywords: &["description", "about", "specification"],
        data_type: Some(DataType::Text),
        cap: Some(2),
    },
    SectionRule {
        kind: SectionKind::List,
        title: Some("Key Features"),
        layout: None,
        name_keywords: &["feature", "benefit", "key"],
        data_type: Some(DataType::List),
        cap: None,
    },
    SectionRule {
        kind: SectionKind::Grid,
        title: Some("Options"),
        layout: Some(Orientation::Horizontal),
        name_keywords: &["color", "size", "option", "variant", "available"],
        data_type: None,
        cap: None,
    },
    SectionRule {
        kind: SectionKind::Actions,
        title: None,
        layout: Some(Orientation::Horizontal),
        name_keywords: &["button", "add", "buy", "cart", "wishlist"],
        data_type: Some(DataType::Action),
        cap: None,
    },
];

const REMAINDER_TITLE: &str = "Additional Information";

/// Partition features into ordered sections; empty sections are omitted
pub fn generate_layout(features: &[Feature]) -> Vec<LayoutSection> {
    let mut claimed = vec![false; features.len()];
    let mut sections = Vec::new();

    for rule in SECTION_RULES {
        let picked: Vec<usize> = features
            .iter()
            .enumerate()
            .filter(|(i, feature)| !claimed[*i] && rule.matches(feature))
            .map(|(i, _)| i)
            .take(rule.cap.unwrap_or(usize::MAX))
            .collect();

        if picked.is_empty() {
            continue;
        }
        for &i in &picked {
            claimed[i] = true;
        }

        sections.push(LayoutSection {
            kind: rule.kind,
            title: rule.title.map(str::to_string),
            features: picked.iter().map(|&i| features[i].clone()).collect(),
            layout: rule.layout,
        });
    }

    let remainder: Vec<Feature> = features
        .iter()
        .zip(&claimed)
        .filter(|(_, claimed)| !**claimed)
        .map(|(feature, _)| feature.clone())
        .collect();

    if !remainder.is_empty() {
        sections.push(LayoutSection {
            kind: SectionKind::Detailed,
            title: Some(REMAINDER_TITLE.to_string()),
            features: remainder,
            layout: None,
        });
    }

    sections
}
