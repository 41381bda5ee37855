//! Signal extraction from raw OCR text.
//!
//! Each field has its own rule; rules are independent and the first match
//! in the text wins. Unmatched fields are empty strings.

use crate::config::Policy;
use crate::types::Signals;
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalField {
    Price,
    Rating,
    ReviewCount,
}

/// Pattern rule: the capture group `group` of the first match, passed
/// through `transform`, becomes the field value.
struct PatternRule {
    field: SignalField,
    pattern: Regex,
    group: usize,
    transform: fn(&str) -> String,
}

static PATTERN_RULES: LazyLock<Vec<PatternRule>> = LazyLock::new(|| {
    vec![
        PatternRule {
            field: SignalField::Price,
            pattern: Regex::new(r"(?i)(?:[$€£¥₹]|\bUSD)[ \t]?\d{1,4}(?:\.\d{2})?").unwrap(),
            group: 0,
            transform: |s| s.trim().to_string(),
        },
        PatternRule {
            field: SignalField::Rating,
            pattern: Regex::new(r"(?i)(\d+(?:\.\d+)?)[ \t]*(?:out of 5|stars?\b)").unwrap(),
            group: 1,
            transform: |s| s.to_string(),
        },
        PatternRule {
            field: SignalField::ReviewCount,
            pattern: Regex::new(r"(?i)(\d{1,3}(?:,\d{3})+|\d+)[ \t]*(?:reviews?|ratings?)\b")
                .unwrap(),
            group: 1,
            transform: |s| s.replace(',', ""),
        },
    ]
});

/// Derive title, price, rating and review count from recognized text
pub fn extract_signals(text: &str, policy: &Policy) -> Signals {
    let mut signals = Signals {
        title: extract_title(text, policy.min_title_length),
        ..Signals::default()
    };

    for rule in PATTERN_RULES.iter() {
        let value = rule
            .pattern
            .captures(text)
            .and_then(|caps| caps.get(rule.group))
            .map(|m| (rule.transform)(m.as_str()))
            .unwrap_or_default();

        match rule.field {
            SignalField::Price => signals.price = value,
            SignalField::Rating => signals.rating = value,
            SignalField::ReviewCount => signals.review_count = value,
        }
    }

    signals
}

/// First trimmed line with a letter in it and at least `min_len` characters
fn extract_title(text: &str, min_len: usize) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| line.chars().any(char::is_alphabetic) && line.chars().count() >= min_len)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "Deals\n\
        Logitech M185 Wireless Mouse\n\
        4.5 out of 5 stars   12,483 ratings\n\
        $14.99\n\
        Add to Cart";

    #[test]
    fn test_full_page() {
        let signals = extract_signals(PAGE, &Policy::default());
        assert_eq!(signals.title, "Logitech M185 Wireless Mouse");
        assert_eq!(signals.price, "$14.99");
        assert_eq!(signals.rating, "4.5");
        assert_eq!(signals.review_count, "12483");
    }

    #[test]
    fn test_title_requires_letters_and_length() {
        let signals = extract_signals("12345678\nShort\n  Ceramic Mug  ", &Policy::default());
        assert_eq!(signals.title, "Ceramic Mug");
    }

    #[test]
    fn test_title_length_is_policy() {
        let policy = Policy {
            min_title_length: 4,
            ..Policy::default()
        };
        assert_eq!(extract_signals("Mug\nLamp", &policy).title, "Lamp");
    }

    #[test]
    fn test_price_variants() {
        let policy = Policy::default();
        assert_eq!(extract_signals("now USD 249.00 only", &policy).price, "USD 249.00");
        assert_eq!(extract_signals("€35", &policy).price, "€35");
        assert_eq!(extract_signals("cost 35 dollars", &policy).price, "");
    }

    #[test]
    fn test_rating_star_forms() {
        let policy = Policy::default();
        assert_eq!(extract_signals("rated 4 stars", &policy).rating, "4");
        assert_eq!(extract_signals("3.8 star average", &policy).rating, "3.8");
        assert_eq!(extract_signals("five stars", &policy).rating, "");
    }

    #[test]
    fn test_review_count_forms() {
        let policy = Policy::default();
        assert_eq!(extract_signals("(1,204 reviews)", &policy).review_count, "1204");
        assert_eq!(extract_signals("87 review", &policy).review_count, "87");
        assert_eq!(extract_signals("no feedback yet", &policy).review_count, "");
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(extract_signals("", &Policy::default()), Signals::default());
    }
}
