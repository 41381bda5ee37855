//! React component scaffolding for parsed features.

use crate::types::{DataType, Feature};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt::Write;

pub const DEFAULT_COMPONENT_NAME: &str = "ProductDisplay";

const PLACEHOLDER_IMAGE_URL: &str = "https://via.placeholder.com/300x200?text=Product+Image";

/// Placeholder value for a feature of the given type
pub fn mock_data(data_type: DataType, name: &str) -> Value {
    let name = name.to_lowercase();
    match data_type {
        DataType::Rating => json!({ "stars": 4.5, "count": 2341 }),
        DataType::Number if name.contains("price") => json!(29.99),
        DataType::Number => json!(1234),
        DataType::Image => json!(PLACEHOLDER_IMAGE_URL),
        DataType::List => json!([
            { "text": "Item 1" },
            { "text": "Item 2" },
            { "text": "Item 3" }
        ]),
        DataType::Action => json!({ "label": "Click Action" }),
        DataType::Badge => json!({ "label": "New", "color": "#4CAF50" }),
        DataType::Text | DataType::Other if name.contains("title") => {
            json!("Sample Product Title")
        }
        DataType::Text | DataType::Other => json!("Sample content"),
    }
}

/// Lowercase snake_case key used for a feature in the component's data object
pub fn data_key(name: &str) -> String {
    let key: String = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    if key.is_empty() || key.starts_with(|c: char| c.is_ascii_digit()) {
        format!("feature_{}", key)
    } else {
        key
    }
}

/// Component source with one data entry and one JSX block per feature
pub fn generate_component_code(features: &[Feature], component_name: &str) -> String {
    let component_name = component_identifier(component_name);

    let keys = unique_data_keys(features);

    let mut data = Map::new();
    for (feature, key) in features.iter().zip(&keys) {
        let value = feature
            .mock_data
            .clone()
            .unwrap_or_else(|| mock_data(feature.data_type, &feature.name));
        data.insert(key.clone(), value);
    }
    // A Map always serializes
    let data = serde_json::to_string_pretty(&Value::Object(data)).unwrap_or_default();

    let mut out = String::new();
    out.push_str("import React from 'react';\n");
    let _ = writeln!(out, "import './{}.css';", component_name);
    out.push('\n');
    let _ = writeln!(out, "export function {}() {{", component_name);
    let _ = writeln!(out, "  const [data] = React.useState({});", indent(&data, 2));
    out.push('\n');
    out.push_str("  return (\n");
    out.push_str("    <div className=\"product-display\">\n");
    for (feature, key) in features.iter().zip(&keys) {
        out.push_str(&indent_all(&feature_jsx(feature, key), 6));
        out.push('\n');
    }
    out.push_str("    </div>\n");
    out.push_str("  );\n");
    out.push_str("}\n");
    out
}

/// One data key per feature; repeated keys get a `_2`, `_3`, ... suffix
fn unique_data_keys(features: &[Feature]) -> Vec<String> {
    let mut taken = HashSet::new();
    features
        .iter()
        .map(|feature| {
            let base = data_key(&feature.name);
            let mut key = base.clone();
            let mut n = 2;
            while !taken.insert(key.clone()) {
                key = format!("{}_{}", base, n);
                n += 1;
            }
            key
        })
        .collect()
}

fn feature_jsx(feature: &Feature, key: &str) -> String {
    let label = escape_jsx_text(&feature.name);

    match feature.data_type {
        DataType::Rating => format!(
            "<div className=\"feature feature-rating\">\n\
             \x20 <h3>{label}</h3>\n\
             \x20 <div className=\"rating\">\n\
             \x20   <span className=\"stars\">{{\"★\".repeat(Math.floor(data.{key}.stars))}}{{\"☆\".repeat(5 - Math.floor(data.{key}.stars))}}</span>\n\
             \x20   <span className=\"rating-value\">{{data.{key}.stars}}</span>\n\
             \x20   <span className=\"rating-count\">({{data.{key}.count}} reviews)</span>\n\
             \x20 </div>\n\
             </div>"
        ),
        DataType::Number => format!(
            "<div className=\"feature feature-number\">\n\
             \x20 <label>{label}:</label>\n\
             \x20 <span className=\"value\">{{data.{key}}}</span>\n\
             </div>"
        ),
        DataType::Image => format!(
            "<div className=\"feature feature-image\">\n\
             \x20 <h3>{label}</h3>\n\
             \x20 <img src={{data.{key}}} alt=\"{alt}\" />\n\
             </div>",
            alt = label.replace('"', "&quot;")
        ),
        DataType::List => format!(
            "<div className=\"feature feature-list\">\n\
             \x20 <h3>{label}</h3>\n\
             \x20 <ul>\n\
             \x20   {{data.{key}.map((item, idx) => (\n\
             \x20     <li key={{idx}}>{{item.text || item}}</li>\n\
             \x20   ))}}\n\
             \x20 </ul>\n\
             </div>"
        ),
        DataType::Action => format!(
            "<div className=\"feature feature-action\">\n\
             \x20 <button onClick={{() => console.log({handler})}}>\n\
             \x20   {{data.{key}.label}}\n\
             \x20 </button>\n\
             </div>",
            handler = json!(format!("{} clicked", feature.name))
        ),
        DataType::Badge => format!(
            "<div className=\"feature feature-badge\">\n\
             \x20 <span style={{{{ backgroundColor: data.{key}.color }}}}>\n\
             \x20   {{data.{key}.label}}\n\
             \x20 </span>\n\
             </div>"
        ),
        DataType::Text | DataType::Other => format!(
            "<div className=\"feature feature-text\">\n\
             \x20 <h3>{label}</h3>\n\
             \x20 <p>{{data.{key}}}</p>\n\
             </div>"
        ),
    }
}

/// Keep an identifier usable as a React component name
fn component_identifier(name: &str) -> String {
    let ident: String = name
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    match ident.chars().next() {
        Some(first) if first.is_ascii_uppercase() => ident,
        Some(first) if first.is_ascii_lowercase() => {
            format!("{}{}", first.to_ascii_uppercase(), &ident[1..])
        }
        _ => DEFAULT_COMPONENT_NAME.to_string(),
    }
}

fn escape_jsx_text(text: &str) -> String {
    text.replace('{', "&#123;")
        .replace('}', "&#125;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Indent every line after the first
fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.to_string()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn indent_all(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stylesheet shared by every generated component
pub fn generate_component_css() -> String {
    COMPONENT_CSS.to_string()
}

const COMPONENT_CSS: &str = r#".product-display {
  max-width: 800px;
  margin: 0 auto;
  padding: 2rem;
  font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Roboto', sans-serif;
}

.feature {
  margin-bottom: 1.5rem;
  padding: 1rem;
  background: #f9f9f9;
  border-left: 4px solid #282c34;
  border-radius: 4px;
}

.feature h3 {
  margin: 0 0 0.5rem 0;
  font-size: 16px;
  color: #282c34;
  text-transform: uppercase;
  letter-spacing: 0.5px;
}

.feature .value {
  font-size: 16px;
  font-weight: 500;
  color: #333;
}

.feature-rating {
  border-left-color: #ffc107;
}

.rating {
  display: flex;
  align-items: center;
  gap: 0.75rem;
}

.stars {
  font-size: 20px;
  color: #ffc107;
  letter-spacing: 2px;
}

.rating-value {
  font-weight: 600;
  color: #282c34;
}

.rating-count {
  font-size: 13px;
  color: #999;
}

.feature-number {
  border-left-color: #2196f3;
}

.feature-image {
  border-left-color: #9c27b0;
}

.feature-image img {
  max-width: 100%;
  max-height: 300px;
  border-radius: 4px;
  margin-top: 0.5rem;
  border: 1px solid #ddd;
}

.feature-list {
  border-left-color: #ff9800;
}

.feature-list ul {
  list-style: none;
  padding: 0;
  margin: 0.5rem 0 0 0;
}

.feature-list li {
  padding: 0.5rem 0.75rem;
  background: #fff;
  border-left: 3px solid #ff9800;
  margin: 0.25rem 0;
  border-radius: 2px;
}

.feature-action {
  border-left-color: #4caf50;
}

.feature-action button {
  background: #282c34;
  color: white;
  border: none;
  padding: 12px 24px;
  border-radius: 4px;
  font-size: 14px;
  font-weight: 600;
  cursor: pointer;
  transition: all 0.2s;
}

.feature-action button:hover {
  background: #3a3f47;
}

.feature-badge {
  border-left-color: #e91e63;
}

.feature-badge span {
  display: inline-block;
  padding: 6px 12px;
  border-radius: 12px;
  color: white;
  font-size: 12px;
  font-weight: 600;
  text-transform: uppercase;
  letter-spacing: 0.5px;
}

.feature-text p {
  margin: 0.5rem 0 0 0;
  color: #666;
  line-height: 1.6;
}
"#;
