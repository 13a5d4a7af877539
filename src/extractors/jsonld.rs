//! Best-effort reading of `<script type="application/ld+json">` blocks.

use crate::error::HarvestError;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use tracing::debug;

static LD_JSON: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

/// Parse every JSON-LD block in the document. Blocks that fail to parse are
/// skipped.
pub fn blocks(html: &Html) -> Vec<Value> {
    html.select(&LD_JSON)
        .filter_map(|script| {
            let raw = script.text().collect::<String>();
            match serde_json::from_str::<Value>(raw.trim()) {
                Ok(value) => Some(value),
                Err(e) => {
                    let skipped = HarvestError::Extraction(format!("JSON-LD block: {e}"));
                    debug!(error = %skipped, fatal = skipped.is_fatal(), "Skipping block");
                    None
                }
            }
        })
        .collect()
}

/// Visit every JSON object in `value`, depth first, parents before children.
pub fn visit_objects<'a, F>(value: &'a Value, visit: &mut F)
where
    F: FnMut(&'a Map<String, Value>),
{
    match value {
        Value::Object(map) => {
            visit(map);
            for child in map.values() {
                visit_objects(child, visit);
            }
        }
        Value::Array(items) => {
            for item in items {
                visit_objects(item, visit);
            }
        }
        _ => {}
    }
}

/// A string field, or the `url` / `@id` of a nested object, or the first
/// usable element of an array.
pub fn string_field(map: &Map<String, Value>, field: &str) -> Option<String> {
    map.get(field).and_then(as_text)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(obj) => obj
            .get("url")
            .or_else(|| obj.get("contentUrl"))
            .or_else(|| obj.get("@id"))
            .and_then(as_text),
        Value::Array(items) => items.iter().find_map(as_text),
        _ => None,
    }
}

/// Whether `@type` equals, or contains, one of `types`.
pub fn has_type(map: &Map<String, Value>, types: &[&str]) -> bool {
    match map.get("@type") {
        Some(Value::String(t)) => types.contains(&t.as_str()),
        Some(Value::Array(ts)) => ts
            .iter()
            .filter_map(Value::as_str)
            .any(|t| types.contains(&t)),
        _ => false,
    }
}
