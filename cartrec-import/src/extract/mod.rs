//! Field extraction chain
//!
//! Turns an opaque storefront blob (serialized cart contents, checkout
//! "other fields") into structured data. Three decoder strategies run in
//! order, each a fallback for the previous; every strategy returns a value,
//! never an error, and an unparseable blob yields an empty result:
//!
//! 1. JSON decoding of the whole blob
//! 2. Legacy PHP-serialized map decoding
//! 3. Regex scan for known field markers in the raw text
//!
//! The chain itself never fails; callers can always read `items` and
//! `fields` from the output.

pub mod json_decoder;
pub mod php_decoder;
pub mod regex_decoder;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One cart line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    /// None when the product has no variation (source encodes this as 0)
    pub variation_id: Option<i64>,
    pub quantity: i64,
}

/// Which strategy produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Json,
    PhpSerialized,
    Regex,
}

/// Structured output of the extraction chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    /// Scalar fields found in the blob, e.g. `billing_phone`
    pub fields: BTreeMap<String, String>,
    pub items: Vec<CartLine>,
    /// Sum of line-item quantities; 0 for an empty or unparseable blob
    pub total_items: i64,
    /// None when no strategy succeeded
    pub extracted_via: Option<ExtractionMethod>,
}

impl ExtractedFields {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// First non-empty value among several candidate field names
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }
}

/// Run the decoder chain over a blob. First strategy to succeed wins.
pub fn extract(blob: Option<&str>) -> ExtractedFields {
    let Some(blob) = blob.map(str::trim).filter(|b| !b.is_empty()) else {
        return ExtractedFields::default();
    };

    if let Some(value) = json_decoder::decode(blob) {
        return harvest(&value, ExtractionMethod::Json);
    }
    if let Some(value) = php_decoder::decode(blob) {
        return harvest(&value, ExtractionMethod::PhpSerialized);
    }
    if let Some(out) = regex_decoder::decode(blob) {
        return out;
    }

    ExtractedFields::default()
}

/// Walk a decoded value, collecting scalar fields and cart line items.
///
/// Line items are any nested mapping carrying a `product_id`; a missing
/// quantity defaults to 1, a zero variation id to None.
fn harvest(value: &Value, method: ExtractionMethod) -> ExtractedFields {
    let mut out = ExtractedFields {
        extracted_via: Some(method),
        ..Default::default()
    };

    match value {
        Value::Object(map) => {
            for (key, entry) in map {
                match entry {
                    Value::Object(_) | Value::Array(_) => collect_items(entry, &mut out.items),
                    other => {
                        if let Some(text) = scalar_text(other) {
                            out.fields.insert(key.clone(), text);
                        }
                    }
                }
            }
        }
        Value::Array(_) => collect_items(value, &mut out.items),
        _ => {}
    }

    out.total_items = out.items.iter().map(|line| line.quantity).sum();
    out
}

fn collect_items(value: &Value, items: &mut Vec<CartLine>) {
    match value {
        Value::Object(map) => {
            if let Some(product_id) = map.get("product_id").and_then(coerce_i64) {
                let variation_id = map
                    .get("variation_id")
                    .and_then(coerce_i64)
                    .filter(|id| *id != 0);
                let quantity = map.get("quantity").and_then(coerce_i64).unwrap_or(1);
                items.push(CartLine {
                    product_id,
                    variation_id,
                    quantity,
                });
            } else {
                for entry in map.values() {
                    collect_items(entry, items);
                }
            }
        }
        Value::Array(entries) => {
            for entry in entries {
                collect_items(entry, items);
            }
        }
        _ => {}
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric coercion tolerant of stringly-typed source values
fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Coerce a possibly malformed source value to a monetary amount.
///
/// Malformed input becomes 0.0 rather than failing the record.
pub fn coerce_money(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().replace(',', ".").parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}
