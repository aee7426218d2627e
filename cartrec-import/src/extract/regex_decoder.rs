//! Regex extraction strategy (last resort in the chain)
//!
//! Scans the raw text for the fixed token patterns the upstream platform
//! emits, without attempting to parse the surrounding structure. Used when
//! the blob is corrupt enough that neither structured decoder accepts it
//! but the payload is still recognizably there.
//!
//! The three parallel line-item arrays (product id / variation id /
//! quantity) are zipped positionally; a missing quantity defaults to 1.
//! Output is annotated `extracted_via: regex` so downstream consumers know
//! it is best-effort.

use super::{CartLine, ExtractedFields, ExtractionMethod};
use once_cell::sync::Lazy;
use regex::Regex;

static PRODUCT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""product_id";i:(\d+)"#).expect("static pattern"));
static VARIATION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""variation_id";i:(\d+)"#).expect("static pattern"));
static QUANTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""quantity";i:(\d+)"#).expect("static pattern"));

/// Quoted scalar fields: `"billing_phone";s:11:"11987654321"`
static NAMED_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""((?:billing_)?(?:phone|email|first_name|last_name))";s:\d+:"([^"]*)""#)
        .expect("static pattern")
});

/// Best-effort partial extraction. None when no known marker is present.
pub fn decode(blob: &str) -> Option<ExtractedFields> {
    let product_ids: Vec<i64> = captured_ints(&PRODUCT_ID, blob);
    let variation_ids: Vec<i64> = captured_ints(&VARIATION_ID, blob);
    let quantities: Vec<i64> = captured_ints(&QUANTITY, blob);

    let mut out = ExtractedFields {
        extracted_via: Some(ExtractionMethod::Regex),
        ..Default::default()
    };

    for (idx, product_id) in product_ids.iter().enumerate() {
        out.items.push(CartLine {
            product_id: *product_id,
            variation_id: variation_ids.get(idx).copied().filter(|id| *id != 0),
            quantity: quantities.get(idx).copied().unwrap_or(1),
        });
    }
    out.total_items = out.items.iter().map(|line| line.quantity).sum();

    for captures in NAMED_FIELD.captures_iter(blob) {
        let (key, value) = (&captures[1], &captures[2]);
        if !value.is_empty() {
            out.fields.insert(key.to_string(), value.to_string());
        }
    }

    if out.items.is_empty() && out.fields.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn captured_ints(pattern: &Regex, blob: &str) -> Vec<i64> {
    pattern
        .captures_iter(blob)
        .filter_map(|c| c[1].parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zips_parallel_arrays_positionally() {
        let blob = r#"garbage "product_id";i:5; junk "quantity";i:2; more
                      "product_id";i:6; end"#;
        let out = decode(blob).unwrap();
        assert_eq!(
            out.items,
            vec![
                CartLine { product_id: 5, variation_id: None, quantity: 2 },
                CartLine { product_id: 6, variation_id: None, quantity: 1 },
            ]
        );
        assert_eq!(out.total_items, 3);
        assert_eq!(out.extracted_via, Some(ExtractionMethod::Regex));
    }

    #[test]
    fn extracts_billing_markers() {
        let blob = r#"broken a:99 "billing_phone";s:11:"11999998888" "billing_first_name";s:3:"Rui""#;
        let out = decode(blob).unwrap();
        assert_eq!(out.get("billing_phone"), Some("11999998888"));
        assert_eq!(out.get("billing_first_name"), Some("Rui"));
    }

    #[test]
    fn no_markers_means_no_result() {
        assert!(decode("completely unrelated text").is_none());
    }

    #[test]
    fn zero_variation_id_is_none() {
        let blob = r#""product_id";i:9;"variation_id";i:0;"quantity";i:4;"#;
        let out = decode(blob).unwrap();
        assert_eq!(out.items[0].variation_id, None);
        assert_eq!(out.items[0].quantity, 4);
    }
}
