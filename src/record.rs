//! Data Records - Dotted-Path Resolution
//!
//! A record is plain `serde_json::Value`. Lookups never fail loudly:
//! anything that does not line up resolves to `None`.

use serde_json::Value;

/// One step of a binding path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Purely numeric segment, addresses a sequence element
    Index(&'a str),
    /// Anything else, addresses a mapping entry
    Key(&'a str),
}

/// Split a binding path such as `item.options.0.name` into segments.
pub fn segments(path: &str) -> impl Iterator<Item = Segment<'_>> {
    path.split('.').map(|segment| {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            Segment::Index(segment)
        } else {
            Segment::Key(segment)
        }
    })
}

/// Resolve `path` inside `record`.
///
/// Returns `None` when a key is missing, an index is out of range, the
/// container kind does not match the segment kind, or the final value is
/// `null`.
pub fn resolve<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for segment in segments(path) {
        current = match segment {
            Segment::Index(digits) => {
                // Indices too large for usize can never be in range.
                let index: usize = digits.parse().ok()?;
                current.as_array()?.get(index)?
            }
            Segment::Key(key) => current.as_object()?.get(key)?,
        };
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// Resolve `path` against each scope in turn, returning the first hit.
pub fn resolve_first<'a>(scopes: &[&'a Value], path: &str) -> Option<&'a Value> {
    scopes.iter().find_map(|scope| resolve(scope, path))
}

/// Truthiness used to decide whether a resolved value is worth substituting.
///
/// `null`, `false`, zero, the empty string and empty containers are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Resolve and keep only truthy values.
pub fn resolve_truthy<'a>(scopes: &[&'a Value], path: &str) -> Option<&'a Value> {
    resolve_first(scopes, path).filter(|value| is_truthy(value))
}

/// String form used for substitution: strings verbatim, everything else as
/// compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order() -> Value {
        json!({
            "orderId": "49379385",
            "item": {
                "orderItemId": 91566945,
                "imageUrl": null,
                "adjustment": false,
                "options": [
                    {"name": "lat", "value": "34.052235"},
                    {"name": "chain-type", "value": "rolo"}
                ]
            }
        })
    }

    #[test]
    fn test_resolves_nested_keys_and_indices() {
        let record = order();
        assert_eq!(resolve(&record, "orderId"), Some(&json!("49379385")));
        assert_eq!(resolve(&record, "item.orderItemId"), Some(&json!(91566945)));
        assert_eq!(resolve(&record, "item.options.1.value"), Some(&json!("rolo")));
        assert_eq!(
            resolve(&record, "item.options.0"),
            Some(&json!({"name": "lat", "value": "34.052235"}))
        );
    }

    #[test]
    fn test_misses_are_absent() {
        let record = order();
        assert_eq!(resolve(&record, "item.missing"), None);
        assert_eq!(resolve(&record, "item.options.7.name"), None);
        assert_eq!(resolve(&record, "item.imageUrl"), None);
        assert_eq!(resolve(&record, "item.imageUrl.deeper"), None);
    }

    #[test]
    fn test_kind_mismatch_is_absent() {
        let record = order();
        // index segment against a mapping
        assert_eq!(resolve(&record, "item.0"), None);
        // key segment against a sequence
        assert_eq!(resolve(&record, "item.options.name"), None);
        // traversing into a scalar
        assert_eq!(resolve(&record, "orderId.length"), None);
    }

    #[test]
    fn test_malformed_paths_degrade() {
        let record = order();
        assert_eq!(resolve(&record, ""), None);
        assert_eq!(resolve(&record, "item..options"), None);
        assert_eq!(resolve(&record, "item.options.99999999999999999999999"), None);
        assert_eq!(resolve(&json!([1, 2]), "-1"), None);
    }

    #[test]
    fn test_segments_classify_digits() {
        let parsed: Vec<_> = segments("a.0.b1.12").collect();
        assert_eq!(
            parsed,
            vec![
                Segment::Key("a"),
                Segment::Index("0"),
                Segment::Key("b1"),
                Segment::Index("12"),
            ]
        );
    }

    #[test]
    fn test_resolve_first_falls_through_scopes() {
        let variables = json!({"item": {"sku": "ABC-3"}});
        let payload = json!({"variables": variables.clone(), "orderKey": "1c2f"});
        let scopes = [&variables, &payload];
        assert_eq!(resolve_first(&scopes, "item.sku"), Some(&json!("ABC-3")));
        assert_eq!(resolve_first(&scopes, "orderKey"), Some(&json!("1c2f")));
        assert_eq!(resolve_first(&scopes, "variables.item.sku"), Some(&json!("ABC-3")));
        assert_eq!(resolve_first(&scopes, "nope"), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!([0])));

        let record = order();
        assert_eq!(resolve_truthy(&[&record], "item.adjustment"), None);
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("rolo")), "rolo");
        assert_eq!(display_value(&json!(91566945)), "91566945");
        assert_eq!(display_value(&json!(34.5)), "34.5");
        assert_eq!(display_value(&json!(true)), "true");
        assert_eq!(display_value(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
