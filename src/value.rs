//! Attribute value types
//!
//! Records and entities exchange attribute data as JSON values, so one value
//! type covers scalars, nested documents, and projection rows alike. This
//! module also pins down the crate's single equality policy for change
//! tracking, so comparisons are never left to ad-hoc call-site logic.

use serde_json::Value;
use std::collections::BTreeMap;

/// The value type of a single record or entity attribute.
pub type AttrValue = Value;

/// An ordered attribute map, keyed by attribute name.
///
/// A `BTreeMap` keeps iteration order stable, which keeps log lines and test
/// assertions deterministic.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// Compare two attribute values under the crate's loose-numeric policy.
///
/// Numbers compare by numeric value, so an integer `1` equals a float `1.0`.
/// A value re-read from storage frequently changes its numeric representation
/// without changing its meaning, and change tracking must not report that as
/// a modification. Every other JSON type compares strictly.
///
/// This is the one equality policy used by
/// [`EntitiesRepository::was_attribute_value_changed`](crate::repository::EntitiesRepository::was_attribute_value_changed).
pub fn loosely_equal(left: &AttrValue, right: &AttrValue) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return a == b;
            }
            match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (a, b) => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(loosely_equal(&json!(1), &json!(1.0)));
        assert!(loosely_equal(&json!(42), &json!(42)));
        assert!(!loosely_equal(&json!(1), &json!(2)));
    }

    #[test]
    fn test_other_types_compare_strictly() {
        // No string/number juggling: "1" is not 1.
        assert!(!loosely_equal(&json!("1"), &json!(1)));
        assert!(!loosely_equal(&json!(true), &json!(1)));
        assert!(loosely_equal(&json!("a"), &json!("a")));
        assert!(loosely_equal(&json!(null), &json!(null)));
    }

    #[test]
    fn test_large_integers_do_not_lose_precision() {
        let big = i64::MAX;
        assert!(loosely_equal(&json!(big), &json!(big)));
        assert!(!loosely_equal(&json!(big), &json!(big - 1)));
    }
}
