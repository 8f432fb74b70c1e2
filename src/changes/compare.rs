//! Attribute comparators

use crate::inventory::{FieldAttrs, IndexAttrs};
use std::collections::BTreeSet;

/// Two fields are equivalent when type and length match exactly.
///
/// `db_type` is compared case-sensitively. An absent length is its own
/// value: it equals neither 0 nor any present length. Every other
/// attribute (nullability, defaults, comments) is ignored.
pub fn fields_equal(a: &FieldAttrs, b: &FieldAttrs) -> bool {
    a.db_type == b.db_type && a.length == b.length
}

/// Two indexes are equivalent when they cover the same set of fields
pub fn indexes_equal(a: &IndexAttrs, b: &IndexAttrs) -> bool {
    let a_fields: BTreeSet<&str> = a.fields.iter().map(String::as_str).collect();
    let b_fields: BTreeSet<&str> = b.fields.iter().map(String::as_str).collect();
    a_fields == b_fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_equal_ignores_extra_attributes() {
        let mut a = FieldAttrs::new("VARCHAR2", Some(50));
        let mut b = FieldAttrs::new("VARCHAR2", Some(50));
        a.extra.insert("nullable".to_string(), json!(true));
        b.extra.insert("nullable".to_string(), json!(false));

        assert!(fields_equal(&a, &b));
    }

    #[test]
    fn test_fields_differ_on_length() {
        let a = FieldAttrs::new("VARCHAR", Some(10));
        let b = FieldAttrs::new("VARCHAR", Some(20));
        assert!(!fields_equal(&a, &b));
    }

    #[test]
    fn test_field_type_is_case_sensitive() {
        let a = FieldAttrs::new("varchar", Some(10));
        let b = FieldAttrs::new("VARCHAR", Some(10));
        assert!(!fields_equal(&a, &b));
    }

    #[test]
    fn test_absent_length_is_distinct() {
        let none = FieldAttrs::new("NUMBER", None);
        assert!(!fields_equal(&none, &FieldAttrs::new("NUMBER", Some(0))));
        assert!(!fields_equal(&none, &FieldAttrs::new("NUMBER", Some(38))));
        assert!(fields_equal(&none, &FieldAttrs::new("NUMBER", None)));
    }

    #[test]
    fn test_index_field_order_is_not_significant() {
        let a = IndexAttrs::new(["A", "B"]);
        let b = IndexAttrs::new(["B", "A"]);
        assert!(indexes_equal(&a, &b));
    }

    #[test]
    fn test_index_field_sets_differ() {
        let mut a = IndexAttrs::new(["A"]);
        let b = IndexAttrs::new(["A", "B"]);
        a.extra.insert("unique".to_string(), json!(true));
        assert!(!indexes_equal(&a, &b));
    }
}
