use std::cmp::Ordering;

use bson::{Bson, Document};

/// Deep structural equality over BSON values.
///
/// Numbers compare by value across Int32, Int64 and Double. Documents are
/// unordered: same key set, pairwise equal values. Arrays are ordered.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => x == y,
        (Bson::Int64(x), Bson::Int64(y)) => x == y,
        (Bson::Int32(x), Bson::Int64(y)) | (Bson::Int64(y), Bson::Int32(x)) => i64::from(*x) == *y,
        (Bson::Document(x), Bson::Document(y)) => documents_equal(x, y),
        (Bson::Array(x), Bson::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis() == y.timestamp_millis(),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

/// Unordered document equality built on [`values_equal`].
pub fn documents_equal(a: &Document, b: &Document) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| values_equal(value, other)))
}

/// Ordering between two values of a comparable class.
///
/// Returns `None` when the values are not comparable (different type classes,
/// NaN, documents, arrays). Range operators treat `None` as "no match".
pub fn compare_values(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => Some(x.cmp(y)),
        (Bson::Int64(x), Bson::Int64(y)) => Some(x.cmp(y)),
        (Bson::Int32(x), Bson::Int64(y)) => Some(i64::from(*x).cmp(y)),
        (Bson::Int64(x), Bson::Int32(y)) => Some(x.cmp(&i64::from(*y))),
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            Some(x.timestamp_millis().cmp(&y.timestamp_millis()))
        }
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

pub(crate) fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn numbers_compare_across_types() {
        assert!(values_equal(&Bson::Int32(1), &Bson::Double(1.0)));
        assert!(values_equal(&Bson::Int64(7), &Bson::Int32(7)));
        assert!(!values_equal(&Bson::Int32(1), &Bson::Double(1.5)));
        assert!(!values_equal(&Bson::Int32(1), &Bson::String("1".into())));
    }

    #[test]
    fn documents_ignore_field_order() {
        let a = doc! { "a": 1, "b": { "c": "x" } };
        let b = doc! { "b": { "c": "x" }, "a": 1.0 };
        assert!(documents_equal(&a, &b));
    }

    #[test]
    fn documents_with_extra_field_differ() {
        let a = doc! { "a": 1 };
        let b = doc! { "a": 1, "b": 2 };
        assert!(!documents_equal(&a, &b));
        assert!(!documents_equal(&b, &a));
    }

    #[test]
    fn arrays_are_ordered() {
        let a = Bson::Array(vec![Bson::Int32(1), Bson::Int32(2)]);
        let b = Bson::Array(vec![Bson::Int32(2), Bson::Int32(1)]);
        assert!(!values_equal(&a, &b));
        assert!(values_equal(&a, &a.clone()));
    }

    #[test]
    fn null_and_undefined_are_distinct() {
        assert!(values_equal(&Bson::Null, &Bson::Null));
        assert!(!values_equal(&Bson::Null, &Bson::Undefined));
    }

    #[test]
    fn compare_mixed_numbers() {
        assert_eq!(
            compare_values(&Bson::Int32(2), &Bson::Double(1.5)),
            Some(Ordering::Greater)
        );
        assert_eq!(compare_values(&Bson::Int32(2), &Bson::String("2".into())), None);
    }
}
