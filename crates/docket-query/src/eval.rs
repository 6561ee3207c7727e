use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::expression::Expression;
use crate::compare::{compare_values, values_equal};

/// Resolve a dotted path against a document.
///
/// Numeric path segments index into arrays; any other segment on a
/// non-document value resolves to nothing.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(sub) => sub.get(part)?,
            Bson::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Evaluate whether a document matches the given expression.
pub fn matches(doc: &Document, expr: &Expression) -> bool {
    match expr {
        Expression::And(children) => children.iter().all(|child| matches(doc, child)),
        Expression::Or(children) => children.iter().any(|child| matches(doc, child)),
        Expression::Eq(field, val) => field_eq(lookup(doc, field), val),
        Expression::Ne(field, val) => !field_eq(lookup(doc, field), val),
        Expression::In(field, vals) => {
            let field_value = lookup(doc, field);
            vals.iter().any(|val| field_eq(field_value, val))
        }
        Expression::Gt(field, val)
        | Expression::Gte(field, val)
        | Expression::Lt(field, val)
        | Expression::Lte(field, val) => {
            let predicate: fn(Ordering) -> bool = match expr {
                Expression::Gt(..) => |o| o == Ordering::Greater,
                Expression::Gte(..) => |o| o != Ordering::Less,
                Expression::Lt(..) => |o| o == Ordering::Less,
                _ => |o| o != Ordering::Greater,
            };
            let test = |v: &Bson| compare_values(v, val).is_some_and(predicate);
            match lookup(doc, field) {
                Some(Bson::Array(arr)) => arr.iter().any(test),
                Some(v) => test(v),
                None => false,
            }
        }
        Expression::Regex(field, re) => {
            let test = |v: &Bson| matches!(v, Bson::String(s) if re.is_match(s));
            match lookup(doc, field) {
                Some(Bson::Array(arr)) => arr.iter().any(test),
                Some(v) => test(v),
                None => false,
            }
        }
        // $exists checks physical presence; a null value counts as present
        Expression::Exists(field, expected) => lookup(doc, field).is_some() == *expected,
    }
}

/// Equality match of a stored field against a query value.
///
/// `null` matches missing fields and explicit nulls. An array field matches
/// when the whole array or any single element equals the query value.
fn field_eq(field_value: Option<&Bson>, query_val: &Bson) -> bool {
    match field_value {
        None => matches!(query_val, Bson::Null),
        Some(v) if values_equal(v, query_val) => true,
        Some(Bson::Array(arr)) => arr.iter().any(|elem| values_equal(elem, query_val)),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_filter;
    use bson::doc;

    fn check(doc: &Document, filter: Document) -> bool {
        matches(doc, &parse_filter(&filter).unwrap())
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(check(&doc! { "a": 1 }, doc! {}));
        assert!(check(&doc! {}, doc! {}));
    }

    #[test]
    fn eq_coerces_numbers() {
        let d = doc! { "a": 1.0 };
        assert!(check(&d, doc! { "a": 1 }));
        assert!(!check(&d, doc! { "a": 2 }));
    }

    #[test]
    fn null_matches_missing_field() {
        let d = doc! { "a": 1 };
        assert!(check(&d, doc! { "b": null }));
        assert!(!check(&d, doc! { "a": null }));
    }

    #[test]
    fn dotted_path_into_subdocument() {
        let d = doc! { "address": { "city": "Austin", "zip": 78701 } };
        assert!(check(&d, doc! { "address.city": "Austin" }));
        assert!(check(&d, doc! { "address.zip": { "$gt": 70000 } }));
        assert!(!check(&d, doc! { "address.state": "TX" }));
    }

    #[test]
    fn array_field_matches_any_element() {
        let d = doc! { "tags": ["red", "blue"] };
        assert!(check(&d, doc! { "tags": "blue" }));
        assert!(check(&d, doc! { "tags": ["red", "blue"] }));
        assert!(!check(&d, doc! { "tags": "green" }));
    }

    #[test]
    fn ne_and_in() {
        let d = doc! { "status": "active" };
        assert!(check(&d, doc! { "status": { "$ne": "closed" } }));
        assert!(!check(&d, doc! { "status": { "$ne": "active" } }));
        assert!(check(&d, doc! { "status": { "$in": ["pending", "active"] } }));
        assert!(!check(&d, doc! { "status": { "$in": ["pending"] } }));
    }

    #[test]
    fn range_ignores_other_types() {
        let d = doc! { "n": "10" };
        assert!(!check(&d, doc! { "n": { "$gt": 5 } }));
    }

    #[test]
    fn or_and_exists() {
        let d = doc! { "a": 1, "b": null };
        assert!(check(&d, doc! { "$or": [{ "a": 2 }, { "b": { "$exists": true } }] }));
        assert!(!check(&d, doc! { "c": { "$exists": true } }));
    }

    #[test]
    fn regex_case_insensitive() {
        let d = doc! { "name": "John Smith" };
        assert!(check(&d, doc! { "name": { "$regex": "^john", "$options": "i" } }));
        assert!(!check(&d, doc! { "name": { "$regex": "^john" } }));
    }
}
