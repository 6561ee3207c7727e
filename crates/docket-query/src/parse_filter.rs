use bson::{Bson, Document};
use regex::Regex;

use crate::expression::Expression;

/// Parse error for filter documents.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParseError(pub String);

impl std::fmt::Display for FilterParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "filter parse error: {}", self.0)
    }
}

impl std::error::Error for FilterParseError {}

/// Parse a BSON filter document into an Expression tree.
///
/// Follows MongoDB query semantics:
/// - Top-level document is an implicit AND of all entries
/// - An empty document matches everything
/// - `{ "field": value }` is implicit `$eq`
/// - `{ "field": { "$gt": v } }` uses operator sub-documents
/// - `{ "$or": [...] }` / `{ "$and": [...] }` for explicit logical ops
/// - `{ "field": { "$regex": "pattern", "$options": "i" } }` for regex
/// - `{ "field": { "$exists": true } }` for field existence checks
pub fn parse_filter(doc: &Document) -> Result<Expression, FilterParseError> {
    let mut children = Vec::new();

    for (key, value) in doc {
        match key.as_str() {
            "$and" => children.push(parse_logical_array(value, Expression::And)?),
            "$or" => children.push(parse_logical_array(value, Expression::Or)?),
            k if k.starts_with('$') => {
                return Err(FilterParseError(format!("unknown top-level operator: {k}")));
            }
            _ => children.push(parse_field_condition(key, value)?),
        }
    }

    match children.len() {
        1 => Ok(children.remove(0)),
        _ => Ok(Expression::And(children)),
    }
}

/// Parse a `$and` or `$or` array value into a logical expression.
fn parse_logical_array(
    value: &Bson,
    make: fn(Vec<Expression>) -> Expression,
) -> Result<Expression, FilterParseError> {
    let Bson::Array(arr) = value else {
        return Err(FilterParseError("$and/$or value must be an array".into()));
    };

    let mut children = Vec::with_capacity(arr.len());
    for elem in arr {
        match elem {
            Bson::Document(sub_doc) => children.push(parse_filter(sub_doc)?),
            _ => {
                return Err(FilterParseError(
                    "$and/$or array elements must be documents".into(),
                ));
            }
        }
    }

    if children.is_empty() {
        return Err(FilterParseError("$and/$or array must not be empty".into()));
    }

    Ok(make(children))
}

/// Parse a field condition: either implicit $eq or an operator sub-document.
fn parse_field_condition(field: &str, value: &Bson) -> Result<Expression, FilterParseError> {
    // If value is a document whose first key starts with $, it's an operator doc
    if let Bson::Document(sub_doc) = value {
        if sub_doc.keys().next().is_some_and(|k| k.starts_with('$')) {
            return parse_operator_doc(field, sub_doc);
        }
    }

    Ok(Expression::Eq(field.to_string(), value.clone()))
}

/// Parse an operator sub-document like `{ "$gt": 21, "$lte": 100 }`.
fn parse_operator_doc(field: &str, doc: &Document) -> Result<Expression, FilterParseError> {
    // $regex consumes its $options sibling
    if doc.contains_key("$regex") {
        return parse_regex(field, doc);
    }

    let mut conditions = Vec::new();
    for (op_key, op_value) in doc {
        let field = field.to_string();
        let expr = match op_key.as_str() {
            "$eq" => Expression::Eq(field, op_value.clone()),
            "$ne" => Expression::Ne(field, op_value.clone()),
            "$gt" => Expression::Gt(field, op_value.clone()),
            "$gte" => Expression::Gte(field, op_value.clone()),
            "$lt" => Expression::Lt(field, op_value.clone()),
            "$lte" => Expression::Lte(field, op_value.clone()),
            "$in" => match op_value {
                Bson::Array(values) => Expression::In(field, values.clone()),
                _ => return Err(FilterParseError("$in needs an array".into())),
            },
            "$exists" => match op_value {
                Bson::Boolean(b) => Expression::Exists(field, *b),
                _ => return Err(FilterParseError("$exists value must be a boolean".into())),
            },
            "$options" => {
                return Err(FilterParseError("$options without $regex".into()));
            }
            k => return Err(FilterParseError(format!("unknown operator: {k}"))),
        };
        conditions.push(expr);
    }

    match conditions.len() {
        0 => Err(FilterParseError("empty operator document".into())),
        1 => Ok(conditions.remove(0)),
        _ => Ok(Expression::And(conditions)),
    }
}

/// Parse a `$regex` + optional `$options` sub-document.
fn parse_regex(field: &str, doc: &Document) -> Result<Expression, FilterParseError> {
    let mut pattern: Option<&str> = None;
    let mut options: Option<&str> = None;

    for (key, value) in doc {
        match (key.as_str(), value) {
            ("$regex", Bson::String(s)) => pattern = Some(s.as_str()),
            ("$regex", _) => {
                return Err(FilterParseError("$regex value must be a string".into()));
            }
            ("$options", Bson::String(s)) => options = Some(s.as_str()),
            ("$options", _) => {
                return Err(FilterParseError("$options value must be a string".into()));
            }
            (k, _) => {
                return Err(FilterParseError(format!(
                    "unexpected key alongside $regex: {k}"
                )));
            }
        }
    }

    let pat = pattern.ok_or_else(|| FilterParseError("missing $regex pattern".into()))?;

    let full_pattern = match options {
        Some(opts) => {
            let mut prefix = String::with_capacity(4 + opts.len() + pat.len());
            prefix.push_str("(?");
            for ch in opts.chars() {
                match ch {
                    'i' | 's' | 'm' | 'x' => prefix.push(ch),
                    c => return Err(FilterParseError(format!("unknown regex option: {c}"))),
                }
            }
            prefix.push(')');
            prefix.push_str(pat);
            prefix
        }
        None => pat.to_string(),
    };

    let re = Regex::new(&full_pattern)
        .map_err(|e| FilterParseError(format!("invalid regex pattern: {e}")))?;

    Ok(Expression::Regex(field.to_string(), re))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn empty_doc_matches_all() {
        let expr = parse_filter(&doc! {}).unwrap();
        assert!(matches!(expr, Expression::And(children) if children.is_empty()));
    }

    #[test]
    fn bare_field_implicit_eq() {
        let expr = parse_filter(&doc! { "status": "active" }).unwrap();
        match expr {
            Expression::Eq(f, v) => {
                assert_eq!(f, "status");
                assert_eq!(v, Bson::String("active".into()));
            }
            other => panic!("expected Eq, got {other:?}"),
        }
    }

    #[test]
    fn multiple_bare_fields_become_and() {
        let expr = parse_filter(&doc! { "status": "active", "age": 30 }).unwrap();
        match expr {
            Expression::And(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(&children[0], Expression::Eq(f, _) if f == "status"));
                assert!(matches!(&children[1], Expression::Eq(f, _) if f == "age"));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn multiple_operators_same_field() {
        let expr = parse_filter(&doc! { "score": { "$gt": 50, "$lte": 100 } }).unwrap();
        match expr {
            Expression::And(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(&children[0], Expression::Gt(..)));
                assert!(matches!(&children[1], Expression::Lte(..)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn nested_or_containing_and() {
        let filter = doc! {
            "$or": [
                { "status": "active" },
                { "$and": [{ "score": { "$gt": 90 } }, { "verified": true }] }
            ]
        };
        match parse_filter(&filter).unwrap() {
            Expression::Or(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(&children[0], Expression::Eq(..)));
                assert!(matches!(&children[1], Expression::And(..)));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn regex_with_options() {
        let expr = parse_filter(&doc! { "name": { "$regex": "^john", "$options": "i" } }).unwrap();
        match expr {
            Expression::Regex(f, re) => {
                assert_eq!(f, "name");
                assert_eq!(re.as_str(), "(?i)^john");
            }
            other => panic!("expected Regex, got {other:?}"),
        }
    }

    #[test]
    fn in_requires_array() {
        let err = parse_filter(&doc! { "a": { "$in": 1 } }).unwrap_err();
        assert!(err.0.contains("$in"), "{}", err.0);
    }

    #[test]
    fn unknown_top_level_operator_errors() {
        let err = parse_filter(&doc! { "$nor": [{ "a": 1 }] }).unwrap_err();
        assert!(err.0.contains("unknown top-level operator"), "{}", err.0);
    }

    #[test]
    fn unknown_field_operator_errors() {
        let err = parse_filter(&doc! { "age": { "$between": 10 } }).unwrap_err();
        assert!(err.0.contains("unknown operator"), "{}", err.0);
    }

    #[test]
    fn embedded_doc_as_eq_value() {
        let expr = parse_filter(&doc! { "address": { "city": "Austin" } }).unwrap();
        assert!(matches!(expr, Expression::Eq(f, Bson::Document(_)) if f == "address"));
    }

    #[test]
    fn regex_invalid_pattern_errors() {
        let err = parse_filter(&doc! { "name": { "$regex": "[invalid" } }).unwrap_err();
        assert!(err.0.contains("invalid regex"), "{}", err.0);
    }
}
