use std::collections::HashSet;
use std::fmt;

use bson::{Bson, Document};

use crate::compare::{as_f64, values_equal};

/// A single field-level update operator.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    /// Set a field to a value. Creates the field (and missing parents) if absent.
    Set(Bson),
    /// Remove a field from the document.
    Unset,
    /// Increment a numeric field by the given amount (negative for decrement).
    Inc(Bson),
    /// Rename a field. Value is the new field path.
    Rename(String),
}

/// A single field + operator pair within an update.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMutation {
    pub field: String,
    pub op: MutationOp,
}

/// A parsed update document.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// `{ "$set": {...}, "$inc": {...} }`: operators applied in document order.
    Operators(Vec<FieldMutation>),
    /// A bare document replacing every field except `_id`.
    Replacement(Document),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateErrorKind {
    FailedToParse,
    TypeMismatch,
    PathNotViable,
    ConflictingUpdateOperators,
    ImmutableField,
    /// `$inc` result does not fit in a 64-bit integer.
    Overflow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateError {
    pub kind: UpdateErrorKind,
    pub message: String,
}

impl UpdateError {
    fn new(kind: UpdateErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn immutable_id() -> Self {
        Self::new(
            UpdateErrorKind::ImmutableField,
            "Performing an update on the path '_id' would modify the immutable field '_id'",
        )
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UpdateError {}

/// Parse an update document.
///
/// A document whose keys all start with `$` is an operator update; a document
/// with no `$` keys is a replacement. Mixing the two is rejected.
pub fn parse_update(doc: &Document) -> Result<Update, UpdateError> {
    let operator_keys = doc.keys().filter(|k| k.starts_with('$')).count();
    if operator_keys == 0 {
        return Ok(Update::Replacement(doc.clone()));
    }
    if operator_keys != doc.len() {
        return Err(UpdateError::new(
            UpdateErrorKind::FailedToParse,
            "update document mixes operators and plain fields",
        ));
    }

    let mut ops = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (operator, value) in doc {
        let Bson::Document(fields) = value else {
            return Err(UpdateError::new(
                UpdateErrorKind::FailedToParse,
                format!("Modifiers operate on fields but we found type {value} instead for {operator}"),
            ));
        };

        for (field, arg) in fields {
            let op = match operator.as_str() {
                "$set" => MutationOp::Set(arg.clone()),
                "$unset" => MutationOp::Unset,
                "$inc" => {
                    if as_f64(arg).is_none() {
                        return Err(UpdateError::new(
                            UpdateErrorKind::TypeMismatch,
                            format!("Cannot increment with non-numeric argument: {{{field}: {arg}}}"),
                        ));
                    }
                    MutationOp::Inc(arg.clone())
                }
                "$rename" => match arg {
                    Bson::String(target) => MutationOp::Rename(target.clone()),
                    _ => {
                        return Err(UpdateError::new(
                            UpdateErrorKind::FailedToParse,
                            format!("The 'to' field for $rename must be a string: {field}: {arg}"),
                        ));
                    }
                },
                other => {
                    return Err(UpdateError::new(
                        UpdateErrorKind::FailedToParse,
                        format!("Unknown modifier: {other}"),
                    ));
                }
            };

            let mut touched = vec![field.clone()];
            if let MutationOp::Rename(target) = &op {
                touched.push(target.clone());
            }
            for path in touched {
                if !seen.insert(path.clone()) {
                    return Err(UpdateError::new(
                        UpdateErrorKind::ConflictingUpdateOperators,
                        format!("Updating the path '{path}' would create a conflict at '{path}'"),
                    ));
                }
            }

            ops.push(FieldMutation {
                field: field.clone(),
                op,
            });
        }
    }

    Ok(Update::Operators(ops))
}

impl Update {
    /// Apply this update to a stored document.
    ///
    /// The `_id` of `original` is preserved; any attempt to change it fails
    /// with [`UpdateErrorKind::ImmutableField`]. Returns `Ok(None)` if the
    /// document is unchanged.
    pub fn apply(&self, original: &Document) -> Result<Option<Document>, UpdateError> {
        let updated = match self {
            Update::Replacement(replacement) => replace(original, replacement)?,
            Update::Operators(ops) => {
                let mut doc = original.clone();
                for fm in ops {
                    apply_op(&mut doc, fm)?;
                }
                let id_kept = match (original.get("_id"), doc.get("_id")) {
                    (Some(before), Some(after)) => values_equal(before, after),
                    (None, None) => true,
                    _ => false,
                };
                if !id_kept {
                    return Err(UpdateError::immutable_id());
                }
                doc
            }
        };

        if updated == *original {
            Ok(None)
        } else {
            Ok(Some(updated))
        }
    }
}

fn replace(original: &Document, replacement: &Document) -> Result<Document, UpdateError> {
    let mut doc = Document::new();
    if let Some(id) = original.get("_id") {
        if let Some(new_id) = replacement.get("_id") {
            if !values_equal(id, new_id) {
                return Err(UpdateError::new(
                    UpdateErrorKind::ImmutableField,
                    "After applying the update, the (immutable) field '_id' was found to have been altered",
                ));
            }
        }
        doc.insert("_id", id.clone());
    }
    for (key, value) in replacement {
        if key != "_id" {
            doc.insert(key.clone(), value.clone());
        }
    }
    Ok(doc)
}

fn apply_op(doc: &mut Document, fm: &FieldMutation) -> Result<(), UpdateError> {
    match &fm.op {
        MutationOp::Set(val) => {
            if let Some((parent, leaf)) = resolve_parent_mut(doc, &fm.field, true)? {
                parent.insert(leaf, val.clone());
            }
        }
        MutationOp::Unset => {
            if let Some((parent, leaf)) = resolve_parent_mut(doc, &fm.field, false)? {
                parent.remove(leaf);
            }
        }
        MutationOp::Inc(amount) => {
            if let Some((parent, leaf)) = resolve_parent_mut(doc, &fm.field, true)? {
                let next = match parent.get(leaf) {
                    None => amount.clone(),
                    Some(current) => add_numbers(current, amount, leaf)?,
                };
                parent.insert(leaf, next);
            }
        }
        MutationOp::Rename(target) => {
            let taken = match resolve_parent_mut(doc, &fm.field, false)? {
                Some((parent, leaf)) => parent.remove(leaf),
                None => None,
            };
            if let Some(value) = taken {
                if let Some((parent, leaf)) = resolve_parent_mut(doc, target, true)? {
                    parent.insert(leaf, value);
                }
            }
        }
    }
    Ok(())
}

/// Walk a dotted path to the document holding its last segment.
///
/// Missing intermediate documents are created when `create` is set, otherwise
/// the walk stops with `Ok(None)`. A non-document intermediate is an error.
fn resolve_parent_mut<'d, 'p>(
    doc: &'d mut Document,
    path: &'p str,
    create: bool,
) -> Result<Option<(&'d mut Document, &'p str)>, UpdateError> {
    let mut parts: Vec<&'p str> = path.split('.').collect();
    let leaf = match parts.pop() {
        Some(leaf) if !leaf.is_empty() => leaf,
        _ => {
            return Err(UpdateError::new(
                UpdateErrorKind::FailedToParse,
                format!("invalid field path '{path}'"),
            ));
        }
    };

    let mut current = doc;
    for part in parts {
        if !current.contains_key(part) {
            if !create {
                return Ok(None);
            }
            current.insert(part, Document::new());
        }
        current = match current.get_mut(part) {
            Some(Bson::Document(sub)) => sub,
            Some(other) => {
                return Err(UpdateError::new(
                    UpdateErrorKind::PathNotViable,
                    format!("Cannot create field '{leaf}' in element {{{part}: {other}}}"),
                ));
            }
            None => return Ok(None),
        };
    }
    Ok(Some((current, leaf)))
}

/// Numeric addition with BSON type promotion: Int32 widens to Int64 on
/// overflow, any Double operand yields a Double. Int64 overflow is an error.
fn add_numbers(current: &Bson, amount: &Bson, leaf: &str) -> Result<Bson, UpdateError> {
    let overflow = || {
        UpdateError::new(
            UpdateErrorKind::Overflow,
            format!(
                "Failed to apply $inc operations to current value {current} \
                 for field '{leaf}': integer overflow"
            ),
        )
    };
    match (current, amount) {
        (Bson::Int32(a), Bson::Int32(b)) => Ok(a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)))),
        (Bson::Int64(a), Bson::Int32(b)) => {
            a.checked_add(i64::from(*b)).map(Bson::Int64).ok_or_else(overflow)
        }
        (Bson::Int32(a), Bson::Int64(b)) => {
            i64::from(*a).checked_add(*b).map(Bson::Int64).ok_or_else(overflow)
        }
        (Bson::Int64(a), Bson::Int64(b)) => a.checked_add(*b).map(Bson::Int64).ok_or_else(overflow),
        _ => match (as_f64(current), as_f64(amount)) {
            (Some(a), Some(b)) => Ok(Bson::Double(a + b)),
            _ => Err(UpdateError::new(
                UpdateErrorKind::TypeMismatch,
                format!("Cannot apply $inc to a value of non-numeric type: {leaf}: {current}"),
            )),
        },
    }
}
