use bson::{Bson, Document};

use crate::script::error::Fault;

/// Global functions other than `assert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    ObjectId,
    NumberInt,
    NumberLong,
    Print,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::ObjectId => "ObjectId",
            Builtin::NumberInt => "NumberInt",
            Builtin::NumberLong => "NumberLong",
            Builtin::Print => "print",
        }
    }
}

/// A script value.
///
/// Data is plain BSON (with `Bson::Undefined` standing in for a missing
/// value); the remaining variants are the shell objects a script can hold.
/// Values are copied on assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bson(Bson),
    Db,
    Collection(String),
    Assert,
    Builtin(Builtin),
}

impl Value {
    pub fn undefined() -> Self {
        Value::Bson(Bson::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Bson(Bson::Null | Bson::Undefined))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Bson(b) => match b {
                Bson::Null | Bson::Undefined => false,
                Bson::Boolean(v) => *v,
                Bson::Int32(n) => *n != 0,
                Bson::Int64(n) => *n != 0,
                Bson::Double(n) => *n != 0.0 && !n.is_nan(),
                Bson::String(s) => !s.is_empty(),
                _ => true,
            },
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bson(b) => match b {
                Bson::Null => "null",
                Bson::Undefined => "undefined",
                Bson::Boolean(_) => "boolean",
                Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => "number",
                Bson::String(_) => "string",
                Bson::Array(_) => "array",
                Bson::ObjectId(_) => "ObjectId",
                _ => "object",
            },
            Value::Db => "database",
            Value::Collection(_) => "collection",
            Value::Assert | Value::Builtin(_) => "function",
        }
    }

    /// Convert to storable data. Shell objects cannot be stored.
    pub fn into_bson(self) -> Result<Bson, Fault> {
        match self {
            Value::Bson(b) => Ok(b),
            other => Err(Fault::Type(format!(
                "cannot use a {} as a value",
                other.type_name()
            ))),
        }
    }

    /// The value as a document, or a TypeError naming `what`.
    pub fn into_document(self, what: &str) -> Result<Document, Fault> {
        match self {
            Value::Bson(Bson::Document(doc)) => Ok(doc),
            other => Err(Fault::Type(format!(
                "{what} must be an object, got {}",
                other.type_name()
            ))),
        }
    }

    /// How `print` and string concatenation render the value.
    pub fn display(&self) -> String {
        match self {
            Value::Bson(Bson::String(s)) => s.clone(),
            Value::Bson(Bson::Undefined) => "undefined".to_string(),
            Value::Bson(Bson::Null) => "null".to_string(),
            Value::Bson(b) => b.to_string(),
            Value::Db => "[database]".to_string(),
            Value::Collection(name) => name.clone(),
            Value::Assert => "[function assert]".to_string(),
            Value::Builtin(b) => format!("[function {}]", b.name()),
        }
    }
}

impl From<Bson> for Value {
    fn from(b: Bson) -> Self {
        Value::Bson(b)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Bson(Bson::Document(doc))
    }
}

/// Counts come back as the narrowest integer that holds them.
pub(crate) fn count_value(n: u64) -> Bson {
    match i32::try_from(n) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(i64::try_from(n).unwrap_or(i64::MAX)),
    }
}
