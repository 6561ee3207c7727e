use std::fmt;

use bson::Bson;
use docket_query::{FilterParseError, UpdateError, UpdateErrorKind};
use serde::{Deserialize, Serialize};

use crate::namespace::Namespace;

/// Server error codes, numbered the way MongoDB numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InternalError,
    BadValue,
    FailedToParse,
    TypeMismatch,
    PathNotViable,
    ConflictingUpdateOperators,
    ImmutableField,
    DuplicateKey,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::InternalError => 1,
            ErrorCode::BadValue => 2,
            ErrorCode::FailedToParse => 9,
            ErrorCode::TypeMismatch => 14,
            ErrorCode::PathNotViable => 28,
            ErrorCode::ConflictingUpdateOperators => 40,
            ErrorCode::ImmutableField => 66,
            ErrorCode::DuplicateKey => 11000,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::InternalError => "InternalError",
            ErrorCode::BadValue => "BadValue",
            ErrorCode::FailedToParse => "FailedToParse",
            ErrorCode::TypeMismatch => "TypeMismatch",
            ErrorCode::PathNotViable => "PathNotViable",
            ErrorCode::ConflictingUpdateOperators => "ConflictingUpdateOperators",
            ErrorCode::ImmutableField => "ImmutableField",
            ErrorCode::DuplicateKey => "DuplicateKey",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreError {
    /// The store rejected a write.
    Write { code: ErrorCode, message: String },
    /// The store rejected a query.
    Query { code: ErrorCode, message: String },
    Storage(String),
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::Write { code, .. } | StoreError::Query { code, .. } => *code,
            StoreError::Storage(_) => ErrorCode::InternalError,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StoreError::Write { message, .. } | StoreError::Query { message, .. } => message,
            StoreError::Storage(message) => message,
        }
    }

    pub(crate) fn write(code: ErrorCode, message: impl Into<String>) -> Self {
        StoreError::Write {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn duplicate_key(ns: &Namespace, id: &Bson) -> Self {
        Self::write(
            ErrorCode::DuplicateKey,
            format!("E11000 duplicate key error collection: {ns} index: _id_ dup key: {{ _id: {id} }}"),
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Write { code, message } => write!(f, "write error {code}: {message}"),
            StoreError::Query { code, message } => write!(f, "query error {code}: {message}"),
            StoreError::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<FilterParseError> for StoreError {
    fn from(e: FilterParseError) -> Self {
        StoreError::Query {
            code: ErrorCode::BadValue,
            message: e.0,
        }
    }
}

impl From<UpdateError> for StoreError {
    fn from(e: UpdateError) -> Self {
        let code = match e.kind {
            UpdateErrorKind::FailedToParse => ErrorCode::FailedToParse,
            UpdateErrorKind::TypeMismatch => ErrorCode::TypeMismatch,
            UpdateErrorKind::PathNotViable => ErrorCode::PathNotViable,
            UpdateErrorKind::ConflictingUpdateOperators => ErrorCode::ConflictingUpdateOperators,
            UpdateErrorKind::ImmutableField => ErrorCode::ImmutableField,
            UpdateErrorKind::Overflow => ErrorCode::BadValue,
        };
        StoreError::Write {
            code,
            message: e.message,
        }
    }
}
