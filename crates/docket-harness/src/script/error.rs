use docket_client::ClientError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: SyntaxError: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// What went wrong while executing a statement.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("ReferenceError: {0} is not defined")]
    Reference(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("{0}")]
    Client(#[from] ClientError),
}

/// An error that aborts a script run.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("line {line}: {fault}")]
    Runtime { line: usize, fault: Fault },
}

impl ScriptError {
    pub fn line(&self) -> usize {
        match self {
            ScriptError::Parse(e) => e.line,
            ScriptError::Runtime { line, .. } => *line,
        }
    }
}
