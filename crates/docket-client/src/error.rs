use std::io::ErrorKind;

use docket_store::StoreError;

#[derive(Debug)]
pub enum ClientError {
    /// The connection to the store failed.
    Transport(std::io::Error),
    /// The store did not answer within the configured timeout.
    Timeout,
    Serialization(String),
    /// The store rejected the operation.
    Store(StoreError),
    /// The store answered with something the client did not ask for.
    Protocol(String),
}

impl ClientError {
    /// Whether the error came from the store rather than the transport.
    pub fn is_store_error(&self) -> bool {
        matches!(self, ClientError::Store(_))
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Transport(e) => write!(f, "transport error: {e}"),
            ClientError::Timeout => write!(f, "timed out waiting for the store"),
            ClientError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            ClientError::Store(e) => write!(f, "{e}"),
            ClientError::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Transport(e) => Some(e),
            ClientError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            // Socket read/write timeouts surface as either kind depending on platform.
            ErrorKind::TimedOut | ErrorKind::WouldBlock => ClientError::Timeout,
            _ => ClientError::Transport(e),
        }
    }
}

impl From<StoreError> for ClientError {
    fn from(e: StoreError) -> Self {
        ClientError::Store(e)
    }
}

impl From<rmp_serde::encode::Error> for ClientError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        ClientError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for ClientError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        ClientError::Serialization(e.to_string())
    }
}
