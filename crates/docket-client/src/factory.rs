use std::sync::Arc;
use std::time::Duration;

use docket_store::MemoryStore;

use crate::client::DocumentClient;
use crate::error::ClientError;
use crate::local::LocalClient;
use crate::remote::RemoteClient;

/// Creates one client per script run.
pub trait ClientFactory: Send + Sync {
    type Client: DocumentClient;

    fn connect(&self) -> Result<Self::Client, ClientError>;
}

/// Clients sharing one in-process store.
#[derive(Clone, Default)]
pub struct LocalFactory {
    store: Arc<MemoryStore>,
}

impl LocalFactory {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

impl ClientFactory for LocalFactory {
    type Client = LocalClient;

    fn connect(&self) -> Result<LocalClient, ClientError> {
        Ok(LocalClient::new(Arc::clone(&self.store)))
    }
}

/// A fresh TCP connection per run.
#[derive(Debug, Clone)]
pub struct RemoteFactory {
    addr: String,
    timeout: Option<Duration>,
}

impl RemoteFactory {
    pub fn new(addr: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl ClientFactory for RemoteFactory {
    type Client = RemoteClient;

    fn connect(&self) -> Result<RemoteClient, ClientError> {
        RemoteClient::connect_with_timeout(self.addr.as_str(), self.timeout)
    }
}
