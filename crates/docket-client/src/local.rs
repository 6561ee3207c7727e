use std::sync::Arc;

use bson::Document;
use docket_store::{InsertResult, MemoryStore, Namespace, OpReport, UpdateResult};

use crate::client::DocumentClient;
use crate::error::ClientError;

/// In-process client sharing a [`MemoryStore`].
#[derive(Clone)]
pub struct LocalClient {
    store: Arc<MemoryStore>,
}

impl LocalClient {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

impl DocumentClient for LocalClient {
    fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<InsertResult, ClientError> {
        Ok(self.store.insert_one(ns, doc)?)
    }

    fn find(
        &self,
        ns: &Namespace,
        filter: &Document,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, ClientError> {
        Ok(self.store.find(ns, filter, limit)?)
    }

    fn find_one(&self, ns: &Namespace, filter: &Document) -> Result<Option<Document>, ClientError> {
        Ok(self.store.find_one(ns, filter)?)
    }

    fn count(&self, ns: &Namespace, filter: &Document) -> Result<u64, ClientError> {
        Ok(self.store.count(ns, filter)?)
    }

    fn update_one(
        &self,
        ns: &Namespace,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateResult, ClientError> {
        Ok(self.store.update_one(ns, filter, update)?)
    }

    fn replace_one(
        &self,
        ns: &Namespace,
        filter: &Document,
        replacement: Document,
    ) -> Result<UpdateResult, ClientError> {
        Ok(self.store.replace_one(ns, filter, replacement)?)
    }

    fn drop_collection(&self, ns: &Namespace) -> Result<bool, ClientError> {
        Ok(self.store.drop_collection(ns)?)
    }

    fn drop_database(&self, db: &str) -> Result<u64, ClientError> {
        Ok(self.store.drop_database(db)? as u64)
    }

    fn list_collections(&self, db: &str) -> Result<Vec<String>, ClientError> {
        Ok(self.store.list_collections(db)?)
    }

    fn current_op(&self) -> Result<OpReport, ClientError> {
        Ok(self.store.current_op())
    }
}
