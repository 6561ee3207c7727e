use bson::{Document, doc};
use docket_store::{InsertResult, Namespace, OpReport, UpdateResult};
use tracing::debug;

use crate::client::DocumentClient;
use crate::error::ClientError;

/// A database scope over a client. Handing out collections never touches
/// the store.
pub struct Database<'c, C: DocumentClient + ?Sized> {
    client: &'c C,
    name: String,
}

impl<'c, C: DocumentClient + ?Sized> Database<'c, C> {
    pub fn new(client: &'c C, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_collection(&self, name: &str) -> CollectionHandle<'c, C> {
        CollectionHandle {
            client: self.client,
            ns: Namespace::new(self.name.clone(), name),
        }
    }

    pub fn current_op(&self) -> Result<OpReport, ClientError> {
        debug!(db = %self.name, "currentOp");
        self.client.current_op()
    }

    pub fn drop_database(&self) -> Result<u64, ClientError> {
        debug!(db = %self.name, "dropDatabase");
        self.client.drop_database(&self.name)
    }

    pub fn list_collections(&self) -> Result<Vec<String>, ClientError> {
        self.client.list_collections(&self.name)
    }
}

/// A lazily bound collection name.
pub struct CollectionHandle<'c, C: DocumentClient + ?Sized> {
    client: &'c C,
    ns: Namespace,
}

impl<C: DocumentClient + ?Sized> CollectionHandle<'_, C> {
    pub fn name(&self) -> &str {
        &self.ns.coll
    }

    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    /// Remove the collection. Dropping a missing collection succeeds.
    pub fn drop(&self) -> Result<(), ClientError> {
        debug!(ns = %self.ns, "drop");
        self.client.drop_collection(&self.ns).map(|_| ())
    }

    pub fn insert_one(&self, doc: Document) -> Result<InsertResult, ClientError> {
        debug!(ns = %self.ns, "insertOne");
        self.client.insert_one(&self.ns, doc)
    }

    /// First match in natural order. `None` filter matches everything.
    pub fn find_one(&self, filter: Option<&Document>) -> Result<Option<Document>, ClientError> {
        debug!(ns = %self.ns, ?filter, "findOne");
        self.client.find_one(&self.ns, filter.unwrap_or(&doc! {}))
    }

    pub fn find(&self, filter: Option<&Document>) -> Result<Vec<Document>, ClientError> {
        debug!(ns = %self.ns, ?filter, "find");
        self.client.find(&self.ns, filter.unwrap_or(&doc! {}), None)
    }

    pub fn count_documents(&self, filter: Option<&Document>) -> Result<u64, ClientError> {
        debug!(ns = %self.ns, ?filter, "countDocuments");
        self.client.count(&self.ns, filter.unwrap_or(&doc! {}))
    }

    pub fn update_one(
        &self,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateResult, ClientError> {
        debug!(ns = %self.ns, %filter, "updateOne");
        self.client.update_one(&self.ns, filter, update)
    }

    pub fn replace_one(
        &self,
        filter: &Document,
        replacement: Document,
    ) -> Result<UpdateResult, ClientError> {
        debug!(ns = %self.ns, %filter, "replaceOne");
        self.client.replace_one(&self.ns, filter, replacement)
    }
}
