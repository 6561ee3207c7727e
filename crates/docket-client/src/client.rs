use bson::Document;
use docket_store::{InsertResult, Namespace, OpReport, UpdateResult};

use crate::error::ClientError;

/// Operations a document store exposes to the harness.
///
/// Every call blocks until the store answers. Store-side rejections come back
/// as [`ClientError::Store`]; everything else is a transport failure.
pub trait DocumentClient {
    fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<InsertResult, ClientError>;

    fn find(
        &self,
        ns: &Namespace,
        filter: &Document,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, ClientError>;

    fn find_one(&self, ns: &Namespace, filter: &Document) -> Result<Option<Document>, ClientError>;

    fn count(&self, ns: &Namespace, filter: &Document) -> Result<u64, ClientError>;

    fn update_one(
        &self,
        ns: &Namespace,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateResult, ClientError>;

    fn replace_one(
        &self,
        ns: &Namespace,
        filter: &Document,
        replacement: Document,
    ) -> Result<UpdateResult, ClientError>;

    fn drop_collection(&self, ns: &Namespace) -> Result<bool, ClientError>;

    fn drop_database(&self, db: &str) -> Result<u64, ClientError>;

    fn list_collections(&self, db: &str) -> Result<Vec<String>, ClientError>;

    fn current_op(&self) -> Result<OpReport, ClientError>;
}
