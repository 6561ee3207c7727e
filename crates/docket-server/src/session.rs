use std::sync::Arc;

use docket_store::{MemoryStore, StoreError};

use crate::protocol::{Request, Response};

/// Dispatches decoded requests for one connection.
pub struct Session {
    store: Arc<MemoryStore>,
}

impl Session {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn handle(&self, request: Request) -> Response {
        let store = &self.store;
        match request {
            Request::InsertOne { ns, doc } => reply(store.insert_one(&ns, doc), Response::Insert),
            Request::Find { ns, filter, limit } => {
                let limit = limit.map(|n| usize::try_from(n).unwrap_or(usize::MAX));
                reply(store.find(&ns, &filter, limit), Response::Records)
            }
            Request::FindOne { ns, filter } => {
                reply(store.find_one(&ns, &filter), Response::Record)
            }
            Request::Count { ns, filter } => reply(store.count(&ns, &filter), Response::Count),
            Request::UpdateOne { ns, filter, update } => {
                reply(store.update_one(&ns, &filter, &update), Response::Update)
            }
            Request::ReplaceOne {
                ns,
                filter,
                replacement,
            } => reply(store.replace_one(&ns, &filter, replacement), Response::Update),
            Request::DropCollection { ns } => reply(store.drop_collection(&ns), Response::Dropped),
            Request::DropDatabase { db } => reply(store.drop_database(&db), |n| {
                Response::DroppedCollections(n as u64)
            }),
            Request::ListCollections { db } => {
                reply(store.list_collections(&db), Response::Collections)
            }
            Request::CurrentOp => Response::CurrentOp(store.current_op()),
        }
    }
}

fn reply<T>(result: Result<T, StoreError>, ok: impl FnOnce(T) -> Response) -> Response {
    match result {
        Ok(value) => ok(value),
        Err(e) => Response::Error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docket_store::{ErrorCode, Namespace};

    #[test]
    fn store_errors_become_error_responses() {
        let session = Session::new(Arc::new(MemoryStore::new()));
        let ns = Namespace::new("test", "c");
        let insert = || Request::InsertOne {
            ns: ns.clone(),
            doc: doc! { "_id": 1 },
        };
        assert!(matches!(session.handle(insert()), Response::Insert(_)));
        match session.handle(insert()) {
            Response::Error(e) => assert_eq!(e.code(), ErrorCode::DuplicateKey),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn current_op_response_carries_inprog() {
        let session = Session::new(Arc::new(MemoryStore::new()));
        match session.handle(Request::CurrentOp) {
            Response::CurrentOp(report) => assert!(!report.inprog.is_empty()),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
