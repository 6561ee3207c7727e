use docket_store::{InsertResult, Namespace, OpReport, StoreError, UpdateResult};
use serde::{Deserialize, Serialize};

/// Requests are framed as a 4-byte big-endian length followed by the
/// MessagePack encoding of this enum. Responses use the same framing.
#[derive(Debug, Serialize, Deserialize)]
pub enum Request {
    InsertOne {
        ns: Namespace,
        doc: bson::Document,
    },
    Find {
        ns: Namespace,
        filter: bson::Document,
        limit: Option<u64>,
    },
    FindOne {
        ns: Namespace,
        filter: bson::Document,
    },
    Count {
        ns: Namespace,
        filter: bson::Document,
    },
    UpdateOne {
        ns: Namespace,
        filter: bson::Document,
        update: bson::Document,
    },
    ReplaceOne {
        ns: Namespace,
        filter: bson::Document,
        replacement: bson::Document,
    },
    DropCollection {
        ns: Namespace,
    },
    DropDatabase {
        db: String,
    },
    ListCollections {
        db: String,
    },
    CurrentOp,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum Response {
    Insert(InsertResult),
    Record(Option<bson::Document>),
    Records(Vec<bson::Document>),
    Count(u64),
    Update(UpdateResult),
    Dropped(bool),
    DroppedCollections(u64),
    Collections(Vec<String>),
    CurrentOp(OpReport),
    Error(StoreError),
}
