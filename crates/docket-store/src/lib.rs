mod collection;
mod current_op;
mod error;
mod namespace;
mod result;
mod store;

pub use current_op::{OpDescriptor, OpKind, OpReport};
pub use error::{ErrorCode, StoreError};
pub use namespace::Namespace;
pub use result::{InsertResult, UpdateResult};
pub use store::MemoryStore;
