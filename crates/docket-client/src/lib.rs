mod client;
mod error;
mod factory;
mod handle;
mod local;
mod remote;

pub use client::DocumentClient;
pub use error::ClientError;
pub use factory::{ClientFactory, LocalFactory, RemoteFactory};
pub use handle::{CollectionHandle, Database};
pub use local::LocalClient;
pub use remote::RemoteClient;
