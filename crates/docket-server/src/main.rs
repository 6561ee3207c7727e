use std::sync::Arc;

use docket_server::{Server, ServerConfig};
use docket_store::MemoryStore;

fn main() {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    let store = Arc::new(MemoryStore::new());
    let server = Server::new(store, &config.addr);
    if let Err(e) = server.serve() {
        tracing::error!(addr = %config.addr, error = %e, "server failed");
        std::process::exit(1);
    }
}
