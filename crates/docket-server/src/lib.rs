mod config;
pub mod protocol;
mod server;
mod session;

pub use config::ServerConfig;
pub use server::Server;
pub use session::Session;
