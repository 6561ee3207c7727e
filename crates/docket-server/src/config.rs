pub const DEFAULT_ADDR: &str = "127.0.0.1:9700";

/// Server settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `DOCKET_ADDR`, default `127.0.0.1:9700`.
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let addr = lookup("DOCKET_ADDR")
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        Self { addr }
    }
}
