//! Configuration model loaded from external sources.

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
/// Basic configuration shared across handlers.
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    /// Directory served as static assets; relative request paths resolve here.
    pub static_dir: String,
    /// Maximum accepted request body, in bytes.
    pub upload_limit: usize,
    /// Fixed allowlist of roots. Empty means the host's drives.
    #[serde(default)]
    pub roots: Vec<String>,
}
