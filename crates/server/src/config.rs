use std::path::PathBuf;

use stowage_protocol::DEFAULT_CHUNK_SIZE;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
    /// Directory uploads are written into (created at startup).
    pub data_dir: PathBuf,
    /// Per-request body cap. Must exceed the sender's chunk size, with
    /// slack for multipart framing and the metadata fields.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            data_dir: PathBuf::from("data"),
            max_body_bytes: (DEFAULT_CHUNK_SIZE as usize) + 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_body_cap_exceeds_chunk_size() {
        let config = ServerConfig::default();
        assert!(config.max_body_bytes as u64 > DEFAULT_CHUNK_SIZE);
        assert_eq!(config.port, 8000);
    }
}
