//! Chunked transfer core: planning, disk I/O, and session tracking.
//!
//! The client side uses [`ChunkPlan`] and [`ChunkReader`] to slice a file
//! into fixed-size chunks; the server side reassembles them with
//! [`ChunkWriter`] and tracks per-file completion in a [`SessionRegistry`].
//! Nothing here touches the transport.

mod chunked;
mod plan;
mod registry;
mod session;
mod validation;

pub use chunked::{Chunk, ChunkReader, ChunkWriter};
pub use plan::{ChunkPlan, ChunkSpec};
pub use registry::SessionRegistry;
pub use session::{ChunkProgress, SessionStatus, UploadSession};
pub use validation::validate_file_name;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file already exists: {0}")]
    AlreadyExists(String),

    #[error("size mismatch for {file_name}: {actual} bytes on disk, {declared} declared")]
    SizeMismatch {
        file_name: String,
        declared: u64,
        actual: u64,
    },

    #[error("upload rejected: {0}")]
    Rejected(String),

    #[error("no active session: {0}")]
    SessionNotFound(String),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("invalid chunk: {0}")]
    InvalidChunk(String),
}
