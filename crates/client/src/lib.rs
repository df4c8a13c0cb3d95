//! Chunked file-upload client.
//!
//! Splits files into fixed-size chunks and POSTs them to a stowage server,
//! keeping a bounded number of requests in flight. The first failed chunk
//! aborts the transfer and cancels outstanding work.

mod dispatcher;
mod stats;
mod upload;

pub use dispatcher::BoundedDispatcher;
pub use stats::{human_bytes, timed};
pub use upload::{UploadReport, Uploader};

use stowage_protocol::ErrorKind;

/// Errors produced by the client crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("chunk {index} rejected: {message}")]
    Chunk {
        index: u64,
        /// Error kind decoded from the server's response body, when one
        /// was present.
        kind: Option<ErrorKind>,
        message: String,
    },

    #[error(transparent)]
    Transfer(#[from] stowage_transfer::TransferError),

    #[error("upload cancelled")]
    Cancelled,

    #[error("task join error: {0}")]
    TaskJoin(String),
}
