//! HTTP receiver for chunked file uploads.
//!
//! Accepts one `multipart/form-data` POST per chunk, writes the payload at
//! its declared byte offset, and tracks per-file completion through a
//! [`stowage_transfer::SessionRegistry`]. Also exposes purge and cancel
//! endpoints for clearing state.

mod config;
mod handlers;
mod routes;
mod server;

pub use config::ServerConfig;
pub use routes::{AppState, build_app};
pub use server::{run, serve_on};

/// Errors produced by the server crate.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
