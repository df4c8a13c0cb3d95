//! Wire protocol for the stowage chunked upload service.
//!
//! A sender splits a file into fixed-size chunks and POSTs each one as a
//! `multipart/form-data` request; the receiver reassembles them by byte
//! offset. This crate holds the request/response types shared by both
//! sides plus the route and form-field constants.

pub mod constants;
pub mod messages;

pub use constants::{
    CANCEL_PATH, DEFAULT_CHUNK_SIZE, DEFAULT_WINDOW, FIELD_CHUNK_INDEX, FIELD_CHUNK_OFFSET,
    FIELD_FILE, FIELD_FILE_NAME, FIELD_FILE_SIZE, FIELD_TOTAL_CHUNKS, HEALTH_PATH, PURGE_PATH,
    UPLOAD_PATH,
};
pub use messages::{
    CancelRequest, ChunkUploadRequest, ErrorKind, ErrorResponse, PurgeResponse, RequestError,
    UploadAck,
};
