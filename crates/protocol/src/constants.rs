//! Protocol constants shared by the server and client.

/// Default chunk size: 8 MiB.
///
/// Large chunks keep the per-request overhead (multipart framing, one
/// round-trip per chunk) small relative to the payload. Both sides accept
/// any positive chunk size; this is only the sender's default.
pub const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Default number of unacknowledged chunk requests a sender keeps in flight.
pub const DEFAULT_WINDOW: usize = 2;

/// Route for the per-chunk upload POST.
pub const UPLOAD_PATH: &str = "/upload";

/// Route that deletes all persisted uploads and resets session state.
pub const PURGE_PATH: &str = "/purge";

/// Route that aborts one in-flight upload and removes its partial file.
pub const CANCEL_PATH: &str = "/cancel";

/// Liveness probe route.
pub const HEALTH_PATH: &str = "/health";

// Multipart form field names for the upload request. The payload travels as
// a binary part under `FIELD_FILE`; everything else is a text field.
pub const FIELD_FILE_NAME: &str = "file_name";
pub const FIELD_CHUNK_INDEX: &str = "chunk_index";
pub const FIELD_CHUNK_OFFSET: &str = "chunk_byte_offset";
pub const FIELD_TOTAL_CHUNKS: &str = "total_chunks";
pub const FIELD_FILE_SIZE: &str = "file_size";
pub const FIELD_FILE: &str = "file";
