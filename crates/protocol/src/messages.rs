use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Upload request
// ---------------------------------------------------------------------------

/// Metadata fields of one chunk-upload request.
///
/// The sender repeats `total_chunks` and `file_size` on every chunk; the
/// receiver uses `file_size` only for final validation, never for
/// mid-transfer decisions. The raw payload travels separately as the
/// `file` multipart part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkUploadRequest {
    pub file_name: String,
    pub chunk_index: u64,
    pub chunk_byte_offset: u64,
    pub total_chunks: u64,
    pub file_size: u64,
}

/// A request whose fields do not describe a well-formed chunk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("total_chunks must be at least 1")]
    NoChunks,

    #[error("chunk index {index} out of range for {total} chunks")]
    IndexOutOfRange { index: u64, total: u64 },

    #[error("first chunk must start at offset 0, got {offset}")]
    NonZeroStart { offset: u64 },

    #[error("chunk {index} at offset {offset} does not line up with a {len}-byte payload")]
    OffsetMismatch { index: u64, offset: u64, len: u64 },

    #[error("final chunk ends at byte {end} but {declared} bytes were declared")]
    LengthMismatch { end: u64, declared: u64 },
}

impl ChunkUploadRequest {
    /// Checks the offset arithmetic of this request against its payload.
    ///
    /// For a well-formed stream the chunk offsets partition
    /// `[0, file_size)` into `total_chunks` contiguous ranges, the last
    /// possibly shorter. Every non-final chunk therefore carries exactly
    /// the sender's chunk size, so `offset == index * len` must hold; the
    /// final chunk must end exactly at `file_size`.
    pub fn validate(&self, payload_len: u64) -> Result<(), RequestError> {
        if self.total_chunks == 0 {
            return Err(RequestError::NoChunks);
        }
        if self.chunk_index >= self.total_chunks {
            return Err(RequestError::IndexOutOfRange {
                index: self.chunk_index,
                total: self.total_chunks,
            });
        }
        if self.chunk_index == 0 && self.chunk_byte_offset != 0 {
            return Err(RequestError::NonZeroStart {
                offset: self.chunk_byte_offset,
            });
        }

        let mismatch = RequestError::OffsetMismatch {
            index: self.chunk_index,
            offset: self.chunk_byte_offset,
            len: payload_len,
        };

        if self.chunk_index + 1 == self.total_chunks {
            let end = self
                .chunk_byte_offset
                .checked_add(payload_len)
                .ok_or_else(|| mismatch.clone())?;
            if end != self.file_size {
                return Err(RequestError::LengthMismatch {
                    end,
                    declared: self.file_size,
                });
            }
            // The implied chunk size (offset / index) must be a whole
            // number of bytes no smaller than the trailing payload.
            if self.chunk_index > 0 {
                if self.chunk_byte_offset % self.chunk_index != 0 {
                    return Err(mismatch);
                }
                if self.chunk_byte_offset / self.chunk_index < payload_len {
                    return Err(mismatch);
                }
            }
        } else {
            if payload_len == 0 {
                return Err(mismatch);
            }
            let expected = self
                .chunk_index
                .checked_mul(payload_len)
                .ok_or_else(|| mismatch.clone())?;
            if expected != self.chunk_byte_offset {
                return Err(mismatch);
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Acknowledgment for one accepted chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAck {
    pub message: String,
}

impl UploadAck {
    /// Builds the per-chunk acknowledgment text.
    pub fn for_chunk(chunk_index: u64, file_name: &str) -> Self {
        Self {
            message: format!("Chunk #{chunk_index} upload successful for {file_name}"),
        }
    }
}

/// Failure category carried on every error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A completed file of this name already exists and no session is active.
    AlreadyExists,
    /// The underlying storage write failed.
    WriteFailure,
    /// Final on-disk size does not match the declared file size.
    SizeMismatch,
    /// The upload was finalized and rejected; further chunks are refused.
    Rejected,
    /// The request itself is malformed.
    InvalidRequest,
}

/// Error body returned with any non-success status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: u16, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            kind,
            message: message.into(),
        }
    }
}

/// Response to a purge: how many artifacts were deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub removed: u32,
}

/// Aborts one in-flight upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub file_name: String,
}
