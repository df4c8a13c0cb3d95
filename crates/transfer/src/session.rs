use std::collections::HashSet;
use std::sync::Mutex;

use crate::TransferError;

/// Lifecycle state of one upload session.
///
/// Per file the state machine is
/// `Absent -> Active(received = k) -> { Active(k+1) | Complete | Rejected }`;
/// `Complete` is represented by the session leaving the registry, while a
/// `Rejected` session is kept so the failure stays observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Rejected,
}

/// Outcome of recording one chunk arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    /// `false` when this index had already been recorded (duplicate
    /// delivery or retry).
    pub newly_received: bool,
    /// Distinct chunk indices seen so far.
    pub received_count: u64,
    /// `true` only on the call that records the last missing index, so
    /// finalization runs exactly once under concurrent arrivals.
    pub complete: bool,
}

/// Server-side bookkeeping for one in-flight logical file upload
/// (thread-safe).
///
/// Completion is tracked as a set of received chunk indices rather than a
/// bare arrival counter: duplicates and reordering cannot inflate the
/// count, and "all chunks arrived" is an exact cardinality check.
pub struct UploadSession {
    file_name: String,
    total_chunks: u64,
    declared_size: u64,
    inner: Mutex<SessionInner>,
}

struct SessionInner {
    received: HashSet<u64>,
    status: SessionStatus,
}

impl UploadSession {
    /// Creates a fresh session with no chunks received.
    pub fn new(file_name: impl Into<String>, total_chunks: u64, declared_size: u64) -> Self {
        Self {
            file_name: file_name.into(),
            total_chunks,
            declared_size,
            inner: Mutex::new(SessionInner {
                received: HashSet::new(),
                status: SessionStatus::Active,
            }),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Declared total size of the source file; used only for final
    /// validation.
    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }

    /// Whether a chunk request's repeated declaration matches this session.
    pub fn matches_declaration(&self, total_chunks: u64, file_size: u64) -> bool {
        self.total_chunks == total_chunks && self.declared_size == file_size
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.lock().unwrap().status
    }

    pub fn is_active(&self) -> bool {
        self.status() == SessionStatus::Active
    }

    /// Distinct chunk indices received so far.
    pub fn received_count(&self) -> u64 {
        self.inner.lock().unwrap().received.len() as u64
    }

    /// Whether every chunk index has been received.
    pub fn is_complete(&self) -> bool {
        self.inner.lock().unwrap().received.len() as u64 == self.total_chunks
    }

    /// Marks the session rejected; further chunks for it are refused.
    pub fn reject(&self) {
        self.inner.lock().unwrap().status = SessionStatus::Rejected;
    }

    /// Records the arrival of chunk `index`.
    ///
    /// Atomic with respect to concurrent arrivals for the same file.
    pub fn mark_received(&self, index: u64) -> Result<ChunkProgress, TransferError> {
        if index >= self.total_chunks {
            return Err(TransferError::InvalidChunk(format!(
                "chunk index {index} out of range for {} chunks of {}",
                self.total_chunks, self.file_name
            )));
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.status == SessionStatus::Rejected {
            return Err(TransferError::Rejected(self.file_name.clone()));
        }

        let newly_received = inner.received.insert(index);
        let received_count = inner.received.len() as u64;
        Ok(ChunkProgress {
            newly_received,
            received_count,
            complete: newly_received && received_count == self.total_chunks,
        })
    }
}
