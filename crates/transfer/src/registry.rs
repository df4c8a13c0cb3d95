use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::session::{SessionStatus, UploadSession};
use crate::validation::validate_file_name;
use crate::TransferError;

/// Process-wide map from file name to upload session.
///
/// The registry is the source of truth for "how many chunks has this file
/// received". The outer map lock is held only for lookups and inserts;
/// per-chunk accounting happens inside each [`UploadSession`]'s own lock,
/// so uploads of distinct files never contend.
pub struct SessionRegistry {
    data_dir: PathBuf,
    sessions: Mutex<HashMap<String, Arc<UploadSession>>>,
}

impl SessionRegistry {
    /// Creates a registry whose completion checks run against `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The directory finished uploads land in.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the session for `file_name`, creating one on the first
    /// chunk.
    ///
    /// Creation is only permitted when no file of that name exists on disk;
    /// the exists-check and the insert happen under one lock, so two
    /// concurrent first chunks cannot both slip past it. Chunks whose
    /// repeated `total_chunks`/`file_size` declaration drifts from the
    /// session's are refused.
    pub fn begin_or_continue(
        &self,
        file_name: &str,
        total_chunks: u64,
        file_size: u64,
    ) -> Result<Arc<UploadSession>, TransferError> {
        validate_file_name(file_name)?;

        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.get(file_name) {
            if session.status() == SessionStatus::Rejected {
                return Err(TransferError::Rejected(file_name.to_string()));
            }
            if !session.matches_declaration(total_chunks, file_size) {
                return Err(TransferError::InvalidChunk(format!(
                    "declared totals changed mid-upload for {file_name}"
                )));
            }
            return Ok(Arc::clone(session));
        }

        if self.data_dir.join(file_name).exists() {
            return Err(TransferError::AlreadyExists(file_name.to_string()));
        }

        let session = Arc::new(UploadSession::new(file_name, total_chunks, file_size));
        sessions.insert(file_name.to_string(), Arc::clone(&session));
        tracing::debug!(file_name, total_chunks, file_size, "upload session opened");
        Ok(session)
    }

    /// Validates the finished file against its declared size and retires
    /// the session.
    ///
    /// On a match the session is removed and the upload is complete. On a
    /// mismatch the session flips to [`SessionStatus::Rejected`] and stays
    /// in the registry, so "completed but invalid" remains distinguishable
    /// from "still in progress"; the partial file is left on disk for an
    /// explicit cancel or purge.
    pub fn finalize(&self, file_name: &str) -> Result<(), TransferError> {
        let session = self
            .sessions
            .lock()
            .unwrap()
            .get(file_name)
            .cloned()
            .ok_or_else(|| TransferError::SessionNotFound(file_name.to_string()))?;

        let actual = std::fs::metadata(self.data_dir.join(file_name))?.len();
        let declared = session.declared_size();

        if actual != declared {
            session.reject();
            tracing::warn!(
                file_name,
                actual,
                declared,
                "upload completed with a size mismatch"
            );
            return Err(TransferError::SizeMismatch {
                file_name: file_name.to_string(),
                declared,
                actual,
            });
        }

        self.sessions.lock().unwrap().remove(file_name);
        tracing::info!(file_name, size = actual, "upload complete");
        Ok(())
    }

    /// Drops the session for `file_name`. Returns `false` if none existed.
    pub fn abort(&self, file_name: &str) -> bool {
        let removed = self.sessions.lock().unwrap().remove(file_name).is_some();
        if removed {
            tracing::info!(file_name, "upload session aborted");
        }
        removed
    }

    /// Current status of the session for `file_name`, if one exists.
    pub fn status(&self, file_name: &str) -> Option<SessionStatus> {
        self.sessions.lock().unwrap().get(file_name).map(|s| s.status())
    }

    /// Number of sessions currently tracked (rejected ones included).
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Deletes every entry under the data directory and clears all
    /// sessions. Returns the number of entries removed.
    ///
    /// Entries that fail to delete are logged and skipped so one stuck
    /// file does not block the rest of the purge.
    pub fn purge(&self) -> Result<u32, TransferError> {
        let mut removed = 0u32;

        let entries = match std::fs::read_dir(&self.data_dir) {
            Ok(entries) => Some(entries),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        if let Some(entries) = entries {
            for entry in entries.flatten() {
                let path = entry.path();
                let result = if path.is_dir() {
                    std::fs::remove_dir_all(&path)
                } else {
                    std::fs::remove_file(&path)
                };
                match result {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to purge entry");
                    }
                }
            }
        }

        self.sessions.lock().unwrap().clear();
        tracing::info!(removed, "purged upload artifacts");
        Ok(removed)
    }
}
