use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tokio::task::spawn_blocking;

use stowage_protocol::constants::{
    CANCEL_PATH, DEFAULT_CHUNK_SIZE, DEFAULT_WINDOW, FIELD_CHUNK_INDEX, FIELD_CHUNK_OFFSET,
    FIELD_FILE, FIELD_FILE_NAME, FIELD_FILE_SIZE, FIELD_TOTAL_CHUNKS, PURGE_PATH, UPLOAD_PATH,
};
use stowage_protocol::{CancelRequest, ErrorResponse, PurgeResponse};
use stowage_transfer::{Chunk, ChunkPlan, ChunkReader, TransferError};

use crate::ClientError;
use crate::dispatcher::BoundedDispatcher;
use crate::stats::{human_bytes, timed};

/// Summary of one finished upload.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub file_name: String,
    pub file_size: u64,
    pub total_chunks: u64,
    pub duration: Duration,
}

/// Chunked-upload client.
///
/// Cheap to clone; clones share the underlying HTTP connection pool.
#[derive(Clone)]
pub struct Uploader {
    http: reqwest::Client,
    base_url: String,
    chunk_size: u64,
    window: usize,
}

impl Uploader {
    /// Creates an uploader for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            window: DEFAULT_WINDOW,
        }
    }

    /// Overrides the chunk size (0 keeps the default).
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    /// Overrides the in-flight request window.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Uploads one file, keeping at most `window` chunk requests in
    /// flight.
    ///
    /// On the first failed chunk the remaining requests are cancelled, a
    /// best-effort server-side cancel is sent, and the failure is
    /// returned.
    pub async fn upload_file(&self, path: &Path) -> Result<UploadReport, ClientError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ClientError::Transfer(TransferError::InvalidFileName(path.display().to_string()))
            })?;

        let reader = {
            let path = path.to_path_buf();
            let chunk_size = self.chunk_size;
            spawn_blocking(move || ChunkReader::open(&path, chunk_size))
                .await
                .map_err(|e| ClientError::TaskJoin(e.to_string()))??
        };
        let plan = reader.plan();

        tracing::debug!(
            file_name = %file_name,
            size = plan.file_size(),
            total_chunks = plan.total_chunks(),
            window = self.window,
            "starting upload"
        );

        let (result, duration) = timed(self.send_chunks(reader, &file_name)).await;
        match result {
            Ok(()) => {
                tracing::info!(
                    file_name = %file_name,
                    size = %human_bytes(plan.file_size()),
                    elapsed_ms = duration.as_millis() as u64,
                    "upload complete"
                );
                Ok(UploadReport {
                    file_name,
                    file_size: plan.file_size(),
                    total_chunks: plan.total_chunks(),
                    duration,
                })
            }
            Err(e) => {
                tracing::warn!(file_name = %file_name, error = %e, "upload failed");
                self.cancel_remote(&file_name).await;
                Err(e)
            }
        }
    }

    /// Uploads several files concurrently, one task per file. Results are
    /// returned in input order.
    pub async fn upload_many(&self, paths: &[PathBuf]) -> Vec<Result<UploadReport, ClientError>> {
        let handles: Vec<_> = paths
            .iter()
            .map(|path| {
                let uploader = self.clone();
                let path = path.clone();
                tokio::spawn(async move { uploader.upload_file(&path).await })
            })
            .collect();

        futures_util::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) => Err(ClientError::TaskJoin(e.to_string())),
            })
            .collect()
    }

    /// Asks the server to delete all uploads and reset session state.
    pub async fn purge(&self) -> Result<u32, ClientError> {
        let url = format!("{}{PURGE_PATH}", self.base_url);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        let purged: PurgeResponse = response.json().await?;
        Ok(purged.removed)
    }

    async fn send_chunks(
        &self,
        mut reader: ChunkReader,
        file_name: &str,
    ) -> Result<(), ClientError> {
        let plan = reader.plan();
        let mut dispatcher = BoundedDispatcher::new(self.window);

        loop {
            // The reader owns a file handle, so reads hop through
            // spawn_blocking and hand the reader back with each chunk.
            let (returned, chunk) = spawn_blocking({
                let mut r = reader;
                move || {
                    let chunk = r.next_chunk();
                    (r, chunk)
                }
            })
            .await
            .map_err(|e| ClientError::TaskJoin(e.to_string()))?;
            reader = returned;

            let Some(chunk) = chunk? else {
                break;
            };
            let index = chunk.index;
            let request = send_chunk(
                self.http.clone(),
                format!("{}{UPLOAD_PATH}", self.base_url),
                file_name.to_string(),
                plan,
                chunk,
            );
            dispatcher.submit(index, request).await?;
        }

        dispatcher.drain().await
    }

    /// Best-effort server-side cancel after a failed transfer. The server
    /// may already have accepted chunks that cannot be unsent; this clears
    /// its session and partial file so a retry can start clean.
    async fn cancel_remote(&self, file_name: &str) {
        let url = format!("{}{CANCEL_PATH}", self.base_url);
        let body = CancelRequest {
            file_name: file_name.to_string(),
        };
        if let Err(e) = self.http.post(&url).json(&body).send().await {
            tracing::warn!(file_name, error = %e, "cancel request failed");
        }
    }
}

/// POSTs one chunk as a multipart form.
///
/// Takes everything by value: the returned future owns its payload buffer
/// and stays independent of the read loop that produced the chunk.
async fn send_chunk(
    http: reqwest::Client,
    url: String,
    file_name: String,
    plan: ChunkPlan,
    chunk: Chunk,
) -> Result<(), ClientError> {
    let index = chunk.index;
    let form = Form::new()
        .text(FIELD_FILE_NAME, file_name.clone())
        .text(FIELD_CHUNK_INDEX, index.to_string())
        .text(FIELD_CHUNK_OFFSET, chunk.offset.to_string())
        .text(FIELD_TOTAL_CHUNKS, plan.total_chunks().to_string())
        .text(FIELD_FILE_SIZE, plan.file_size().to_string())
        .part(FIELD_FILE, Part::bytes(chunk.data).file_name(file_name));

    let response = http.post(&url).multipart(form).send().await?;
    let status = response.status();
    if status.is_success() {
        tracing::debug!(chunk_index = index, "chunk acknowledged");
        return Ok(());
    }

    let decoded: Option<ErrorResponse> = response.json().await.ok();
    Err(ClientError::Chunk {
        index,
        kind: decoded.as_ref().map(|e| e.kind),
        message: decoded
            .map(|e| e.message)
            .unwrap_or_else(|| format!("HTTP status {status}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let uploader = Uploader::new("http://127.0.0.1:8000/");
        assert_eq!(uploader.base_url, "http://127.0.0.1:8000");
    }

    #[test]
    fn builder_overrides() {
        let uploader = Uploader::new("http://localhost")
            .with_chunk_size(4096)
            .with_window(5);
        assert_eq!(uploader.chunk_size, 4096);
        assert_eq!(uploader.window, 5);

        // Zero values keep sane settings.
        let uploader = Uploader::new("http://localhost")
            .with_chunk_size(0)
            .with_window(0);
        assert_eq!(uploader.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(uploader.window, 1);
    }

    #[tokio::test]
    async fn upload_of_directory_path_fails_fast() {
        let result = Uploader::new("http://localhost")
            .upload_file(Path::new("/"))
            .await;
        assert!(matches!(result, Err(ClientError::Transfer(_))));
    }
}
