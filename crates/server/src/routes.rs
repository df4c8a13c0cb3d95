use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

use stowage_protocol::constants::{CANCEL_PATH, HEALTH_PATH, PURGE_PATH, UPLOAD_PATH};
use stowage_transfer::{ChunkWriter, SessionRegistry};

use crate::config::ServerConfig;
use crate::handlers;

/// Shared state injected into every handler.
///
/// The registry is the only synchronized resource; the writer is stateless
/// apart from its root directory.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub writer: Arc<ChunkWriter>,
}

impl AppState {
    /// Builds state rooted at the configured data directory.
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new(&config.data_dir)),
            writer: Arc::new(ChunkWriter::new(&config.data_dir)),
        }
    }
}

/// Composes the upload router.
pub fn build_app(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(UPLOAD_PATH, post(handlers::upload))
        .route(PURGE_PATH, get(handlers::purge))
        .route(CANCEL_PATH, post(handlers::cancel))
        .route(HEALTH_PATH, get(handlers::health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use stowage_protocol::{ErrorKind, ErrorResponse, UploadAck};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "stowage-test-boundary";

    fn test_app(dir: &TempDir) -> Router {
        let config = ServerConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        build_app(AppState::new(&config), config.max_body_bytes)
    }

    /// Builds a multipart upload body by hand.
    fn multipart_body(fields: &[(&str, &str)], payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"blob\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(fields: &[(&str, &str)], payload: &[u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(UPLOAD_PATH)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(fields, payload)))
            .unwrap()
    }

    fn chunk_fields<'a>(
        index: &'a str,
        offset: &'a str,
        total: &'a str,
        size: &'a str,
    ) -> Vec<(&'a str, &'a str)> {
        vec![
            ("file_name", "upload.bin"),
            ("chunk_index", index),
            ("chunk_byte_offset", offset),
            ("total_chunks", total),
            ("file_size", size),
        ]
    }

    async fn response_json<T: serde::de::DeserializeOwned>(
        response: axum::response::Response,
    ) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(HEALTH_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn single_chunk_upload_lands_on_disk() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let response = app
            .oneshot(upload_request(
                &chunk_fields("0", "0", "1", "5"),
                b"hello",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let ack: UploadAck = response_json(response).await;
        assert_eq!(ack.message, "Chunk #0 upload successful for upload.bin");
        assert_eq!(
            std::fs::read(dir.path().join("upload.bin")).unwrap(),
            b"hello"
        );
    }

    #[tokio::test]
    async fn chunk_for_existing_file_conflicts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("upload.bin"), b"already here").unwrap();
        let app = test_app(&dir);

        let response = app
            .oneshot(upload_request(
                &chunk_fields("0", "0", "1", "5"),
                b"hello",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let err: ErrorResponse = response_json(response).await;
        assert_eq!(err.kind, ErrorKind::AlreadyExists);
        // Nothing was written over the existing file.
        assert_eq!(
            std::fs::read(dir.path().join("upload.bin")).unwrap(),
            b"already here"
        );
    }

    #[tokio::test]
    async fn misdeclared_chunk_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        // Final chunk claims to end at byte 5 of a 9-byte file.
        let response = app
            .oneshot(upload_request(
                &chunk_fields("0", "0", "1", "9"),
                b"hello",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let err: ErrorResponse = response_json(response).await;
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
        assert!(!dir.path().join("upload.bin").exists());
    }

    #[tokio::test]
    async fn missing_field_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let response = app
            .oneshot(upload_request(&[("file_name", "upload.bin")], b"hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn purge_resets_everything() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let response = app
            .clone()
            .oneshot(upload_request(
                &chunk_fields("0", "0", "1", "5"),
                b"hello",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(PURGE_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!dir.path().join("upload.bin").exists());

        // The same name uploads cleanly again.
        let response = app
            .oneshot(upload_request(
                &chunk_fields("0", "0", "1", "5"),
                b"fresh",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cancel_drops_partial_upload() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        // First of two chunks.
        let response = app
            .clone()
            .oneshot(upload_request(
                &chunk_fields("0", "0", "2", "8"),
                b"AAAA",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(CANCEL_PATH)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"fileName":"upload.bin"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!dir.path().join("upload.bin").exists());

        // The upload can start over.
        let response = app
            .oneshot(upload_request(
                &chunk_fields("0", "0", "2", "8"),
                b"BBBB",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
