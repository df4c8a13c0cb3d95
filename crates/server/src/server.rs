use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::ServerError;
use crate::config::ServerConfig;
use crate::routes::{AppState, build_app};

/// Binds the configured port and serves until `shutdown` fires.
pub async fn run(config: ServerConfig, shutdown: CancellationToken) -> Result<(), ServerError> {
    let addr: std::net::SocketAddr = ([0, 0, 0, 0], config.port).into();
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, config, shutdown).await
}

/// Serves on an already-bound listener.
///
/// Split out from [`run`] so tests (and embedders) can bind port 0 and
/// read the assigned address before starting the server.
pub async fn serve_on(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    std::fs::create_dir_all(&config.data_dir)?;

    let local_addr = listener.local_addr()?;
    let app = build_app(AppState::new(&config), config.max_body_bytes);
    tracing::info!(
        %local_addr,
        data_dir = %config.data_dir.display(),
        "upload server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("server shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn serve_on_binds_and_shuts_down() {
        let dir = TempDir::new().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.port() > 0);

        let config = ServerConfig {
            data_dir: dir.path().join("data"),
            ..Default::default()
        };
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(serve_on(listener, config.clone(), shutdown.clone()));

        // Data directory is created at startup.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(config.data_dir.is_dir());

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }
}
