use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use stowage_server::ServerConfig;

/// Chunked file-upload receiver.
#[derive(Parser, Debug)]
#[command(name = "stowage-server", version)]
struct Args {
    /// TCP port to listen on.
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Directory uploads are written into.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = ServerConfig {
        port: args.port,
        data_dir: args.data_dir,
        ..Default::default()
    };

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            signal.cancel();
        }
    });

    stowage_server::run(config, shutdown).await?;
    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}
