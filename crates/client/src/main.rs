use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use stowage_client::{Uploader, human_bytes};
use stowage_protocol::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_WINDOW};

/// Chunked file-upload client.
#[derive(Parser, Debug)]
#[command(name = "stowage-client", version)]
struct Args {
    /// Files to upload.
    #[arg(required_unless_present = "purge")]
    files: Vec<PathBuf>,

    /// Server base URL.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    url: String,

    /// Chunk size in bytes.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,

    /// Maximum chunk requests in flight per file.
    #[arg(long, default_value_t = DEFAULT_WINDOW)]
    window: usize,

    /// Purge the server before uploading (or on its own, with no files).
    #[arg(long)]
    purge: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let uploader = Uploader::new(&args.url)
        .with_chunk_size(args.chunk_size)
        .with_window(args.window);

    if args.purge {
        let removed = uploader.purge().await?;
        tracing::info!(removed, "server purged");
    }
    if args.files.is_empty() {
        return Ok(());
    }

    let results = uploader.upload_many(&args.files).await;

    let mut failures = 0usize;
    for (path, result) in args.files.iter().zip(results) {
        match result {
            Ok(report) => {
                println!(
                    "{}: {} in {} chunks, {:.2?}",
                    report.file_name,
                    human_bytes(report.file_size),
                    report.total_chunks,
                    report.duration
                );
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {e}", path.display());
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} uploads failed", args.files.len());
    }
    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}
