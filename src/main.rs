//! objstore-crud CLI
//!
//! Create, read, update, delete and list JSON records in a bucket.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | OBJSTORE_CRUD_BUCKET | - | Bucket name (required) |
//! | OBJSTORE_CRUD_BACKEND | memory | memory, gcs, or s3 |
//! | OBJSTORE_CRUD_FILENAME_FORMAT | %s.json | Key to object path template |
//! | OBJSTORE_CRUD_CONTENT_TYPE | application/json | MIME type of written objects |
//! | OBJSTORE_CRUD_TIMEOUT_MS | - | Per-call deadline |
//! | OBJSTORE_CRUD_ENDPOINT | - | S3-compatible endpoint URL |
//! | AWS_REGION | - | S3 region |
//! | RUST_LOG | info | Log filter |
//!
//! The memory backend lives only as long as the process.

use clap::Parser;
use objstore_crud::cli::{run, Cli};
use objstore_crud::observability::{init_tracing, LogFormat};
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    if let Err(e) = init_tracing(format) {
        eprintln!("failed to initialize tracing: {}", e);
        return ExitCode::FAILURE;
    }

    let mut stdout = std::io::stdout().lock();
    match run(cli, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
