//! Command line interface
//!
//! Argument parsing and command execution for the `objstore-crud` binary.
//! Records are arbitrary JSON values.

use crate::client::BucketClient;
use crate::crud::CrudStore;
use crate::storage::StoreConfig;
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "objstore-crud")]
#[command(about = "Typed CRUD records in a cloud object store bucket")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file (default: read from environment)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Store a new record, failing if the key exists
    Create {
        key: String,
        /// Record as JSON
        value: String,
    },

    /// Print a record
    Get { key: String },

    /// Replace a record unless it changed concurrently
    Put {
        key: String,
        /// Record as JSON
        value: String,
    },

    /// Remove a record
    Delete { key: String },

    /// List keys
    List {
        /// Only keys starting with this prefix
        #[arg(default_value = "")]
        prefix: String,
    },
}

pub type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

fn load_config(path: Option<&PathBuf>) -> CliResult<StoreConfig> {
    let config = match path {
        Some(path) => StoreConfig::from_file(path)?,
        None => StoreConfig::from_env()?,
    };
    Ok(config)
}

/// Load configuration, connect and execute the parsed command
pub async fn run(cli: Cli, out: &mut impl Write) -> CliResult<()> {
    let config = load_config(cli.config.as_ref())?;
    let client = BucketClient::from_config(&config).await?;
    execute(&client, cli.command, out).await
}

/// Execute one command against `client`, writing results to `out`
pub async fn execute(
    client: &BucketClient,
    command: Commands,
    out: &mut impl Write,
) -> CliResult<()> {
    let store: CrudStore<Value> = CrudStore::new(client.clone());

    match command {
        Commands::Create { key, value } => {
            let value: Value = serde_json::from_str(&value)?;
            store.create(&key, &value).await?;
        }
        Commands::Get { key } => {
            let value = store.get(&key).await?;
            writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
        }
        Commands::Put { key, value } => {
            let value: Value = serde_json::from_str(&value)?;
            store.put(&key, &value).await?;
        }
        Commands::Delete { key } => {
            store.delete(&key).await?;
        }
        Commands::List { prefix } => {
            let mut keys = store.keys(&prefix);
            while let Some(key) = keys.try_next().await? {
                writeln!(out, "{}", key)?;
            }
        }
    }

    Ok(())
}
