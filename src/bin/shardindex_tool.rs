use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde_json::json;
use shardindex::{
    ClusterSpec, ErrorKind, ErrorRecord, IndexError, UpdateCommand, UpdateParams,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "shardindex-tool")]
#[command(about = "Developer tooling for ShardIndex tolerant batch writes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a batch to one node of a simulated cluster.
    Run {
        #[arg(long)]
        cluster: PathBuf,
        #[arg(long)]
        batch: PathBuf,
        #[arg(long)]
        node: String,
        #[arg(long, allow_hyphen_values = true)]
        max_errors: Option<i64>,
        #[arg(long)]
        route: Option<String>,
        #[arg(long)]
        not_tolerant: bool,
    },
    /// Print the failure-metadata entry for an error record.
    EncodeRecord {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        id: String,
        #[arg(long, default_value = "")]
        message: String,
    },
    /// Decode a failure-metadata key (and optional value) into an error record.
    DecodeKey {
        key: String,
        #[arg(long, default_value = "")]
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            cluster,
            batch,
            node,
            max_errors,
            route,
            not_tolerant,
        } => {
            let mut params = UpdateParams::default();
            if let Some(max_errors) = max_errors {
                params = params.max_errors(max_errors);
            }
            if let Some(route) = route {
                params = params.route(route);
            }
            if not_tolerant {
                params = params.not_tolerant();
            }
            run_batch_file(&cluster, &batch, &node, params).await
        }
        Command::EncodeRecord { kind, id, message } => encode_record(&kind, &id, &message),
        Command::DecodeKey { key, value } => decode_key(&key, &value),
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in '{}'", path.display()))
}

async fn run_batch_file(
    cluster_path: &Path,
    batch_path: &Path,
    node: &str,
    params: UpdateParams,
) -> Result<()> {
    let spec = ClusterSpec::from_json(read_json(cluster_path)?)
        .with_context(|| format!("Failed to load cluster spec '{}'", cluster_path.display()))?;
    let commands: Vec<UpdateCommand> = serde_json::from_value(read_json(batch_path)?)
        .with_context(|| format!("Invalid update batch '{}'", batch_path.display()))?;

    let cluster = spec.build().await.context("Failed to start cluster")?;
    let rsp = cluster.submit(node, commands, params).await?;

    println!("{}", serde_json::to_string_pretty(&rsp.header.to_json())?);
    for node_id in cluster.node_ids() {
        let ids = cluster.indexed_ids(&node_id).await?;
        println!("{}: {}", node_id, ids.join(","));
    }

    match rsp.error {
        None => Ok(()),
        Some(err) => {
            if let IndexError::Update(failure) = &err {
                for (key, value) in failure.metadata.iter() {
                    eprintln!("  {} => {}", key, value);
                }
            }
            Err(anyhow!(
                "batch failed with status {}: {}",
                err.code().http_status(),
                err
            ))
        }
    }
}

fn encode_record(kind: &str, id: &str, message: &str) -> Result<()> {
    let kind = ErrorKind::parse(kind).ok_or_else(|| {
        anyhow!(
            "Unknown command kind '{}'; expected ADD, DELETE_BY_ID or DELETE_BY_QUERY",
            kind
        )
    })?;
    let record = ErrorRecord::new(kind, id, message);
    let entry = json!({
        "key": record.metadata_key(),
        "value": record.metadata_value(),
    });
    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}

fn decode_key(key: &str, value: &str) -> Result<()> {
    match ErrorRecord::parse_metadata(key, value)? {
        Some(record) => {
            let entry = json!({
                "type": record.kind().as_str(),
                "id": record.id(),
                "message": record.message(),
            });
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        None => println!("'{}' is not a tolerant error metadata key", key),
    }
    Ok(())
}
