//! PeerFS node command-line interface.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use peerfs_content::{ClusterDirectory, Replication};
use peerfs_files::{DeleteOutcome, FilesError};
use peerfs_types::{ContentId, PeerId};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod context;

use config::AppConfig;
use context::NodeContext;

#[derive(Parser)]
#[command(name = "peerfs")]
#[command(about = "Shared file registry with multi-peer deletion consensus", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Default)]
struct Overrides {
    /// Configuration file (defaults to ./peerfs.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Local peer identity (defaults to the cluster's)
    #[arg(long, global = true)]
    peer_id: Option<String>,
    /// Cluster REST API URL
    #[arg(long, global = true)]
    cluster_api_url: Option<String>,
    /// IPFS gateway URL
    #[arg(long, global = true)]
    gateway_url: Option<String>,
    /// Ledger database directory
    #[arg(long, global = true)]
    ledger_path: Option<PathBuf>,
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// "json" or "pretty"
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file and register it under the local peer
    Upload { path: PathBuf },
    /// Download content to a local path
    Download { cid: String, destination: PathBuf },
    /// Vote to delete content; removed once every publisher agrees
    Delete { cid: String },
    /// List files published by the local peer, or by every cluster peer
    Files {
        #[arg(long)]
        all: bool,
    },
    /// Show the local peer identity
    Id,
    /// List cluster peers
    Peers,
    /// List pinned content
    Pins,
    /// Show per-peer pin status of content
    Status { cid: String },
    /// Pin content with a replication range
    Pin {
        cid: String,
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        min: i32,
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        max: i32,
    },
    /// Manage favorite peers
    Favorites {
        #[command(subcommand)]
        action: FavoriteCommands,
    },
    /// Re-register missing deletion votes for local content
    Repair,
}

#[derive(Subcommand)]
enum FavoriteCommands {
    /// Add or replace a favorite
    Add { peer: String, nickname: String },
    /// Change a favorite's nickname
    Rename { peer: String, nickname: String },
    /// Remove a favorite
    Remove { peer: String },
    /// List favorites
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.overrides.config.as_deref())?;
    apply_overrides(&cli.overrides, &mut config);
    config.validate()?;
    init_logging(&config)?;
    debug!(config_path = ?config.config_path, "configuration loaded");

    let ctx = NodeContext::connect(config).await?;
    let result = run(&ctx, cli.command).await;
    ctx.shutdown()?;
    result
}

fn apply_overrides(overrides: &Overrides, config: &mut AppConfig) {
    if let Some(peer_id) = &overrides.peer_id {
        config.peer_id = Some(peer_id.clone());
    }
    if let Some(url) = &overrides.cluster_api_url {
        config.cluster_api_url = url.clone();
    }
    if let Some(url) = &overrides.gateway_url {
        config.gateway_url = url.clone();
    }
    if let Some(path) = &overrides.ledger_path {
        config.ledger_path = path.clone();
    }
    if let Some(log_level) = &overrides.log_level {
        config.log_level = log_level.clone();
    }
    if let Some(log_format) = &overrides.log_format {
        config.log_format = log_format.clone();
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // Logs go to stderr so command output on stdout stays parseable.
    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

async fn run(ctx: &NodeContext, command: Commands) -> Result<()> {
    let files = &ctx.files;
    match command {
        Commands::Upload { path } => {
            let receipt = files
                .upload(&path)
                .await
                .with_context(|| format!("upload of {} failed", path.display()))?;
            println!("Uploaded {} ({} bytes)", receipt.record.name, receipt.record.size_bytes);
            println!("cid: {}", receipt.cid);
            if receipt.pinned {
                println!("pinned with configured replication");
            }
        }
        Commands::Download { cid, destination } => {
            let cid = parse_cid(&cid)?;
            let written = files.download(&cid, &destination).await?;
            println!("Wrote {written} bytes to {}", destination.display());
        }
        Commands::Delete { cid } => {
            let cid = parse_cid(&cid)?;
            match files.delete(&cid).await {
                Ok(DeleteOutcome::Removed) => println!("{cid} deleted: every publisher agreed"),
                Ok(DeleteOutcome::Pending { waiting_on }) => {
                    println!("Vote recorded; waiting on {} peer(s):", waiting_on.len());
                    for peer in waiting_on {
                        println!("  {peer}");
                    }
                }
                Err(err) => {
                    let stage = err.stage();
                    return Err(anyhow::Error::new(err)
                        .context(format!("delete of {cid} failed at the {stage} stage")));
                }
            }
        }
        Commands::Files { all } => {
            if all {
                print_json(&files.list_all_files().await?)?;
            } else {
                print_json(&files.my_files().await)?;
            }
        }
        Commands::Id => println!("{}", files.local_peer()),
        Commands::Peers => print_json(&ctx.cluster.peers().await?)?,
        Commands::Pins => print_json(&ctx.cluster.pins().await?)?,
        Commands::Status { cid } => {
            let cid = parse_cid(&cid)?;
            print_json(&ctx.cluster.pin_status(&cid).await?)?;
        }
        Commands::Pin { cid, min, max } => {
            let cid = parse_cid(&cid)?;
            ctx.cluster.pin(&cid, Replication { min, max }).await?;
            println!("Pinned {cid} (replication {min}..{max})");
        }
        Commands::Favorites { action } => run_favorites(ctx, action).await?,
        Commands::Repair => {
            let report = files.repair_votes().await?;
            println!("Registered {} missing vote(s)", report.registered.len());
            for cid in &report.registered {
                println!("  {cid}");
            }
            if !report.corrupt.is_empty() {
                println!("Skipped {} corrupt record(s):", report.corrupt.len());
                for cid in &report.corrupt {
                    println!("  {cid}");
                }
            }
        }
    }
    Ok(())
}

async fn run_favorites(ctx: &NodeContext, action: FavoriteCommands) -> Result<()> {
    let favorites = ctx.files.favorites();
    let list = match action {
        FavoriteCommands::Add { peer, nickname } => {
            favorites.add(&parse_peer(&peer)?, &nickname).await?
        }
        FavoriteCommands::Rename { peer, nickname } => {
            favorites.rename(&parse_peer(&peer)?, &nickname).await?
        }
        FavoriteCommands::Remove { peer } => match favorites.remove(&parse_peer(&peer)?).await {
            Ok(list) => list,
            Err(FilesError::UnknownFavorite { peer, current }) => {
                eprintln!("{peer} is not a favorite; list unchanged");
                print_json(&current)?;
                anyhow::bail!("favorite {peer} not found");
            }
            Err(err) => return Err(err.into()),
        },
        FavoriteCommands::List => favorites.list().await?,
    };
    print_json(&list)
}

fn parse_cid(raw: &str) -> Result<ContentId> {
    let cid = ContentId::new(raw.trim());
    cid.validate()?;
    Ok(cid)
}

fn parse_peer(raw: &str) -> Result<PeerId> {
    let peer = PeerId::new(raw.trim());
    peer.validate()?;
    Ok(peer)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
