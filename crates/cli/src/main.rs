//! CCOM CLI: the main entry point.
//!
//! Commands:
//! - `capture`    : Store text (argument or stdin) in the current channel
//! - `recent`     : List the newest entries
//! - `search`     : Ranked keyword search with time phrases
//! - `tags`       : Entries carrying given tags
//! - `similar`    : Entries resembling a given entry
//! - `dedupe`     : Remove exact duplicates
//! - `consolidate`: Merge near duplicates
//! - `checkpoint` : Save, restore, list, and delete snapshots
//! - `channel`    : List or switch channels
//! - `status`     : Show store statistics
//! - `config`     : Inspect configuration

use ccom_core::{GroupingPolicy, Priority};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "ccom",
    about = "CCOM: persistent project context for coding sessions",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root (default: current directory)
    #[arg(long, global = true, env = "CCOM_PROJECT")]
    project: Option<PathBuf>,

    /// Act on this channel instead of the branch-derived one
    #[arg(long, global = true)]
    channel: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store text in the current channel (reads stdin when TEXT is omitted)
    Capture {
        text: Option<String>,

        /// Content type, skipping auto-classification
        #[arg(long = "type")]
        content_type: Option<String>,

        #[arg(long)]
        priority: Option<Priority>,

        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List the newest entries
    Recent {
        #[arg(long)]
        priority: Option<Priority>,

        #[arg(long = "type")]
        content_type: Option<String>,

        #[arg(long)]
        branch: Option<String>,

        /// Include every channel
        #[arg(long)]
        all_channels: bool,

        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },

    /// Search entries, e.g. "deploy errors from yesterday"
    Search {
        query: String,

        #[arg(long = "type")]
        content_type: Option<String>,

        #[arg(long)]
        priority: Option<Priority>,

        /// Include every channel
        #[arg(long)]
        all_channels: bool,
    },

    /// Entries carrying any of the given tags
    Tags {
        #[arg(required = true)]
        tags: Vec<String>,

        /// Require every tag
        #[arg(long)]
        all: bool,
    },

    /// Entries resembling entry ID
    Similar {
        id: i64,

        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Remove entries whose content duplicates a newer entry
    Dedupe,

    /// Merge near-duplicate entries
    Consolidate {
        /// Minimum similarity, 0.0 to 1.2
        #[arg(long)]
        threshold: Option<f64>,

        /// connected | single_pass
        #[arg(long)]
        policy: Option<GroupingPolicy>,
    },

    /// Manage checkpoints
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },

    /// Manage channels
    Channel {
        #[command(subcommand)]
        action: ChannelAction,
    },

    /// Show store statistics
    Status,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// Snapshot the current channel
    Save {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Restore a checkpoint and report its contents
    Restore { name: String },

    /// List checkpoints, newest first
    List,

    /// Delete a checkpoint
    Delete { name: String },

    /// Save a checkpoint if the store has grown past the threshold
    Auto {
        #[arg(long)]
        threshold: Option<i64>,
    },
}

#[derive(Subcommand)]
enum ChannelAction {
    /// List channels, most recently used first
    List,

    /// Make NAME the default channel for this project
    Switch {
        name: String,

        #[arg(short, long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Print the config file location
    Path,

    /// Check the config file
    Validate,

    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = match cli.project {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let out = commands::Output { json: cli.json };

    // Config commands work without opening the store.
    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show => commands::config_cmd::show(&root).await,
            ConfigAction::Path => commands::config_cmd::path(&root).await,
            ConfigAction::Validate => commands::config_cmd::validate(&root).await,
            ConfigAction::Init => commands::config_cmd::init(&root).await,
        };
    }

    let session = commands::Session::open(&root, cli.channel).await?;

    match cli.command {
        Commands::Capture {
            text,
            content_type,
            priority,
            tags,
        } => commands::capture::run(&session, out, text, content_type, priority, tags).await?,
        Commands::Recent {
            priority,
            content_type,
            branch,
            all_channels,
            limit,
        } => {
            let filter = session.filter(all_channels, priority, content_type, branch);
            commands::search::recent(&session, out, filter, limit).await?
        }
        Commands::Search {
            query,
            content_type,
            priority,
            all_channels,
        } => {
            let filter = session.filter(all_channels, priority, content_type, None);
            commands::search::search(&session, out, &query, filter).await?
        }
        Commands::Tags { tags, all } => commands::search::tags(&session, out, &tags, all).await?,
        Commands::Similar { id, limit } => {
            commands::search::similar(&session, out, id, limit).await?
        }
        Commands::Dedupe => commands::maintain::dedupe(&session, out).await?,
        Commands::Consolidate { threshold, policy } => {
            commands::maintain::consolidate(&session, out, threshold, policy).await?
        }
        Commands::Checkpoint { action } => match action {
            CheckpointAction::Save { name, description } => {
                commands::checkpoint::save(&session, out, &name, &description).await?
            }
            CheckpointAction::Restore { name } => {
                commands::checkpoint::restore(&session, out, &name).await?
            }
            CheckpointAction::List => commands::checkpoint::list(&session, out).await?,
            CheckpointAction::Delete { name } => {
                commands::checkpoint::delete(&session, &name).await?
            }
            CheckpointAction::Auto { threshold } => {
                commands::checkpoint::auto(&session, threshold).await?
            }
        },
        Commands::Channel { action } => match action {
            ChannelAction::List => commands::channel::list(&session, out).await?,
            ChannelAction::Switch { name, description } => {
                commands::channel::switch(&session, &name, description.as_deref()).await?
            }
        },
        Commands::Status => commands::status::run(&session, out).await?,
        Commands::Config { .. } => {}
    }

    Ok(())
}
