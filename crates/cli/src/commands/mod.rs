//! Subcommand implementations and the helpers they share.

pub mod capture;
pub mod channel;
pub mod checkpoint;
pub mod config_cmd;
pub mod maintain;
pub mod search;
pub mod status;

use ccom_config::AppConfig;
use ccom_core::entry::truncate_chars;
use ccom_core::{ContextEntry, EntryFilter, Outcome, Priority, SessionContext};
use ccom_memory::ContextKeeper;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// How results are printed.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    /// Print `value` as pretty JSON when JSON output was requested.
    /// Returns whether it did.
    pub fn emit_json<T: Serialize>(&self, value: &T) -> Result<bool, Box<dyn std::error::Error>> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Ok(self.json)
    }
}

/// An opened store plus the context commands act on.
pub struct Session {
    pub root: PathBuf,
    pub keeper: ContextKeeper,
    pub ctx: SessionContext,
}

impl Session {
    pub async fn open(
        root: &Path,
        channel: Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let config = AppConfig::load(root).map_err(|e| format!("Failed to load config: {e}"))?;
        let keeper = ContextKeeper::open(root, config).await;
        let ctx = keeper.context_for(root);
        let ctx = match channel {
            Some(name) => ctx.with_channel(name),
            None => ctx,
        };
        tracing::debug!(
            session = %ctx.session_id,
            channel = %ctx.channel,
            "Opened {}",
            keeper.database_path().display()
        );

        Ok(Self {
            root: root.to_path_buf(),
            keeper,
            ctx,
        })
    }

    /// Listing filter scoped to the current channel unless `all_channels`.
    pub fn filter(
        &self,
        all_channels: bool,
        priority: Option<Priority>,
        content_type: Option<String>,
        git_branch: Option<String>,
    ) -> EntryFilter {
        EntryFilter {
            channel: (!all_channels).then(|| self.ctx.channel.clone()),
            priority,
            content_type,
            git_branch,
            since: None,
        }
    }
}

/// Record `channel` as `[capture].default_channel` in the project config so
/// later invocations start on it. Returns the config file path.
pub fn remember_channel(root: &Path, channel: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir(root).join("config.toml");
    let mut config =
        AppConfig::load_from(&config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    config.capture.default_channel = Some(channel.to_string());
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config_path, toml::to_string_pretty(&config)?)?;
    Ok(config_path)
}

/// Unwrap an outcome, turning a recorded failure into an error.
pub fn require<T>(outcome: Outcome<T>) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(failure) = outcome.failure() {
        return Err(failure.clone().into());
    }
    Ok(outcome.into_value())
}

/// One-entry summary: header line, first content line, tags.
pub fn print_entry(entry: &ContextEntry) {
    println!(
        "  #{:<5} {}  [{}] {} ({})",
        entry.id,
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        entry.channel,
        entry.content_type,
        entry.priority
    );
    let first_line = entry.content.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    println!("         {}", truncate_chars(first_line.trim(), 100));
    if !entry.tags.is_empty() {
        println!("         tags: {}", entry.tags.join(", "));
    }
}
