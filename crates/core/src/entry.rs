//! Context entries, channels, checkpoints: the persisted domain model.
//!
//! An entry is one captured unit of text (an evaluation, a lint summary, a
//! note). Entries live in channels, which are usually one per git branch.
//! A checkpoint is a named snapshot of one channel.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Open key-value metadata attached to entries, channels, and checkpoints.
pub type Metadata = Map<String, Value>;

/// Importance of an entry. Stored as its lowercase name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    /// Parse a stored priority, falling back to `normal` for unknown values.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| {
            tracing::debug!("Unknown priority '{s}', treating as normal");
            Priority::Normal
        })
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority '{other}' (expected low|normal|high|critical)")),
        }
    }
}

/// A stored context entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub channel: String,
    pub content_type: String,
    pub priority: Priority,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub content_hash: String,
}

impl ContextEntry {
    /// A copy of this entry with its content cut to `max_chars` for display.
    pub fn preview(&self, max_chars: usize) -> Self {
        Self {
            content: truncate_chars(&self.content, max_chars),
            ..self.clone()
        }
    }
}

/// An entry waiting to be inserted. The store assigns id and hash.
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub content: String,
    pub content_type: String,
    pub priority: Priority,
    pub metadata: Metadata,
    pub tags: Vec<String>,
    /// Creation instant; `None` means "now".
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewEntry {
    pub fn new(content: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: content_type.into(),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Result of an insert: a new row, or the id of the row already holding
/// identical content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    Duplicate(i64),
}

impl InsertOutcome {
    pub fn id(&self) -> i64 {
        match self {
            InsertOutcome::Inserted(id) | InsertOutcome::Duplicate(id) => *id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// A search hit with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub entry: ContextEntry,
    pub relevance: f64,
}

/// Structural constraints shared by listing and search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    /// Only entries at or after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

impl EntryFilter {
    pub fn channel(name: impl Into<String>) -> Self {
        Self {
            channel: Some(name.into()),
            ..Self::default()
        }
    }
}

/// A named partition of entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub priority: Priority,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

/// Aggregate counts over the whole store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_entries: i64,
    pub total_channels: i64,
    pub total_checkpoints: i64,
    #[serde(default)]
    pub by_channel: BTreeMap<String, i64>,
    #[serde(default)]
    pub by_content_type: BTreeMap<String, i64>,
    #[serde(default)]
    pub by_priority: BTreeMap<String, i64>,
    #[serde(default)]
    pub database_size_bytes: i64,
}

/// The serialized body of a checkpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointSnapshot {
    #[serde(default)]
    pub entries: Vec<ContextEntry>,
    #[serde(default)]
    pub channels: Vec<ChannelRecord>,
    #[serde(default)]
    pub stats: StoreStats,
}

/// A checkpoint row without its snapshot body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub name: String,
    pub channel: String,
    pub session_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

/// A full checkpoint as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(flatten)]
    pub summary: CheckpointSummary,
    pub snapshot: CheckpointSnapshot,
}

/// How near-duplicate pairs are turned into merge groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingPolicy {
    /// Union-find over the similarity graph. Order independent.
    #[default]
    Connected,
    /// Each ungrouped entry claims every later ungrouped entry similar to
    /// it. Depends on iteration order when similarity is not transitive.
    SinglePass,
}

impl FromStr for GroupingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "connected" => Ok(GroupingPolicy::Connected),
            "single_pass" => Ok(GroupingPolicy::SinglePass),
            other => Err(format!("unknown grouping policy '{other}' (expected connected|single_pass)")),
        }
    }
}

/// Cut `s` to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
        None => s.to_string(),
    }
}

/// The canonical on-disk timestamp form: RFC 3339, UTC, microseconds.
///
/// Fixed width, so lexical order in SQL matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(" critical ".parse::<Priority>().unwrap(), Priority::Critical);
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(Priority::parse_lenient("urgent"), Priority::Normal);
    }

    #[test]
    fn priority_serializes_lowercase() {
        let json = serde_json::to_string(&Priority::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exact", 5), "exact");
    }

    #[test]
    fn timestamps_sort_lexically() {
        let earlier = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        assert!(format_timestamp(&earlier) < format_timestamp(&later));
        assert_eq!(parse_timestamp(&format_timestamp(&later)), Some(later));
    }

    #[test]
    fn grouping_policy_accepts_dashes() {
        assert_eq!("single-pass".parse::<GroupingPolicy>().unwrap(), GroupingPolicy::SinglePass);
        assert_eq!(GroupingPolicy::default(), GroupingPolicy::Connected);
    }

    #[test]
    fn preview_keeps_everything_but_content() {
        let entry = ContextEntry {
            id: 7,
            timestamp: Utc::now(),
            session_id: "s".into(),
            channel: "main".into(),
            content_type: "note".into(),
            priority: Priority::High,
            content: "x".repeat(500),
            metadata: Metadata::new(),
            tags: vec!["a".into()],
            git_branch: Some("main".into()),
            project_name: None,
            content_hash: "abc".into(),
        };
        let preview = entry.preview(400);
        assert_eq!(preview.content.chars().count(), 403);
        assert_eq!(preview.id, 7);
        assert_eq!(preview.tags, entry.tags);
    }
}
