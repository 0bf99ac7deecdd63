//! Keyword classification of captured output.
//!
//! Decides a content type, priority, and tag set for a blob of text. The
//! keyword groups are tested in order and the first match wins.

use crate::entry::{Metadata, Priority};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content type for text that matches no keyword group.
pub const DEFAULT_CONTENT_TYPE: &str = "ccom_output";

const TITLE_MAX_CHARS: usize = 100;

struct KeywordGroup {
    content_type: &'static str,
    tag: &'static str,
    priority: Priority,
    keywords: &'static [&'static str],
}

const GROUPS: &[KeywordGroup] = &[
    KeywordGroup {
        content_type: "evaluation",
        tag: "evaluation",
        priority: Priority::High,
        keywords: &[
            "evaluation",
            "evaluate",
            "assessment",
            "recommendation",
            "findings",
            "analysis complete",
        ],
    },
    KeywordGroup {
        content_type: "security_analysis",
        tag: "security",
        priority: Priority::High,
        keywords: &[
            "security",
            "vulnerability",
            "vulnerabilities",
            "cve-",
            "exploit",
            "npm audit",
            "xss",
            "injection",
        ],
    },
    KeywordGroup {
        content_type: "deployment",
        tag: "deployment",
        priority: Priority::Normal,
        keywords: &["deploy", "deployment", "release", "production", "build succeeded", "build failed"],
    },
    KeywordGroup {
        content_type: "quality_check",
        tag: "quality",
        priority: Priority::Normal,
        keywords: &["lint", "eslint", "prettier", "code quality", "type check", "test coverage"],
    },
];

/// What the classifier decided for one blob of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub content_type: String,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub title: String,
}

/// Classify `text`. A `content_type` key in `metadata` overrides keyword
/// matching; its `priority` and `tags` keys are then used as given.
pub fn classify(text: &str, metadata: &Metadata) -> Classification {
    let title = derive_title(text);

    if let Some(content_type) = metadata.get("content_type").and_then(Value::as_str) {
        let priority = metadata
            .get("priority")
            .and_then(Value::as_str)
            .map(Priority::parse_lenient)
            .unwrap_or_default();
        return Classification {
            content_type: content_type.to_string(),
            priority,
            tags: metadata_tags(metadata),
            title,
        };
    }

    let lower = text.to_lowercase();
    let matched = GROUPS
        .iter()
        .find(|group| group.keywords.iter().any(|kw| lower.contains(kw)));

    match matched {
        Some(group) => {
            let mut tags = metadata_tags(metadata);
            if !tags.iter().any(|t| t == group.tag) {
                tags.push(group.tag.to_string());
            }
            let priority = if lower.contains("critical") {
                Priority::Critical
            } else {
                group.priority
            };
            Classification {
                content_type: group.content_type.to_string(),
                priority,
                tags,
                title,
            }
        }
        None => Classification {
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            priority: Priority::Normal,
            tags: metadata_tags(metadata),
            title,
        },
    }
}

/// First non-empty line, capped at 100 characters.
pub fn derive_title(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(TITLE_MAX_CHARS).collect())
        .unwrap_or_default()
}

/// Tags supplied by the caller, as an array or a comma-separated string.
fn metadata_tags(metadata: &Metadata) -> Vec<String> {
    match metadata.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
