//! `ccom capture`: Store text in the current channel.

use super::{Output, Session, require};
use ccom_core::{InsertOutcome, Metadata, Priority, classify};
use serde_json::{Value, json};

pub async fn run(
    session: &Session,
    out: Output,
    text: Option<String>,
    content_type: Option<String>,
    priority: Option<Priority>,
    tags: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = match text {
        Some(text) => text,
        None => std::io::read_to_string(std::io::stdin())?,
    };

    let metadata = capture_metadata(&text, content_type, priority, tags);
    let stored = require(session.keeper.capture(&session.ctx, &text, metadata).await)?;

    if out.emit_json(&json!({
        "channel": session.ctx.channel,
        "id": stored.map(|s| s.id()),
        "new": stored.is_some_and(|s| s.is_new()),
    }))? {
        return Ok(());
    }

    match stored {
        Some(InsertOutcome::Inserted(id)) => {
            println!("✅ Captured entry #{id} in channel {}", session.ctx.channel)
        }
        Some(InsertOutcome::Duplicate(id)) => {
            println!("ℹ️  Already stored as entry #{id}")
        }
        None => println!("⚠️  Nothing to capture (empty input)"),
    }
    Ok(())
}

/// Metadata carrying the caller's overrides.
///
/// A priority without a type keeps the classifier's type and tags but pins
/// the priority.
fn capture_metadata(
    text: &str,
    content_type: Option<String>,
    priority: Option<Priority>,
    tags: Vec<String>,
) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("source".into(), Value::from("cli"));
    if !tags.is_empty() {
        metadata.insert("tags".into(), json!(tags));
    }

    let content_type = match (content_type, priority) {
        (Some(t), _) => Some(t),
        (None, Some(_)) => {
            let classified = classify(text, &metadata);
            metadata.insert("tags".into(), json!(classified.tags));
            Some(classified.content_type)
        }
        (None, None) => None,
    };

    if let Some(t) = content_type {
        metadata.insert("content_type".into(), Value::from(t));
    }
    if let Some(p) = priority {
        metadata.insert("priority".into(), Value::from(p.as_str()));
    }
    metadata
}
