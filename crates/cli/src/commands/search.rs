//! `ccom recent`, `ccom search`, `ccom tags`, `ccom similar`.

use super::{Output, Session, print_entry, require};
use ccom_core::EntryFilter;

pub async fn recent(
    session: &Session,
    out: Output,
    filter: EntryFilter,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let entries = require(session.keeper.recent(&filter, limit).await)?;
    if out.emit_json(&entries)? {
        return Ok(());
    }

    match &filter.channel {
        Some(channel) => println!("🕑 Recent entries in {channel}"),
        None => println!("🕑 Recent entries (all channels)"),
    }
    println!();
    if entries.is_empty() {
        println!("   No entries yet. Capture some with `ccom capture`.");
    }
    for entry in &entries {
        print_entry(entry);
    }
    Ok(())
}

pub async fn search(
    session: &Session,
    out: Output,
    query: &str,
    filter: EntryFilter,
) -> Result<(), Box<dyn std::error::Error>> {
    let hits = require(session.keeper.search(query, &filter).await)?;
    if out.emit_json(&hits)? {
        return Ok(());
    }

    println!("🔍 Searching for: \"{query}\"");
    println!();
    if hits.is_empty() {
        println!("   No matching entries.");
    }
    for hit in &hits {
        println!("  [score: {:.2}]", hit.relevance);
        print_entry(&hit.entry);
    }
    Ok(())
}

pub async fn tags(
    session: &Session,
    out: Output,
    tags: &[String],
    match_all: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let entries = require(session.keeper.search_by_tags(tags, match_all).await)?;
    if out.emit_json(&entries)? {
        return Ok(());
    }

    let joiner = if match_all { " + " } else { " | " };
    println!("🏷️  Entries tagged {}", tags.join(joiner));
    println!();
    if entries.is_empty() {
        println!("   No entries carry those tags.");
    }
    for entry in &entries {
        print_entry(entry);
    }
    Ok(())
}

pub async fn similar(
    session: &Session,
    out: Output,
    id: i64,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let entries = require(session.keeper.search_similar(id, limit).await)?;
    if out.emit_json(&entries)? {
        return Ok(());
    }

    println!("🔗 Entries similar to #{id}");
    println!();
    if entries.is_empty() {
        println!("   Nothing similar (or no entry #{id}).");
    }
    for entry in &entries {
        print_entry(entry);
    }
    Ok(())
}
