//! `ccom status`: Show store status.

use super::{Output, Session, require};
use serde_json::json;

pub async fn run(session: &Session, out: Output) -> Result<(), Box<dyn std::error::Error>> {
    let keeper = &session.keeper;
    let ctx = &session.ctx;

    if let Some(reason) = keeper.unavailable_reason() {
        println!("❌ Context store unavailable: {reason}");
        return Err(reason.clone().into());
    }

    let stats = require(keeper.stats().await)?;
    if out.emit_json(&json!({
        "database": keeper.database_path(),
        "channel": ctx.channel,
        "git_branch": ctx.git_branch,
        "session_id": ctx.session_id,
        "stats": stats,
    }))? {
        return Ok(());
    }

    println!("🧠 CCOM Status");
    println!("==============");
    println!("  Project:      {}", session.root.display());
    println!(
        "  Database:     {} ({:.1} KB)",
        keeper.database_path().display(),
        stats.database_size_bytes as f64 / 1024.0
    );
    println!("  Channel:      {}", ctx.channel);
    println!("  Branch:       {}", ctx.git_branch.as_deref().unwrap_or("(none)"));
    println!("  Session:      {}", ctx.session_id);
    println!("  Entries:      {}", stats.total_entries);
    println!("  Channels:     {}", stats.total_channels);
    println!("  Checkpoints:  {}", stats.total_checkpoints);

    for (title, counts) in [
        ("By channel", &stats.by_channel),
        ("By type", &stats.by_content_type),
        ("By priority", &stats.by_priority),
    ] {
        if counts.is_empty() {
            continue;
        }
        println!();
        println!("  {title}:");
        for (name, count) in counts {
            println!("    {name:<24} {count}");
        }
    }

    let threshold = keeper.config().checkpoint.auto_threshold;
    if stats.total_entries >= threshold {
        println!();
        println!("  ⚠️  {} entries; consider `ccom checkpoint auto`", stats.total_entries);
    }

    Ok(())
}
