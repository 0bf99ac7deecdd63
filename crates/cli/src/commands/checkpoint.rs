//! `ccom checkpoint`: Named snapshots of a channel.

use super::{Output, Session, print_entry, remember_channel, require};

pub async fn save(
    session: &Session,
    out: Output,
    name: &str,
    description: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let summary = require(
        session
            .keeper
            .save_checkpoint(&session.ctx, name, description)
            .await,
    )?;
    if out.emit_json(&summary)? {
        return Ok(());
    }

    if let Some(summary) = summary {
        let count = summary.metadata.get("entry_count").cloned().unwrap_or_default();
        println!(
            "💾 Saved checkpoint '{}' of channel {} ({count} entries)",
            summary.name, summary.channel
        );
    }
    Ok(())
}

pub async fn restore(
    session: &Session,
    out: Output,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(restored) = require(session.keeper.restore_checkpoint(&session.ctx, name).await)?
    else {
        println!("❌ No checkpoint named '{name}'");
        return Ok(());
    };
    if restored.context.channel != session.ctx.channel {
        remember_channel(&session.root, &restored.context.channel)?;
    }
    if out.emit_json(&restored.checkpoint)? {
        return Ok(());
    }

    let cp = &restored.checkpoint;
    println!("⏪ Restored checkpoint '{}'", cp.summary.name);
    println!("  Channel:     {}", restored.context.channel);
    println!("  Saved:       {}", cp.summary.created_at.format("%Y-%m-%d %H:%M:%S"));
    if !cp.summary.description.is_empty() {
        println!("  Description: {}", cp.summary.description);
    }
    println!("  Entries:     {}", cp.snapshot.entries.len());
    println!();
    for entry in cp.snapshot.entries.iter().take(10) {
        print_entry(entry);
    }
    if cp.snapshot.entries.len() > 10 {
        println!("  ... and {} more", cp.snapshot.entries.len() - 10);
    }
    if restored.context.channel != session.ctx.channel {
        println!();
        println!("  Default channel is now {}", restored.context.channel);
    }
    Ok(())
}

pub async fn list(session: &Session, out: Output) -> Result<(), Box<dyn std::error::Error>> {
    let checkpoints = require(session.keeper.list_checkpoints().await)?;
    if out.emit_json(&checkpoints)? {
        return Ok(());
    }

    println!("💾 Checkpoints");
    println!("=============");
    if checkpoints.is_empty() {
        println!("  (none)");
    }
    for cp in &checkpoints {
        let count = cp.metadata.get("entry_count").cloned().unwrap_or_default();
        println!(
            "  {:<32} {}  [{}] {count} entries",
            cp.name,
            cp.created_at.format("%Y-%m-%d %H:%M"),
            cp.channel
        );
    }
    Ok(())
}

pub async fn delete(session: &Session, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    if require(session.keeper.delete_checkpoint(name).await)? {
        println!("🗑️  Deleted checkpoint '{name}'");
    } else {
        println!("❌ No checkpoint named '{name}'");
    }
    Ok(())
}

pub async fn auto(
    session: &Session,
    threshold: Option<i64>,
) -> Result<(), Box<dyn std::error::Error>> {
    match require(session.keeper.auto_checkpoint(&session.ctx, threshold).await)? {
        Some(name) => println!("💾 Saved {name}"),
        None => println!("ℹ️  Below the auto-checkpoint threshold, nothing saved"),
    }
    Ok(())
}
