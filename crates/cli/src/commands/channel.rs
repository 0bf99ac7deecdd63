//! `ccom channel`: List and switch channels.

use super::{Output, Session, remember_channel, require};

pub async fn list(session: &Session, out: Output) -> Result<(), Box<dyn std::error::Error>> {
    let channels = require(session.keeper.list_channels().await)?;
    if out.emit_json(&channels)? {
        return Ok(());
    }

    println!("📡 Channels");
    println!("===========");
    if channels.is_empty() {
        println!("  (none)");
    }
    for channel in &channels {
        let marker = if channel.name == session.ctx.channel { "*" } else { " " };
        println!(
            "{marker} {:<28} last used {}",
            channel.name,
            channel.last_used.format("%Y-%m-%d %H:%M")
        );
        if !channel.description.is_empty() {
            println!("    {}", channel.description);
        }
    }
    Ok(())
}

/// Create or touch `name` and record it as the project's default channel.
pub async fn switch(
    session: &Session,
    name: &str,
    description: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (switched, outcome) = session
        .keeper
        .switch_channel(&session.ctx, name, description)
        .await;
    require(outcome)?;

    let config_path = remember_channel(&session.root, &switched.channel)?;

    println!("📡 Switched to channel {}", switched.channel);
    println!("   Default saved to {}", config_path.display());
    Ok(())
}
