//! `ccom dedupe` and `ccom consolidate`: Store maintenance.

use super::{Output, Session, require};
use ccom_core::GroupingPolicy;

pub async fn dedupe(session: &Session, out: Output) -> Result<(), Box<dyn std::error::Error>> {
    let report = require(session.keeper.remove_duplicates().await)?;
    if out.emit_json(&report)? {
        return Ok(());
    }

    if report.removed_ids.is_empty() {
        println!("✅ No exact duplicates found");
    } else {
        println!(
            "🧹 Removed {} duplicate entries from {} groups",
            report.removed(),
            report.groups
        );
    }
    Ok(())
}

pub async fn consolidate(
    session: &Session,
    out: Output,
    threshold: Option<f64>,
    policy: Option<GroupingPolicy>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(t) = threshold {
        if !(t > 0.0 && t <= 1.2) {
            return Err(format!("threshold must be in (0.0, 1.2], got {t}").into());
        }
    }

    let report = require(session.keeper.consolidate(threshold, policy).await)?;
    if out.emit_json(&report)? {
        return Ok(());
    }

    if report.groups_merged == 0 {
        println!("✅ No near-duplicate groups found");
    } else {
        println!(
            "🧩 Merged {} groups, removed {} entries",
            report.groups_merged, report.entries_removed
        );
        let ids: Vec<String> = report.merged_ids.iter().map(|id| format!("#{id}")).collect();
        println!("   Merged into: {}", ids.join(", "));
    }
    if report.failed_groups > 0 {
        println!("   ⚠️  {} groups failed and were rolled back", report.failed_groups);
    }
    Ok(())
}
