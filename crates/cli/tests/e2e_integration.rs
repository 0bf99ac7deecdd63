//! End-to-end integration tests for the CCOM context store.
//!
//! These tests drive the same `ContextKeeper` boundary the CLI uses, from
//! branch detection through capture, search, consolidation, and
//! checkpoint restore, against a throwaway project directory.

use ccom_config::AppConfig;
use ccom_core::{EntryFilter, GroupingPolicy, InsertOutcome, Metadata, NewEntry, Priority};
use ccom_memory::{CONSOLIDATION_SEPARATOR, ContextKeeper};
use chrono::{Duration, Utc};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────

/// A project directory checked out on `branch`.
fn project_on_branch(branch: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join(".git")).unwrap();
    set_branch(dir.path(), branch);
    dir
}

fn set_branch(root: &Path, branch: &str) {
    std::fs::write(root.join(".git/HEAD"), format!("ref: refs/heads/{branch}\n")).unwrap();
}

async fn open(root: &Path) -> ContextKeeper {
    ContextKeeper::open(root, AppConfig::default()).await
}

fn meta(value: serde_json::Value) -> Metadata {
    value.as_object().cloned().unwrap_or_default()
}

// ── Capture and classification ───────────────────────────────────────────

#[tokio::test]
async fn e2e_branch_becomes_channel() {
    let project = project_on_branch("feature/payments");
    let keeper = open(project.path()).await;
    let ctx = keeper.context_for(project.path());

    assert_eq!(ctx.channel, "feature-payments");
    assert_eq!(ctx.git_branch.as_deref(), Some("feature/payments"));

    keeper
        .capture(&ctx, "Stripe webhook handler drafted", Metadata::new())
        .await;
    let channels = keeper.list_channels().await.into_value();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].name, "feature-payments");
    assert_eq!(channels[0].git_branch.as_deref(), Some("feature/payments"));
}

#[tokio::test]
async fn e2e_capture_classifies_each_kind() {
    let project = project_on_branch("main");
    let keeper = open(project.path()).await;
    let ctx = keeper.context_for(project.path());

    let cases = [
        ("Evaluation of the caching layer: findings below", "evaluation", Priority::High),
        ("npm audit: critical vulnerability in lodash", "security_analysis", Priority::Critical),
        ("Deploy to production finished in 42s", "deployment", Priority::Normal),
        ("eslint reported 4 warnings", "quality_check", Priority::Normal),
        ("Remember to rename the config loader", "ccom_output", Priority::Normal),
    ];

    for (text, content_type, priority) in cases {
        let id = keeper
            .capture(&ctx, text, Metadata::new())
            .await
            .into_value()
            .unwrap()
            .id();
        let entry = keeper.get(id).await.into_value().unwrap();
        assert_eq!(entry.content_type, content_type, "{text}");
        assert_eq!(entry.priority, priority, "{text}");
    }

    let stats = keeper.stats().await.into_value();
    assert_eq!(stats.total_entries, 5);
    assert_eq!(stats.by_content_type.len(), 5);
}

#[tokio::test]
async fn e2e_metadata_overrides_classification() {
    let project = project_on_branch("main");
    let keeper = open(project.path()).await;
    let ctx = keeper.context_for(project.path());

    let metadata = meta(json!({
        "content_type": "decision",
        "priority": "low",
        "tags": "architecture, storage",
    }));
    let id = keeper
        .capture(&ctx, "Security review: keep SQLite, skip Postgres", metadata)
        .await
        .into_value()
        .unwrap()
        .id();

    let entry = keeper.get(id).await.into_value().unwrap();
    assert_eq!(entry.content_type, "decision");
    assert_eq!(entry.priority, Priority::Low);
    assert_eq!(entry.tags, vec!["architecture", "storage"]);
}

#[tokio::test]
async fn e2e_same_output_captured_twice_is_one_entry() {
    let project = project_on_branch("main");
    let keeper = open(project.path()).await;
    let ctx = keeper.context_for(project.path());

    let first = keeper
        .capture(&ctx, "cargo test: 212 passed", meta(json!({"run": 1})))
        .await
        .into_value()
        .unwrap();
    let second = keeper
        .capture(&ctx, "cargo test: 212 passed", meta(json!({"run": 2})))
        .await;

    assert!(second.succeeded());
    assert_eq!(second.into_value(), Some(InsertOutcome::Duplicate(first.id())));
    assert_eq!(keeper.count().await.into_value(), 1);
}

// ── Search ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_search_ranks_and_scopes() {
    let project = project_on_branch("main");
    let keeper = open(project.path()).await;
    let ctx = keeper.context_for(project.path());
    let now = Utc::now();

    let entries = [
        ("Deploy of api-gateway failed: health check timeout", 30),
        ("Deploy of api-gateway succeeded after retry", 20),
        ("lint: unused import in router.rs", 10),
        ("Deploy of billing worker failed: missing secret", 60 * 24 * 5),
    ];
    for (text, minutes_ago) in entries {
        keeper
            .capture_entry(
                &ctx,
                NewEntry::new(text, "ccom_output").at(now - Duration::minutes(minutes_ago)),
            )
            .await;
    }

    let all_time = keeper
        .search("deploy failed", &EntryFilter::default())
        .await
        .into_value();
    assert_eq!(all_time.len(), 3);
    assert!(all_time[0].entry.content.contains("failed"));
    assert!(all_time.iter().all(|h| !h.entry.content.starts_with("lint")));

    let today = keeper
        .search("deploy failed in the last 24 hours", &EntryFilter::default())
        .await
        .into_value();
    assert_eq!(today.len(), 2);
    assert!(today.iter().all(|h| !h.entry.content.contains("billing")));
}

#[tokio::test]
async fn e2e_tags_and_similar() {
    let project = project_on_branch("main");
    let keeper = open(project.path()).await;
    let ctx = keeper.context_for(project.path());

    let reference = keeper
        .capture(
            &ctx,
            "Evaluation: query planner picks the wrong index",
            meta(json!({"tags": ["db", "perf"]})),
        )
        .await
        .into_value()
        .unwrap()
        .id();
    keeper
        .capture(
            &ctx,
            "Evaluation: connection pool saturates at 64 clients",
            meta(json!({"tags": ["perf"]})),
        )
        .await;
    keeper
        .capture(&ctx, "eslint passes on the dashboard", Metadata::new())
        .await;

    let perf = keeper.search_by_tags(&["perf".into()], false).await.into_value();
    assert_eq!(perf.len(), 2);

    let both = keeper
        .search_by_tags(&["db".into(), "perf".into()], true)
        .await
        .into_value();
    assert_eq!(both.len(), 1);
    assert_eq!(both[0].id, reference);

    let similar = keeper.search_similar(reference, None).await.into_value();
    assert_eq!(similar.len(), 1);
    assert!(similar[0].content.contains("connection pool"));
}

// ── Maintenance ──────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_consolidation_merges_near_duplicates() {
    let project = project_on_branch("main");
    let keeper = open(project.path()).await;
    let ctx = keeper.context_for(project.path());
    let now = Utc::now();

    let texts = [
        "integration tests failed on checkout service",
        "integration tests failed on checkout service again",
        "integration tests failed on checkout service again today",
    ];
    for (i, text) in texts.iter().enumerate() {
        keeper
            .capture_entry(
                &ctx,
                NewEntry::new(*text, "ccom_output")
                    .with_tags([format!("run-{i}")])
                    .at(now - Duration::minutes(10 - i as i64)),
            )
            .await;
    }

    let report = keeper
        .consolidate(None, Some(GroupingPolicy::Connected))
        .await
        .into_value();
    assert_eq!(report.groups_merged, 1);
    assert_eq!(report.entries_removed, 2);
    assert_eq!(keeper.count().await.into_value(), 1);

    let merged = keeper.get(report.merged_ids[0]).await.into_value().unwrap();
    assert_eq!(merged.metadata["original_count"], 3);
    assert_eq!(merged.metadata["consolidated"], true);
    assert_eq!(merged.tags, vec!["run-0", "run-1", "run-2"]);
    let parts: Vec<&str> = merged.content.split(CONSOLIDATION_SEPARATOR).collect();
    assert_eq!(parts.len(), 3);
    assert!(parts[2].ends_with("again today"));

    // Nothing left to merge.
    let again = keeper.consolidate(None, None).await.into_value();
    assert_eq!(again.groups_merged, 0);
}

// ── Checkpoints ──────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_checkpoint_survives_branch_switch() {
    let project = project_on_branch("feature/search");
    let keeper = open(project.path()).await;
    let feature = keeper.context_for(project.path());

    for text in [
        "Search index schema drafted",
        "Tokenizer handles snake_case identifiers",
    ] {
        keeper.capture(&feature, text, Metadata::new()).await;
    }
    let saved = keeper
        .save_checkpoint(&feature, "search-wip", "before lunch")
        .await
        .into_value()
        .unwrap();
    assert_eq!(saved.metadata["entry_count"], 2);

    // Developer moves to main and keeps working there.
    set_branch(project.path(), "main");
    let main = keeper.context_for(project.path());
    assert_eq!(main.channel, "main");
    keeper
        .capture(&main, "Hotfix for login redirect", Metadata::new())
        .await;

    let restored = keeper
        .restore_checkpoint(&main, "search-wip")
        .await
        .into_value()
        .unwrap();
    assert_eq!(restored.context.channel, "feature-search");
    assert_eq!(restored.checkpoint.snapshot.entries.len(), 2);
    assert_eq!(restored.checkpoint.summary.description, "before lunch");

    let in_feature = keeper
        .recent(&EntryFilter::channel(&restored.context.channel), 10)
        .await
        .into_value();
    assert_eq!(in_feature.len(), 2);

    let missing = keeper.restore_checkpoint(&main, "no-such-checkpoint").await;
    assert!(missing.succeeded());
    assert!(missing.into_value().is_none());
}

#[tokio::test]
async fn e2e_reopening_keeps_everything() {
    let project = project_on_branch("main");
    {
        let keeper = open(project.path()).await;
        let ctx = keeper.context_for(project.path());
        keeper
            .capture(&ctx, "Persisted across processes", Metadata::new())
            .await;
        keeper.save_checkpoint(&ctx, "cp", "").await;
    }

    let keeper = open(project.path()).await;
    assert!(project.path().join(".ccom/context.db").exists());
    assert_eq!(keeper.count().await.into_value(), 1);
    assert_eq!(keeper.list_checkpoints().await.into_value().len(), 1);
}

#[tokio::test]
async fn e2e_configured_channel_overrides_branch() {
    let project = project_on_branch("main");
    std::fs::create_dir_all(project.path().join(".ccom")).unwrap();
    std::fs::write(
        project.path().join(".ccom/config.toml"),
        "[capture]\ndefault_channel = \"notes\"\n",
    )
    .unwrap();

    let config = AppConfig::load_from(&project.path().join(".ccom/config.toml")).unwrap();
    let keeper = ContextKeeper::open(project.path(), config).await;
    let ctx = keeper.context_for(project.path());
    assert_eq!(ctx.channel, "notes");
    assert_eq!(ctx.git_branch.as_deref(), Some("main"));
}
