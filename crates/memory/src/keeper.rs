//! The public boundary of the context store.
//!
//! [`ContextKeeper`] wraps a [`SqliteContextStore`] that may have failed to
//! open. Every operation returns an [`Outcome`]: on any storage failure the
//! caller gets an empty value plus the reason instead of an error.

use crate::checkpoint::RestoredCheckpoint;
use crate::consolidate::{ConsolidationReport, DedupReport};
use crate::sqlite::SqliteContextStore;
use ccom_config::AppConfig;
use ccom_core::{
    ChannelRecord, CheckpointSummary, ContextEntry, EntryFilter, GroupingPolicy, InsertOutcome,
    MemoryError, Metadata, NewEntry, Outcome, ScoredEntry, SessionContext, StoreStats, classify,
};
use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct ContextKeeper {
    store: Result<SqliteContextStore, MemoryError>,
    config: AppConfig,
    database_path: PathBuf,
}

impl ContextKeeper {
    /// Open the store for `project_root`. Never fails: an unusable database
    /// is remembered and reported by every later call.
    pub async fn open(project_root: &Path, config: AppConfig) -> Self {
        let database_path = config.database_path(project_root);
        let store = SqliteContextStore::open(&database_path)
            .await
            .map(|store| store.with_preview_chars(config.store.preview_chars));

        if let Err(e) = &store {
            warn!(error = %e, "Context store unavailable; operations will return empty results");
        }

        Self {
            store,
            config,
            database_path,
        }
    }

    /// The session context for `project_root`, honoring a configured
    /// default channel.
    pub fn context_for(&self, project_root: &Path) -> SessionContext {
        let ctx = SessionContext::detect(project_root);
        match &self.config.capture.default_channel {
            Some(channel) => ctx.with_channel(channel.clone()),
            None => ctx,
        }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_ok()
    }

    /// Why the store could not be opened, if it could not.
    pub fn unavailable_reason(&self) -> Option<&MemoryError> {
        self.store.as_ref().err()
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    async fn with_store<'a, T, F, Fut>(&'a self, operation: &str, f: F) -> Outcome<T>
    where
        T: Default,
        F: FnOnce(&'a SqliteContextStore) -> Fut,
        Fut: Future<Output = Result<T, MemoryError>>,
    {
        match &self.store {
            Ok(store) => Outcome::from_result(operation, f(store).await),
            Err(e) => Outcome::degraded(operation, T::default(), e.clone()),
        }
    }

    /// Classify and store captured text.
    ///
    /// Blank text stores nothing and yields `None`.
    pub async fn capture(
        &self,
        ctx: &SessionContext,
        text: &str,
        mut metadata: Metadata,
    ) -> Outcome<Option<InsertOutcome>> {
        if text.trim().is_empty() {
            debug!("Ignoring empty capture");
            return Outcome::ok(None);
        }

        let classification = classify(text, &metadata);
        if !classification.title.is_empty() {
            metadata.insert("title".into(), Value::from(classification.title));
        }

        let entry = NewEntry::new(text, classification.content_type)
            .with_priority(classification.priority)
            .with_tags(classification.tags)
            .with_metadata(metadata);
        self.capture_entry(ctx, entry).await
    }

    /// Store a pre-built entry as-is.
    pub async fn capture_entry(
        &self,
        ctx: &SessionContext,
        entry: NewEntry,
    ) -> Outcome<Option<InsertOutcome>> {
        self.with_store("capture", |store| async move {
            store.insert(ctx, entry).await.map(Some)
        })
        .await
    }

    pub async fn get(&self, id: i64) -> Outcome<Option<ContextEntry>> {
        self.with_store("get", |store| store.get(id)).await
    }

    /// Newest-first listing.
    pub async fn recent(&self, filter: &EntryFilter, limit: usize) -> Outcome<Vec<ContextEntry>> {
        self.with_store("recent", |store| store.query_by(filter, limit))
            .await
    }

    pub async fn search(&self, query: &str, filter: &EntryFilter) -> Outcome<Vec<ScoredEntry>> {
        let limit = self.config.search.result_limit;
        self.with_store("search", |store| store.search(query, filter, limit))
            .await
    }

    pub async fn search_by_tags(
        &self,
        tags: &[String],
        match_all: bool,
    ) -> Outcome<Vec<ContextEntry>> {
        let limit = self.config.search.tag_result_limit;
        self.with_store("search_by_tags", |store| {
            store.search_by_tags(tags, match_all, limit)
        })
        .await
    }

    pub async fn search_similar(
        &self,
        reference_id: i64,
        limit: Option<usize>,
    ) -> Outcome<Vec<ContextEntry>> {
        let limit = limit.unwrap_or(self.config.search.similar_limit);
        self.with_store("search_similar", |store| {
            store.search_similar(reference_id, limit)
        })
        .await
    }

    pub async fn remove_duplicates(&self) -> Outcome<DedupReport> {
        self.with_store("remove_duplicates", |store| store.remove_exact_duplicates())
            .await
    }

    /// Merge near duplicates. `None` arguments fall back to configuration.
    pub async fn consolidate(
        &self,
        threshold: Option<f64>,
        policy: Option<GroupingPolicy>,
    ) -> Outcome<ConsolidationReport> {
        let threshold = threshold.unwrap_or(self.config.consolidation.threshold);
        let policy = policy.unwrap_or(self.config.consolidation.grouping);
        self.with_store("consolidate", |store| {
            store.consolidate_similar(threshold, policy)
        })
        .await
    }

    pub async fn save_checkpoint(
        &self,
        ctx: &SessionContext,
        name: &str,
        description: &str,
    ) -> Outcome<Option<CheckpointSummary>> {
        self.with_store("save_checkpoint", |store| async move {
            store.save_checkpoint(ctx, name, description).await.map(Some)
        })
        .await
    }

    pub async fn restore_checkpoint(
        &self,
        ctx: &SessionContext,
        name: &str,
    ) -> Outcome<Option<RestoredCheckpoint>> {
        self.with_store("restore_checkpoint", |store| {
            store.restore_checkpoint(ctx, name)
        })
        .await
    }

    pub async fn auto_checkpoint(
        &self,
        ctx: &SessionContext,
        threshold: Option<i64>,
    ) -> Outcome<Option<String>> {
        let threshold = threshold.unwrap_or(self.config.checkpoint.auto_threshold);
        self.with_store("auto_checkpoint", |store| {
            store.auto_checkpoint(ctx, threshold)
        })
        .await
    }

    pub async fn list_checkpoints(&self) -> Outcome<Vec<CheckpointSummary>> {
        self.with_store("list_checkpoints", |store| store.list_checkpoints())
            .await
    }

    pub async fn delete_checkpoint(&self, name: &str) -> Outcome<bool> {
        self.with_store("delete_checkpoint", |store| store.delete_checkpoint(name))
            .await
    }

    /// Switch to `channel`, creating it if needed. The returned context is
    /// switched even when the store is unavailable.
    pub async fn switch_channel(
        &self,
        ctx: &SessionContext,
        channel: &str,
        description: Option<&str>,
    ) -> (SessionContext, Outcome<Option<ChannelRecord>>) {
        let switched = ctx.with_channel(channel);
        let outcome = self
            .with_store("switch_channel", |store| {
                let switched = &switched;
                async move { store.touch_channel(switched, description).await.map(Some) }
            })
            .await;
        (switched, outcome)
    }

    pub async fn list_channels(&self) -> Outcome<Vec<ChannelRecord>> {
        self.with_store("list_channels", |store| store.list_channels())
            .await
    }

    pub async fn stats(&self) -> Outcome<StoreStats> {
        self.with_store("stats", |store| store.stats()).await
    }

    pub async fn count(&self) -> Outcome<i64> {
        self.with_store("count", |store| store.count()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccom_core::Priority;
    use tempfile::TempDir;

    async fn keeper() -> (TempDir, ContextKeeper, SessionContext) {
        let dir = tempfile::tempdir().unwrap();
        let keeper = ContextKeeper::open(dir.path(), AppConfig::default()).await;
        let ctx = SessionContext::new(dir.path(), "main");
        (dir, keeper, ctx)
    }

    async fn unavailable_keeper() -> (TempDir, ContextKeeper, SessionContext) {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let mut config = AppConfig::default();
        config.store.db_path = Some(blocker.join("context.db"));
        let keeper = ContextKeeper::open(dir.path(), config).await;
        let ctx = SessionContext::new(dir.path(), "main");
        (dir, keeper, ctx)
    }

    #[tokio::test]
    async fn capture_classifies_and_titles() {
        let (_dir, keeper, ctx) = keeper().await;
        let outcome = keeper
            .capture(&ctx, "npm audit: 2 vulnerabilities\nlodash prototype pollution", Metadata::new())
            .await;
        assert!(outcome.succeeded());
        let id = outcome.into_value().unwrap().id();

        let entry = keeper.get(id).await.into_value().unwrap();
        assert_eq!(entry.content_type, "security_analysis");
        assert_eq!(entry.priority, Priority::High);
        assert_eq!(entry.tags, vec!["security"]);
        assert_eq!(entry.metadata["title"], "npm audit: 2 vulnerabilities");
    }

    #[tokio::test]
    async fn repeated_capture_reports_duplicate() {
        let (_dir, keeper, ctx) = keeper().await;
        let first = keeper.capture(&ctx, "same output", Metadata::new()).await;
        let second = keeper.capture(&ctx, "same output", Metadata::new()).await;

        assert!(second.succeeded());
        assert_eq!(
            second.into_value(),
            Some(InsertOutcome::Duplicate(first.into_value().unwrap().id()))
        );
        assert_eq!(keeper.count().await.into_value(), 1);
    }

    #[tokio::test]
    async fn blank_capture_stores_nothing() {
        let (_dir, keeper, ctx) = keeper().await;
        let outcome = keeper.capture(&ctx, "   \n ", Metadata::new()).await;
        assert!(outcome.succeeded());
        assert!(outcome.into_value().is_none());
        assert_eq!(keeper.count().await.into_value(), 0);
    }

    #[tokio::test]
    async fn switch_channel_returns_new_context() {
        let (_dir, keeper, ctx) = keeper().await;
        let (switched, outcome) = keeper.switch_channel(&ctx, "release", Some("Release prep")).await;

        assert_eq!(ctx.channel, "main");
        assert_eq!(switched.channel, "release");
        assert_eq!(outcome.into_value().unwrap().description, "Release prep");
        assert_eq!(keeper.list_channels().await.into_value().len(), 1);
    }

    #[tokio::test]
    async fn consolidate_uses_configured_defaults() {
        let (_dir, keeper, ctx) = keeper().await;
        keeper.capture(&ctx, "build step one finished ok", Metadata::new()).await;
        keeper.capture(&ctx, "build step one finished ok!", Metadata::new()).await;

        let report = keeper.consolidate(None, None).await;
        assert!(report.succeeded());
        assert_eq!(report.value().entries_removed, 1);
        assert_eq!(keeper.count().await.into_value(), 1);
    }

    #[tokio::test]
    async fn unavailable_store_degrades_every_call() {
        let (_dir, keeper, ctx) = unavailable_keeper().await;
        assert!(!keeper.is_available());
        assert!(matches!(
            keeper.unavailable_reason(),
            Some(MemoryError::Unavailable { .. })
        ));

        let captured = keeper.capture(&ctx, "lost output", Metadata::new()).await;
        assert!(!captured.succeeded());
        assert!(captured.value().is_none());

        let searched = keeper.search("anything", &EntryFilter::default()).await;
        assert!(!searched.succeeded());
        assert!(searched.value().is_empty());

        let recent = keeper.recent(&EntryFilter::default(), 10).await;
        assert!(recent.failure().is_some());
        assert!(recent.value().is_empty());

        let restored = keeper.restore_checkpoint(&ctx, "cp").await;
        assert!(!restored.succeeded());
        assert!(restored.value().is_none());

        let deleted = keeper.delete_checkpoint("cp").await;
        assert!(!deleted.succeeded());
        assert!(!deleted.value());

        let stats = keeper.stats().await;
        assert!(!stats.succeeded());
        assert_eq!(stats.value().total_entries, 0);

        let (switched, touched) = keeper.switch_channel(&ctx, "other", None).await;
        assert_eq!(switched.channel, "other");
        assert!(!touched.succeeded());

        assert!(!keeper.consolidate(None, None).await.succeeded());
        assert!(!keeper.remove_duplicates().await.succeeded());
        assert!(keeper.list_channels().await.value().is_empty());
    }
}
