//! Named checkpoints of a channel.
//!
//! A checkpoint stores the channel's entries, every channel row, and the
//! store statistics as one JSON snapshot. Restoring does not roll anything
//! back; it hands the snapshot to the caller together with a session
//! context switched to the checkpoint's channel.

use crate::sqlite::{
    SqliteContextStore, count_entries, fetch_channels, fetch_entries, fetch_stats,
    stored_timestamp, upsert_channel,
};
use ccom_core::entry::format_timestamp;
use ccom_core::{
    Checkpoint, CheckpointSnapshot, CheckpointSummary, EntryFilter, MemoryError, Metadata,
    SessionContext,
};
use chrono::Utc;
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tracing::{debug, info, warn};

/// Prefix of checkpoints written by [`SqliteContextStore::auto_checkpoint`].
pub const AUTO_CHECKPOINT_PREFIX: &str = "auto_checkpoint_";

/// A restored checkpoint and the context that now points at its channel.
#[derive(Debug, Clone)]
pub struct RestoredCheckpoint {
    pub checkpoint: Checkpoint,
    pub context: SessionContext,
}

impl SqliteContextStore {
    /// Snapshot the context's channel under `name`, replacing any
    /// checkpoint of the same name.
    pub async fn save_checkpoint(
        &self,
        ctx: &SessionContext,
        name: &str,
        description: &str,
    ) -> Result<CheckpointSummary, MemoryError> {
        let mut conn = self.connect().await?;

        let snapshot = CheckpointSnapshot {
            entries: fetch_entries(&mut conn, &EntryFilter::channel(&ctx.channel), None).await?,
            channels: fetch_channels(&mut conn).await?,
            stats: fetch_stats(&mut conn).await?,
        };

        let mut metadata = Metadata::new();
        metadata.insert("entry_count".into(), Value::from(snapshot.entries.len()));
        metadata.insert(
            "git_branch".into(),
            ctx.git_branch.clone().map_or(Value::Null, Value::from),
        );
        metadata.insert(
            "project_name".into(),
            ctx.project_name.clone().map_or(Value::Null, Value::from),
        );

        let created_at = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO checkpoints
                (name, channel, session_id, description, snapshot, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(name) DO UPDATE SET
                channel = excluded.channel,
                session_id = excluded.session_id,
                description = excluded.description,
                snapshot = excluded.snapshot,
                metadata = excluded.metadata,
                created_at = excluded.created_at
            "#,
        )
        .bind(name)
        .bind(&ctx.channel)
        .bind(&ctx.session_id)
        .bind(description)
        .bind(serde_json::to_string(&snapshot)?)
        .bind(serde_json::to_string(&metadata)?)
        .bind(format_timestamp(&created_at))
        .execute(&mut conn)
        .await
        .map_err(|e| MemoryError::Storage(format!("checkpoint save: {e}")))?;

        info!(
            "Saved checkpoint '{name}' of channel {} ({} entries)",
            ctx.channel,
            snapshot.entries.len()
        );

        Ok(CheckpointSummary {
            name: name.to_string(),
            channel: ctx.channel.clone(),
            session_id: ctx.session_id.clone(),
            description: description.to_string(),
            metadata,
            created_at,
        })
    }

    /// Load a checkpoint and switch to its channel. `None` if no checkpoint
    /// has that name.
    pub async fn restore_checkpoint(
        &self,
        ctx: &SessionContext,
        name: &str,
    ) -> Result<Option<RestoredCheckpoint>, MemoryError> {
        let mut conn = self.connect().await?;
        let row = sqlx::query("SELECT * FROM checkpoints WHERE name = ?1")
            .bind(name)
            .fetch_optional(&mut conn)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("checkpoint lookup: {e}")))?;

        let Some(row) = row else {
            debug!("No checkpoint named '{name}'");
            return Ok(None);
        };

        let summary = row_to_summary(&row)?;
        let raw: String = row
            .try_get("snapshot")
            .map_err(|e| MemoryError::QueryFailed(format!("snapshot column: {e}")))?;
        let snapshot = serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Checkpoint '{name}' has an unreadable snapshot ({e}); restoring it empty");
            CheckpointSnapshot::default()
        });

        let context = ctx.with_channel(summary.channel.clone());
        upsert_channel(&mut conn, &context, None, Utc::now()).await?;

        info!("Restored checkpoint '{name}', now on channel {}", context.channel);
        Ok(Some(RestoredCheckpoint {
            checkpoint: Checkpoint { summary, snapshot },
            context,
        }))
    }

    /// Save a timestamped checkpoint once the store holds at least
    /// `threshold` entries. Returns the checkpoint name when one was saved.
    pub async fn auto_checkpoint(
        &self,
        ctx: &SessionContext,
        threshold: i64,
    ) -> Result<Option<String>, MemoryError> {
        let total = {
            let mut conn = self.connect().await?;
            count_entries(&mut conn).await?
        };
        if total < threshold {
            debug!("{total} entries, below auto-checkpoint threshold {threshold}");
            return Ok(None);
        }

        let name = format!(
            "{AUTO_CHECKPOINT_PREFIX}{}",
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let description = format!("Automatic checkpoint at {total} entries");
        self.save_checkpoint(ctx, &name, &description).await?;
        Ok(Some(name))
    }

    /// All checkpoints, newest first, without their snapshots.
    pub async fn list_checkpoints(&self) -> Result<Vec<CheckpointSummary>, MemoryError> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query(
            "SELECT name, channel, session_id, description, metadata, created_at \
             FROM checkpoints ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&mut conn)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("checkpoint listing: {e}")))?;

        rows.iter().map(row_to_summary).collect()
    }

    /// Delete a checkpoint. Returns whether one existed.
    pub async fn delete_checkpoint(&self, name: &str) -> Result<bool, MemoryError> {
        let mut conn = self.connect().await?;
        let result = sqlx::query("DELETE FROM checkpoints WHERE name = ?1")
            .bind(name)
            .execute(&mut conn)
            .await
            .map_err(|e| MemoryError::Storage(format!("checkpoint delete: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_summary(row: &SqliteRow) -> Result<CheckpointSummary, MemoryError> {
    let column = |name: &str, e: sqlx::Error| MemoryError::QueryFailed(format!("{name} column: {e}"));

    let name: String = row.try_get("name").map_err(|e| column("name", e))?;
    let channel: String = row.try_get("channel").map_err(|e| column("channel", e))?;
    let session_id: String = row.try_get("session_id").map_err(|e| column("session_id", e))?;
    let description: String = row.try_get("description").map_err(|e| column("description", e))?;
    let metadata: String = row.try_get("metadata").map_err(|e| column("metadata", e))?;
    let created_at: String = row.try_get("created_at").map_err(|e| column("created_at", e))?;
    let created_at = stored_timestamp(&created_at, "checkpoint", &name);

    Ok(CheckpointSummary {
        metadata: serde_json::from_str(&metadata).unwrap_or_else(|e| {
            debug!("Checkpoint '{name}' has malformed metadata ({e}); using empty object");
            Metadata::new()
        }),
        name,
        channel,
        session_id,
        description,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::tests::{test_ctx, test_store};
    use ccom_core::NewEntry;

    #[tokio::test]
    async fn save_then_restore_switches_channel() {
        let (_dir, store) = test_store().await;
        let feature = test_ctx("feature-auth");
        for text in ["login flow drafted", "token refresh tested", "session expiry fixed"] {
            store.insert(&feature, NewEntry::new(text, "note")).await.unwrap();
        }
        store
            .insert(&test_ctx("main"), NewEntry::new("unrelated main work", "note"))
            .await
            .unwrap();

        let summary = store
            .save_checkpoint(&feature, "before-refactor", "auth work so far")
            .await
            .unwrap();
        assert_eq!(summary.metadata["entry_count"], 3);
        assert_eq!(summary.metadata["git_branch"], "feature-auth");

        let elsewhere = feature.with_channel("main");
        let restored = store
            .restore_checkpoint(&elsewhere, "before-refactor")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(restored.context.channel, "feature-auth");
        assert_eq!(restored.context.session_id, elsewhere.session_id);
        assert_eq!(elsewhere.channel, "main");
        assert_eq!(restored.checkpoint.snapshot.entries.len(), 3);
        assert_eq!(restored.checkpoint.snapshot.channels.len(), 2);
        assert_eq!(restored.checkpoint.snapshot.stats.total_entries, 4);
        assert_eq!(restored.checkpoint.summary.description, "auth work so far");
    }

    #[tokio::test]
    async fn unknown_checkpoint_is_none() {
        let (_dir, store) = test_store().await;
        let restored = store
            .restore_checkpoint(&test_ctx("main"), "never-saved")
            .await
            .unwrap();
        assert!(restored.is_none());
    }

    #[tokio::test]
    async fn saving_same_name_replaces() {
        let (_dir, store) = test_store().await;
        let ctx = test_ctx("main");
        store.save_checkpoint(&ctx, "cp", "first").await.unwrap();
        store.insert(&ctx, NewEntry::new("new work", "note")).await.unwrap();
        store.save_checkpoint(&ctx, "cp", "second").await.unwrap();

        let list = store.list_checkpoints().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].description, "second");
        assert_eq!(list[0].metadata["entry_count"], 1);
    }

    #[tokio::test]
    async fn corrupt_snapshot_restores_empty() {
        let (_dir, store) = test_store().await;
        let ctx = test_ctx("main");
        store.insert(&ctx, NewEntry::new("some work", "note")).await.unwrap();
        store.save_checkpoint(&ctx, "cp", "").await.unwrap();

        let mut conn = store.connect().await.unwrap();
        sqlx::query("UPDATE checkpoints SET snapshot = 'garbage' WHERE name = 'cp'")
            .execute(&mut conn)
            .await
            .unwrap();

        let restored = store.restore_checkpoint(&ctx, "cp").await.unwrap().unwrap();
        assert!(restored.checkpoint.snapshot.entries.is_empty());
        assert_eq!(restored.context.channel, "main");
    }

    #[tokio::test]
    async fn auto_checkpoint_respects_threshold() {
        let (_dir, store) = test_store().await;
        let ctx = test_ctx("main");
        store.insert(&ctx, NewEntry::new("one", "note")).await.unwrap();
        store.insert(&ctx, NewEntry::new("two", "note")).await.unwrap();

        assert_eq!(store.auto_checkpoint(&ctx, 3).await.unwrap(), None);

        let name = store.auto_checkpoint(&ctx, 2).await.unwrap().unwrap();
        assert!(name.starts_with(AUTO_CHECKPOINT_PREFIX));
        assert_eq!(store.list_checkpoints().await.unwrap()[0].name, name);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let (_dir, store) = test_store().await;
        let ctx = test_ctx("main");
        store.save_checkpoint(&ctx, "cp", "").await.unwrap();

        assert!(store.delete_checkpoint("cp").await.unwrap());
        assert!(!store.delete_checkpoint("cp").await.unwrap());
        assert!(store.list_checkpoints().await.unwrap().is_empty());
    }
}
