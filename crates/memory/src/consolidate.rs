//! Exact and near-duplicate consolidation.
//!
//! Exact duplicates share a content hash; the newest row survives.
//! Near duplicates are scored pairwise within each content type and merged
//! into their newest member. Grouping is O(n²) per content type, which is
//! fine for the few thousand entries a project store holds.

use crate::sqlite::{
    CONTENT_HASH_INDEX, SqliteContextStore, content_hash, delete_entries, encode_tags,
    fetch_entries, write_index,
};
use ccom_core::{ContextEntry, EntryFilter, GroupingPolicy, MemoryError, Metadata};
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteConnection;
use sqlx::{Connection, Row};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Joins member contents in a merged entry.
pub const CONSOLIDATION_SEPARATOR: &str = "\n\n--- consolidated ---\n\n";

/// Result of exact-duplicate removal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupReport {
    /// Hashes that had more than one row.
    pub groups: usize,
    pub removed_ids: Vec<i64>,
}

impl DedupReport {
    pub fn removed(&self) -> usize {
        self.removed_ids.len()
    }
}

/// Result of near-duplicate consolidation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidationReport {
    pub groups_merged: usize,
    pub entries_removed: usize,
    /// Surviving entry of each merged group.
    pub merged_ids: Vec<i64>,
    /// Groups rolled back after a storage error.
    pub failed_groups: usize,
}

/// Precomputed comparison features of one entry.
struct Shingle {
    words: HashSet<String>,
    len: usize,
}

impl Shingle {
    fn of(content: &str) -> Self {
        Self {
            words: content
                .to_lowercase()
                .split_whitespace()
                .map(String::from)
                .collect(),
            len: content.chars().count(),
        }
    }
}

/// Jaccard similarity of the lowercase word sets plus a length bonus of
/// `0.2 * shorter / longer`. Ranges over `[0.0, 1.2]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    shingle_similarity(&Shingle::of(a), &Shingle::of(b))
}

fn shingle_similarity(a: &Shingle, b: &Shingle) -> f64 {
    let union = a.words.union(&b.words).count();
    let jaccard = if union == 0 {
        0.0
    } else {
        a.words.intersection(&b.words).count() as f64 / union as f64
    };

    let longer = a.len.max(b.len);
    let bonus = if longer == 0 {
        0.0
    } else {
        0.2 * a.len.min(b.len) as f64 / longer as f64
    };

    jaccard + bonus
}

/// Union-find over entry indices.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Smaller root wins so groups stay keyed by their first member.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// Group indices into `entries` whose pairwise similarity reaches
/// `threshold`. Only entries of the same content type are compared, in id
/// order. Returns groups of two or more, each sorted ascending.
pub fn group_similar(
    entries: &[ContextEntry],
    threshold: f64,
    policy: GroupingPolicy,
) -> Vec<Vec<usize>> {
    let mut buckets: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, entry) in entries.iter().enumerate() {
        buckets.entry(entry.content_type.as_str()).or_default().push(i);
    }

    let shingles: Vec<Shingle> = entries.iter().map(|e| Shingle::of(&e.content)).collect();
    let mut groups = Vec::new();

    for mut members in buckets.into_values() {
        members.sort_by_key(|&i| entries[i].id);

        match policy {
            GroupingPolicy::Connected => {
                let mut set = DisjointSet::new(members.len());
                for a in 0..members.len() {
                    for b in a + 1..members.len() {
                        if shingle_similarity(&shingles[members[a]], &shingles[members[b]])
                            >= threshold
                        {
                            set.union(a, b);
                        }
                    }
                }

                let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
                for pos in 0..members.len() {
                    let root = set.find(pos);
                    by_root.entry(root).or_default().push(members[pos]);
                }
                groups.extend(by_root.into_values().filter(|g| g.len() > 1));
            }
            GroupingPolicy::SinglePass => {
                let mut claimed = vec![false; members.len()];
                for a in 0..members.len() {
                    if claimed[a] {
                        continue;
                    }
                    let mut group = vec![members[a]];
                    for b in a + 1..members.len() {
                        if !claimed[b]
                            && shingle_similarity(&shingles[members[a]], &shingles[members[b]])
                                >= threshold
                        {
                            claimed[b] = true;
                            group.push(members[b]);
                        }
                    }
                    if group.len() > 1 {
                        claimed[a] = true;
                        groups.push(group);
                    }
                }
            }
        }
    }

    for group in &mut groups {
        group.sort_unstable();
    }
    groups
}

/// The merged form of a group: which row survives and what it becomes.
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub base_id: i64,
    pub removed_ids: Vec<i64>,
    pub content: String,
    pub tags: Vec<String>,
    pub metadata: Metadata,
}

/// Merge `group` into its newest member.
///
/// Returns `None` for groups of fewer than two entries.
pub fn merge_group(group: &[&ContextEntry]) -> Option<MergePlan> {
    if group.len() < 2 {
        return None;
    }

    let mut ordered: Vec<&ContextEntry> = group.to_vec();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
    let base = *ordered.last()?;

    let content = ordered
        .iter()
        .map(|e| format!("[{}] {}", e.timestamp.format("%Y-%m-%d %H:%M:%S"), e.content))
        .collect::<Vec<_>>()
        .join(CONSOLIDATION_SEPARATOR);

    let mut seen = HashSet::new();
    let tags = ordered
        .iter()
        .flat_map(|e| e.tags.iter())
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect();

    let mut metadata = Metadata::new();
    for entry in &ordered {
        for (key, value) in &entry.metadata {
            metadata.insert(key.clone(), value.clone());
        }
    }
    metadata.insert("consolidated".into(), Value::Bool(true));
    metadata.insert("original_count".into(), Value::from(ordered.len()));

    Some(MergePlan {
        base_id: base.id,
        removed_ids: ordered
            .iter()
            .filter(|e| e.id != base.id)
            .map(|e| e.id)
            .collect(),
        content,
        tags,
        metadata,
    })
}

/// Delete every row whose content hash also belongs to a newer row.
/// Newest means latest timestamp, then highest id.
pub(crate) async fn delete_hash_duplicates(
    conn: &mut SqliteConnection,
) -> Result<DedupReport, MemoryError> {
    let rows = sqlx::query(
        r#"
        SELECT id, content_hash FROM context_entries
        WHERE content_hash IN (
            SELECT content_hash FROM context_entries
            GROUP BY content_hash HAVING COUNT(*) > 1
        )
        ORDER BY content_hash, timestamp DESC, id DESC
        "#,
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| MemoryError::QueryFailed(format!("duplicate scan: {e}")))?;

    let mut report = DedupReport::default();
    let mut current: Option<String> = None;
    for row in &rows {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| MemoryError::QueryFailed(format!("id column: {e}")))?;
        let hash: String = row
            .try_get("content_hash")
            .map_err(|e| MemoryError::QueryFailed(format!("content_hash column: {e}")))?;

        if current.as_deref() == Some(hash.as_str()) {
            report.removed_ids.push(id);
        } else {
            report.groups += 1;
            current = Some(hash);
        }
    }

    delete_entries(conn, &report.removed_ids).await?;
    Ok(report)
}

impl SqliteContextStore {
    /// Remove rows whose content duplicates a newer row, then make sure the
    /// unique content-hash index exists.
    pub async fn remove_exact_duplicates(&self) -> Result<DedupReport, MemoryError> {
        let mut conn = self.connect().await?;
        let mut tx = conn
            .begin()
            .await
            .map_err(|e| MemoryError::Storage(format!("BEGIN failed: {e}")))?;

        let report = delete_hash_duplicates(&mut tx).await?;
        sqlx::query(CONTENT_HASH_INDEX)
            .execute(&mut *tx)
            .await
            .map_err(|e| MemoryError::Storage(format!("content_hash index: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| MemoryError::Storage(format!("COMMIT failed: {e}")))?;

        info!(
            "Removed {} exact duplicates across {} groups",
            report.removed(),
            report.groups
        );
        Ok(report)
    }

    /// Merge near-duplicate entries. Each group is written in its own
    /// transaction; a failing group is rolled back and counted, the rest
    /// still merge.
    pub async fn consolidate_similar(
        &self,
        threshold: f64,
        policy: GroupingPolicy,
    ) -> Result<ConsolidationReport, MemoryError> {
        let mut conn = self.connect().await?;
        let entries = fetch_entries(&mut conn, &EntryFilter::default(), None).await?;
        let groups = group_similar(&entries, threshold, policy);
        debug!(
            "Found {} similar groups among {} entries (threshold {threshold}, {policy:?})",
            groups.len(),
            entries.len()
        );

        let mut report = ConsolidationReport::default();
        for group in groups {
            let members: Vec<&ContextEntry> = group.iter().map(|&i| &entries[i]).collect();
            let Some(plan) = merge_group(&members) else {
                continue;
            };

            match apply_merge(&mut conn, &plan).await {
                Ok(()) => {
                    report.groups_merged += 1;
                    report.entries_removed += plan.removed_ids.len();
                    report.merged_ids.push(plan.base_id);
                }
                Err(e) => {
                    warn!(base_id = plan.base_id, error = %e, "Failed to merge group, rolled back");
                    report.failed_groups += 1;
                }
            }
        }

        info!(
            "Consolidated {} groups, removed {} entries",
            report.groups_merged, report.entries_removed
        );
        Ok(report)
    }
}

async fn apply_merge(conn: &mut SqliteConnection, plan: &MergePlan) -> Result<(), MemoryError> {
    let mut tx = conn
        .begin()
        .await
        .map_err(|e| MemoryError::Storage(format!("BEGIN failed: {e}")))?;

    // Members go first so the merged hash cannot collide with one of them.
    delete_entries(&mut tx, &plan.removed_ids).await?;

    sqlx::query(
        "UPDATE context_entries SET content = ?1, metadata = ?2, tags = ?3, content_hash = ?4 \
         WHERE id = ?5",
    )
    .bind(&plan.content)
    .bind(serde_json::to_string(&plan.metadata)?)
    .bind(encode_tags(&plan.tags))
    .bind(content_hash(&plan.content))
    .bind(plan.base_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| MemoryError::Storage(format!("merge update: {e}")))?;

    write_index(&mut tx, plan.base_id, &plan.content).await?;

    tx.commit()
        .await
        .map_err(|e| MemoryError::Storage(format!("COMMIT failed: {e}")))
}
