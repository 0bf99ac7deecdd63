//! SQLite-backed context store for CCOM.
//!
//! - [`sqlite`]: schema, inserts with content-hash dedup, listings, stats
//! - [`search`]: time-scoped keyword search, tag and similarity lookups
//! - [`consolidate`]: exact and near-duplicate merging
//! - [`checkpoint`]: named channel snapshots
//! - [`keeper`]: the total, `Outcome`-returning boundary used by the CLI

pub mod checkpoint;
pub mod consolidate;
pub mod keeper;
pub mod search;
pub mod sqlite;

pub use checkpoint::{AUTO_CHECKPOINT_PREFIX, RestoredCheckpoint};
pub use consolidate::{
    CONSOLIDATION_SEPARATOR, ConsolidationReport, DedupReport, group_similar, similarity,
};
pub use keeper::ContextKeeper;
pub use search::{QueryPlan, TimeScope, plan_query};
pub use sqlite::SqliteContextStore;
