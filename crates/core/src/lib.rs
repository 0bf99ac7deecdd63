//! # CCOM Core
//!
//! Domain types, classification, and error definitions for the CCOM context
//! store. This crate has **no storage dependencies**: it defines the model
//! that the SQLite store and the CLI work against.
//!
//! ## Layout
//!
//! - [`entry`]: entries, channels, checkpoints, filters, stats
//! - [`context`]: the explicit session context threaded through calls
//! - [`classify`]: keyword classification of captured text
//! - [`outcome`]: total results for the public store boundary
//! - [`error`]: `thiserror` error enums

pub mod classify;
pub mod context;
pub mod entry;
pub mod error;
pub mod outcome;

// Re-export key types at crate root for ergonomics
pub use classify::{Classification, classify};
pub use context::SessionContext;
pub use entry::{
    ChannelRecord, Checkpoint, CheckpointSnapshot, CheckpointSummary, ContextEntry, EntryFilter,
    GroupingPolicy, InsertOutcome, Metadata, NewEntry, Priority, ScoredEntry, StoreStats,
};
pub use error::MemoryError;
pub use outcome::Outcome;
