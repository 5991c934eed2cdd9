//! # Arnica
//!
//! Write-path coordination for a mutable document index.
//!
//! Arnica sits between an ingestion layer and an index engine: it accepts
//! add, delete, commit, rollback, and segment-merge commands, applies them to
//! the engine, records them in a write-ahead update log in the correct order,
//! and decides when mutations become visible to readers.
//!
//! ## Features
//!
//! - Ordering guarantee: a logged mutation is an applied mutation
//! - Hard (durable) and soft (visibility-only) commits with distinct locking
//! - Autocommit on document-count and elapsed-time thresholds
//! - Reordering-tolerant update path for out-of-order delete-by-query arrivals
//! - In-memory engine and log implementations for embedding and tests

// Core modules
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod query;
pub mod state;
pub mod update;
pub mod wal;

// Re-exports for the public API
pub use config::UpdateConfig;
pub use data::{DataValue, Document};
pub use engine::memory::MemoryIndexEngine;
pub use engine::{CommitMeta, IndexEngine, IndexSnapshot, IndexSplitter};
pub use error::{ArnicaError, Result};
pub use query::{Query, Term};
pub use state::{SearcherWarmup, SharedCoreState, WriterLease};
pub use update::command::{
    AddCommand, CommitCommand, DELETE_ALL_VERSION, DeleteByIdCommand, DeleteByQueryCommand,
    MergeCommand, RollbackCommand, SplitCommand,
};
pub use update::coordinator::{CommitListener, UpdateCoordinator};
pub use update::stats::UpdateStatsSnapshot;
pub use update::tracker::CommitTracker;
pub use wal::memory::MemoryUpdateLog;
pub use wal::{DbqRecord, LogEntry, LogRecord, LogState, UpdateLog};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
