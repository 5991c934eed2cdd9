//! Write-ahead update log abstraction.
//!
//! The coordinator records every applied mutation in an [`UpdateLog`] and
//! drives the log's commit-lifecycle hooks. The invariant the coordinator
//! maintains: a log append never precedes the mutation's successful
//! application to the engine, so anything the log holds has definitely been
//! applied.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::update::command::{AddCommand, CommitCommand, DeleteByIdCommand, DeleteByQueryCommand};

/// Lifecycle state of the update log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogState {
    /// Normal operation; appended entries are applied entries.
    Active,
    /// Incoming updates are being buffered, not applied.
    Buffering,
    /// The log is being replayed into the engine.
    Replaying,
    /// Buffered updates are being applied after a replay.
    ApplyingBuffered,
}

/// A delete-by-query the log has recorded, with the version it was logged at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbqRecord {
    pub query: String,
    pub version: i64,
}

/// A single logged operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogEntry {
    /// A document add.
    Add {
        id: Option<String>,
        version: i64,
        /// Set when the add was applied through reorder reconciliation.
        #[serde(default)]
        reordered: bool,
    },
    /// A delete by id.
    Delete { id: String, version: i64 },
    /// A delete by query.
    DeleteByQuery { query: String, version: i64 },
}

/// A log record combining a sequence number with an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub seq: u64,
    pub entry: LogEntry,
}

/// Durable append-only log of applied update commands.
pub trait UpdateLog: Send + Sync + std::fmt::Debug {
    /// Record an applied add. `reordered` marks adds that went through
    /// reorder reconciliation.
    fn add(&self, cmd: &AddCommand, reordered: bool) -> Result<()>;

    /// Record an applied delete-by-id.
    fn delete(&self, cmd: &DeleteByIdCommand) -> Result<()>;

    /// Record an applied delete-by-query.
    fn delete_by_query(&self, cmd: &DeleteByQueryCommand) -> Result<()>;

    /// Discard all log state.
    fn delete_all(&self) -> Result<()>;

    /// Delete-by-query entries logged with a version strictly newer than
    /// `version`, or `None` if there are none.
    fn delete_by_query_newer_than(&self, version: i64) -> Option<Vec<DbqRecord>>;

    /// Force a fresh realtime view of the log-backed state.
    fn open_realtime_searcher(&self);

    /// Hook invoked before a hard commit captures the engine state.
    fn pre_commit(&self, cmd: &CommitCommand) -> Result<()>;

    /// Hook invoked once a hard commit's new searcher is visible.
    fn post_commit(&self, cmd: &CommitCommand) -> Result<()>;

    /// Hook invoked before a searcher swap.
    fn pre_soft_commit(&self, cmd: &CommitCommand) -> Result<()>;

    /// Hook invoked after a searcher swap.
    fn post_soft_commit(&self, cmd: &CommitCommand) -> Result<()>;

    /// Whether the log holds entries not yet captured by a commit.
    fn has_uncommitted_changes(&self) -> bool;

    /// Current lifecycle state.
    fn state(&self) -> LogState;

    /// Close the log. With `cap_files` the on-disk files are trimmed and
    /// released; without it they are left as-is.
    fn close(&self, cap_files: bool) -> Result<()>;
}
