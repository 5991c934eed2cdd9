//! In-memory update log.
//!
//! [`MemoryUpdateLog`] keeps the record list, the delete-by-query side list
//! used for reorder checks, and the commit-lifecycle bookkeeping the
//! coordinator drives. Records are framed the same way an on-disk log would
//! frame them (`[u32: length][json: LogRecord]`) for size accounting.

use parking_lot::Mutex;

use crate::error::{ArnicaError, Result};
use crate::update::command::{AddCommand, CommitCommand, DeleteByIdCommand, DeleteByQueryCommand};
use crate::wal::{DbqRecord, LogEntry, LogRecord, LogState, UpdateLog};

#[derive(Debug)]
struct LogInner {
    records: Vec<LogRecord>,
    dbqs: Vec<DbqRecord>,
    next_seq: u64,
    uncommitted: u64,
    size_bytes: u64,
    realtime_gen: u64,
    state: LogState,
    pre_commits: u64,
    post_commits: u64,
    pre_soft_commits: u64,
    post_soft_commits: u64,
    closed: bool,
    last_close_capped: Option<bool>,
}

impl LogInner {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ArnicaError::update_log("update log is closed"));
        }
        Ok(())
    }

    fn append(&mut self, entry: LogEntry) -> Result<()> {
        self.ensure_open()?;
        self.next_seq += 1;
        let record = LogRecord {
            seq: self.next_seq,
            entry,
        };
        let encoded = serde_json::to_vec(&record)?;
        self.size_bytes += 4 + encoded.len() as u64;
        self.records.push(record);
        self.uncommitted += 1;
        Ok(())
    }
}

impl Default for LogInner {
    fn default() -> Self {
        LogInner {
            records: Vec::new(),
            dbqs: Vec::new(),
            next_seq: 0,
            uncommitted: 0,
            size_bytes: 0,
            realtime_gen: 0,
            state: LogState::Active,
            pre_commits: 0,
            post_commits: 0,
            pre_soft_commits: 0,
            post_soft_commits: 0,
            closed: false,
            last_close_capped: None,
        }
    }
}

/// In-memory [`UpdateLog`] implementation.
#[derive(Debug, Default)]
pub struct MemoryUpdateLog {
    inner: Mutex<LogInner>,
}

impl MemoryUpdateLog {
    /// Create a new empty log.
    pub fn new() -> Self {
        MemoryUpdateLog::default()
    }

    /// All records appended so far, in order.
    pub fn records(&self) -> Vec<LogRecord> {
        self.inner.lock().records.clone()
    }

    /// All delete-by-query records, in logged order.
    pub fn dbq_records(&self) -> Vec<DbqRecord> {
        self.inner.lock().dbqs.clone()
    }

    /// Generation of the realtime view; bumped by each refresh.
    pub fn realtime_generation(&self) -> u64 {
        self.inner.lock().realtime_gen
    }

    /// Total encoded size of all appended records.
    pub fn total_size_bytes(&self) -> u64 {
        self.inner.lock().size_bytes
    }

    /// The `cap_files` flag of the most recent close, if any.
    pub fn last_close_capped(&self) -> Option<bool> {
        self.inner.lock().last_close_capped
    }

    /// Counts of lifecycle hook invocations:
    /// `(pre_commit, post_commit, pre_soft_commit, post_soft_commit)`.
    pub fn hook_counts(&self) -> (u64, u64, u64, u64) {
        let inner = self.inner.lock();
        (
            inner.pre_commits,
            inner.post_commits,
            inner.pre_soft_commits,
            inner.post_soft_commits,
        )
    }

    /// Force the log into a specific lifecycle state.
    pub fn set_state(&self, state: LogState) {
        self.inner.lock().state = state;
    }

    /// Seed a delete-by-query record directly, as replicated log traffic
    /// would. No engine mutation is implied.
    pub fn seed_dbq(&self, query: impl Into<String>, version: i64) {
        self.inner.lock().dbqs.push(DbqRecord {
            query: query.into(),
            version,
        });
    }
}

impl UpdateLog for MemoryUpdateLog {
    fn add(&self, cmd: &AddCommand, reordered: bool) -> Result<()> {
        self.inner.lock().append(LogEntry::Add {
            id: cmd.doc.id.clone(),
            version: cmd.version,
            reordered,
        })
    }

    fn delete(&self, cmd: &DeleteByIdCommand) -> Result<()> {
        self.inner.lock().append(LogEntry::Delete {
            id: cmd.id.clone(),
            version: cmd.version,
        })
    }

    fn delete_by_query(&self, cmd: &DeleteByQueryCommand) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.append(LogEntry::DeleteByQuery {
            query: cmd.query.clone(),
            version: cmd.version,
        })?;
        inner.dbqs.push(DbqRecord {
            query: cmd.query.clone(),
            version: cmd.version,
        });
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.records.clear();
        inner.dbqs.clear();
        inner.uncommitted = 0;
        inner.size_bytes = 0;
        Ok(())
    }

    fn delete_by_query_newer_than(&self, version: i64) -> Option<Vec<DbqRecord>> {
        let inner = self.inner.lock();
        let newer: Vec<DbqRecord> = inner
            .dbqs
            .iter()
            .filter(|dbq| dbq.version > version)
            .cloned()
            .collect();
        if newer.is_empty() { None } else { Some(newer) }
    }

    fn open_realtime_searcher(&self) {
        self.inner.lock().realtime_gen += 1;
    }

    fn pre_commit(&self, _cmd: &CommitCommand) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.pre_commits += 1;
        Ok(())
    }

    fn post_commit(&self, _cmd: &CommitCommand) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.post_commits += 1;
        // The commit captured everything appended so far.
        inner.uncommitted = 0;
        Ok(())
    }

    fn pre_soft_commit(&self, _cmd: &CommitCommand) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.pre_soft_commits += 1;
        Ok(())
    }

    fn post_soft_commit(&self, _cmd: &CommitCommand) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.post_soft_commits += 1;
        Ok(())
    }

    fn has_uncommitted_changes(&self) -> bool {
        self.inner.lock().uncommitted > 0
    }

    fn state(&self) -> LogState {
        self.inner.lock().state
    }

    fn close(&self, cap_files: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.last_close_capped = Some(cap_files);
        Ok(())
    }
}
