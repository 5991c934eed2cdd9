//! Index engine abstraction.
//!
//! The coordinator drives a mutable index writer through the [`IndexEngine`]
//! trait: document mutations, segment merges, and the commit/prepare/rollback
//! lifecycle. Implementations support concurrent mutation internally, so all
//! methods take `&self`.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::data::Document;
use crate::error::Result;
use crate::query::{Query, Term};
use crate::update::command::SplitCommand;

/// Commit metadata stamped onto the engine's commit point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitMeta {
    /// Wall-clock time the commit was issued.
    pub commit_time: chrono::DateTime<chrono::Utc>,
}

impl CommitMeta {
    /// Commit metadata stamped with the current time.
    pub fn now() -> Self {
        CommitMeta {
            commit_time: chrono::Utc::now(),
        }
    }
}

/// A read-only snapshot of an external index, in engine-addable form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub docs: Vec<Document>,
}

impl IndexSnapshot {
    /// Create a snapshot from a document set.
    pub fn new(docs: Vec<Document>) -> Self {
        IndexSnapshot { docs }
    }

    /// Whether the snapshot holds no documents.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// A mutable index writer.
///
/// Mutations are buffered until [`commit`](IndexEngine::commit) makes them
/// part of the committed state, or [`rollback`](IndexEngine::rollback)
/// discards them.
pub trait IndexEngine: Send + Sync + std::fmt::Debug {
    /// Append a document; duplicate ids are permitted.
    fn add_document(&self, doc: Document) -> Result<()>;

    /// Append a block of documents that must stay contiguous (parent last).
    fn add_document_block(&self, docs: Vec<Document>) -> Result<()>;

    /// Atomically delete documents matching `term` and add `doc`.
    fn update_document(&self, term: &Term, doc: Document) -> Result<()>;

    /// Atomically delete documents matching `term` and add a block.
    fn update_document_block(&self, term: &Term, docs: Vec<Document>) -> Result<()>;

    /// Update stored field values in place on documents matching `term`,
    /// without reindexing them.
    fn update_doc_values(&self, term: &Term, doc: Document) -> Result<()>;

    /// Delete documents matching a term.
    fn delete_by_term(&self, term: &Term) -> Result<()>;

    /// Delete documents matching a query.
    fn delete_by_query(&self, query: &Query) -> Result<()>;

    /// Delete every document.
    fn delete_all(&self) -> Result<()>;

    /// Add externally built segments to this index.
    fn add_index_segments(&self, segments: Vec<IndexSnapshot>) -> Result<()>;

    /// Merge down to at most `max_segments` segments.
    fn force_merge(&self, max_segments: u32) -> Result<()>;

    /// Merge segments carrying enough deletions to be worth rewriting.
    fn force_merge_deletes(&self) -> Result<()>;

    /// Whether the writer holds changes not yet captured by a commit.
    fn has_uncommitted_changes(&self) -> bool;

    /// Stamp metadata onto the next commit point.
    fn set_commit_meta(&self, meta: CommitMeta);

    /// First phase of a two-phase commit.
    fn prepare_commit(&self) -> Result<()>;

    /// Commit buffered changes to the committed state.
    fn commit(&self) -> Result<()>;

    /// Discard buffered changes, restoring the last committed state.
    fn rollback(&self) -> Result<()>;

    /// Close the writer and release its resources.
    fn close(&self) -> Result<()>;
}

/// External splitter handed an already-committed index state.
pub trait IndexSplitter: Send + Sync {
    fn split(&self, cmd: &SplitCommand) -> Result<()>;
}
