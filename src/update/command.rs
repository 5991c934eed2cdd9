//! Update command types consumed by the coordinator.
//!
//! Commands are constructed by the ingestion layer, handed to the coordinator
//! once, and not retained.

use serde::{Deserialize, Serialize};

use crate::data::Document;
use crate::engine::IndexSnapshot;
use crate::query::Term;

/// Version carried by an administrative "clear everything" delete: a
/// match-all delete with this version bypasses version checks and empties
/// both the engine and the log.
pub const DELETE_ALL_VERSION: i64 = -i64::MAX;

/// Command flag bits.
pub mod flags {
    /// Skip autocommit bookkeeping for this command.
    pub const IGNORE_AUTOCOMMIT: u32 = 1 << 0;

    /// Command is being replayed from the log.
    pub const REPLAY: u32 = 1 << 1;

    /// Command arrived while the log was buffering.
    pub const BUFFERING: u32 = 1 << 2;
}

/// Add (or overwrite) a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCommand {
    /// The document payload. For block adds this is the parent.
    pub doc: Document,

    /// Child documents of a block add. The block is indexed contiguously with
    /// the parent last.
    #[serde(default)]
    pub children: Vec<Document>,

    /// Explicit update term overriding the unique-key term, used by dedup
    /// post-processors.
    #[serde(default)]
    pub update_term: Option<Term>,

    /// Version for ordering; `0` means unversioned.
    pub version: i64,

    /// Request a commit within this many milliseconds; `-1` means unset.
    pub commit_within: i64,

    /// Replace existing documents with the same unique key.
    pub overwrite: bool,

    /// Update doc values in place instead of reindexing.
    pub in_place_update: bool,

    /// Flag bits; see [`flags`].
    pub flags: u32,
}

impl AddCommand {
    /// Create an add command with default settings (overwrite on, no
    /// commit-within).
    pub fn new(doc: Document) -> Self {
        AddCommand {
            doc,
            children: Vec::new(),
            update_term: None,
            version: 0,
            commit_within: -1,
            overwrite: true,
            in_place_update: false,
            flags: 0,
        }
    }

    /// Set the command version.
    pub fn version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    /// Request a commit within `ms` milliseconds.
    pub fn commit_within(mut self, ms: i64) -> Self {
        self.commit_within = ms;
        self
    }

    /// Set the overwrite policy.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Attach child documents, turning this into a block add.
    pub fn children(mut self, children: Vec<Document>) -> Self {
        self.children = children;
        self
    }

    /// Set an explicit update term.
    pub fn update_term(mut self, term: Term) -> Self {
        self.update_term = Some(term);
        self
    }

    /// Set flag bits.
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Whether this is a block (parent/children) add.
    pub fn is_block(&self) -> bool {
        !self.children.is_empty()
    }

    /// Whether autocommit bookkeeping is suppressed for this command.
    pub fn ignores_autocommit(&self) -> bool {
        self.flags & flags::IGNORE_AUTOCOMMIT != 0
    }

    /// The documents of a block add in index order, parent last.
    pub fn block_documents(&self) -> Vec<Document> {
        let mut docs = self.children.clone();
        docs.push(self.doc.clone());
        docs
    }

    /// The document id in printable form, for error messages.
    pub fn printable_id(&self) -> String {
        match (&self.doc.id, self.doc.get("id").and_then(|v| v.as_text())) {
            (Some(id), _) => id.clone(),
            (None, Some(id)) => id.to_string(),
            (None, None) => "(null)".to_string(),
        }
    }
}

/// Delete a document by unique key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteByIdCommand {
    pub id: String,
    pub version: i64,
    pub commit_within: i64,
    pub flags: u32,
}

impl DeleteByIdCommand {
    /// Create a delete-by-id command.
    pub fn new(id: impl Into<String>) -> Self {
        DeleteByIdCommand {
            id: id.into(),
            version: 0,
            commit_within: -1,
            flags: 0,
        }
    }
}

/// Delete documents matching a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteByQueryCommand {
    pub query: String,
    pub version: i64,
    pub commit_within: i64,
    pub flags: u32,
}

impl DeleteByQueryCommand {
    /// Create a delete-by-query command.
    pub fn new(query: impl Into<String>) -> Self {
        DeleteByQueryCommand {
            query: query.into(),
            version: 0,
            commit_within: -1,
            flags: 0,
        }
    }
}

/// Commit pending changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitCommand {
    /// Visibility-only commit: open a new view without a durable engine
    /// commit.
    pub soft_commit: bool,

    /// Block the caller until the new searcher is registered.
    pub wait_searcher: bool,

    /// Open a registered searcher as part of the commit.
    pub open_searcher: bool,

    /// Force-merge the index before committing.
    pub optimize: bool,

    /// Merge segments with enough deletions before committing.
    pub expunge_deletes: bool,

    /// Segment target for optimize.
    pub max_optimize_segments: u32,

    /// Run only the prepare phase of a two-phase commit.
    pub prepare_commit: bool,
}

impl CommitCommand {
    /// A hard (durable) commit.
    pub fn hard() -> Self {
        CommitCommand {
            soft_commit: false,
            wait_searcher: true,
            open_searcher: true,
            optimize: false,
            expunge_deletes: false,
            max_optimize_segments: 1,
            prepare_commit: false,
        }
    }

    /// A soft (visibility-only) commit.
    pub fn soft() -> Self {
        CommitCommand {
            soft_commit: true,
            ..CommitCommand::hard()
        }
    }
}

/// Discard all uncommitted changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackCommand;

/// Merge external index snapshots into this index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeCommand {
    pub sources: Vec<IndexSnapshot>,
}

impl MergeCommand {
    /// Create a merge command over source snapshots.
    pub fn new(sources: Vec<IndexSnapshot>) -> Self {
        MergeCommand { sources }
    }
}

/// Split the committed index state into target shards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitCommand {
    /// Target paths for the split pieces.
    pub target_paths: Vec<String>,
}

impl SplitCommand {
    /// Create a split command with target paths.
    pub fn new(target_paths: Vec<String>) -> Self {
        SplitCommand { target_paths }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_command_defaults() {
        let cmd = AddCommand::new(Document::new_with_id("a"));
        assert!(cmd.overwrite);
        assert_eq!(cmd.commit_within, -1);
        assert_eq!(cmd.version, 0);
        assert!(!cmd.is_block());
        assert!(!cmd.ignores_autocommit());
    }

    #[test]
    fn test_printable_id() {
        let cmd = AddCommand::new(Document::new_with_id("a"));
        assert_eq!(cmd.printable_id(), "a");

        let cmd = AddCommand::new(Document::new().add_keyword("id", "b"));
        assert_eq!(cmd.printable_id(), "b");

        let cmd = AddCommand::new(Document::new());
        assert_eq!(cmd.printable_id(), "(null)");
    }

    #[test]
    fn test_block_documents_parent_last() {
        let cmd = AddCommand::new(Document::new_with_id("parent"))
            .children(vec![Document::new_with_id("c1"), Document::new_with_id("c2")]);
        assert!(cmd.is_block());

        let docs = cmd.block_documents();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[2].id.as_deref(), Some("parent"));
    }

    #[test]
    fn test_commit_command_constructors() {
        let hard = CommitCommand::hard();
        assert!(!hard.soft_commit);
        assert!(hard.open_searcher);
        assert!(hard.wait_searcher);

        let soft = CommitCommand::soft();
        assert!(soft.soft_commit);
        assert!(soft.open_searcher);
    }

    #[test]
    fn test_ignore_autocommit_flag() {
        let cmd =
            AddCommand::new(Document::new_with_id("a")).flags(flags::IGNORE_AUTOCOMMIT);
        assert!(cmd.ignores_autocommit());
    }
}
