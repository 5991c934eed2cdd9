//! In-memory index engine.
//!
//! [`MemoryIndexEngine`] keeps two views of the document set: the live view
//! every mutation edits, and the committed view a commit captures. Rollback
//! restores the live view from the committed one. Query evaluation delegates
//! to [`Query::matches`].

use ahash::AHashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::data::Document;
use crate::engine::{CommitMeta, IndexEngine, IndexSnapshot};
use crate::error::{ArnicaError, Result};
use crate::query::{Query, Term};

#[derive(Debug, Default)]
struct EngineInner {
    live: AHashMap<u64, Document>,
    committed: AHashMap<u64, Document>,
    next_doc_id: u64,
    dirty: bool,
    prepared: bool,
    commit_meta: Option<CommitMeta>,
    last_commit_meta: Option<CommitMeta>,
    commits: u64,
    force_merges: u64,
    merge_deletes: u64,
    closed: bool,
}

impl EngineInner {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ArnicaError::index("index writer is closed"));
        }
        Ok(())
    }

    fn insert(&mut self, mut doc: Document) {
        if doc.id.is_none() {
            doc.id = Some(Uuid::new_v4().to_string());
        }
        self.next_doc_id += 1;
        self.live.insert(self.next_doc_id, doc);
        self.dirty = true;
    }

    fn remove_matching(&mut self, query: &Query) {
        self.live.retain(|_, doc| !query.matches(doc));
        self.dirty = true;
    }
}

/// In-memory [`IndexEngine`] implementation.
#[derive(Debug, Default)]
pub struct MemoryIndexEngine {
    inner: RwLock<EngineInner>,
}

impl MemoryIndexEngine {
    /// Create a new empty engine.
    pub fn new() -> Self {
        MemoryIndexEngine::default()
    }

    /// Documents in the live (uncommitted) view, ordered by internal id.
    pub fn live_docs(&self) -> Vec<Document> {
        Self::ordered(&self.inner.read().live)
    }

    /// Documents in the committed view, ordered by internal id.
    pub fn committed_docs(&self) -> Vec<Document> {
        Self::ordered(&self.inner.read().committed)
    }

    /// Number of documents in the live view.
    pub fn num_live_docs(&self) -> usize {
        self.inner.read().live.len()
    }

    /// Number of documents in the committed view.
    pub fn num_committed_docs(&self) -> usize {
        self.inner.read().committed.len()
    }

    /// Number of commits applied so far.
    pub fn commit_count(&self) -> u64 {
        self.inner.read().commits
    }

    /// Counts of `force_merge` and `force_merge_deletes` calls.
    pub fn merge_counts(&self) -> (u64, u64) {
        let inner = self.inner.read();
        (inner.force_merges, inner.merge_deletes)
    }

    /// Metadata captured by the most recent commit.
    pub fn last_commit_meta(&self) -> Option<CommitMeta> {
        self.inner.read().last_commit_meta.clone()
    }

    /// Whether a prepare-commit is outstanding.
    pub fn is_prepared(&self) -> bool {
        self.inner.read().prepared
    }

    /// Whether the writer has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    fn ordered(docs: &AHashMap<u64, Document>) -> Vec<Document> {
        let mut entries: Vec<(&u64, &Document)> = docs.iter().collect();
        entries.sort_by_key(|(id, _)| **id);
        entries.into_iter().map(|(_, doc)| doc.clone()).collect()
    }
}

impl IndexEngine for MemoryIndexEngine {
    fn add_document(&self, doc: Document) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.insert(doc);
        Ok(())
    }

    fn add_document_block(&self, docs: Vec<Document>) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        for doc in docs {
            inner.insert(doc);
        }
        Ok(())
    }

    fn update_document(&self, term: &Term, doc: Document) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.remove_matching(&Query::Term(term.clone()));
        inner.insert(doc);
        Ok(())
    }

    fn update_document_block(&self, term: &Term, docs: Vec<Document>) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.remove_matching(&Query::Term(term.clone()));
        for doc in docs {
            inner.insert(doc);
        }
        Ok(())
    }

    fn update_doc_values(&self, term: &Term, doc: Document) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        let query = Query::Term(term.clone());
        for existing in inner.live.values_mut() {
            if query.matches(existing) {
                for (name, value) in &doc.fields {
                    existing.fields.insert(name.clone(), value.clone());
                }
            }
        }
        inner.dirty = true;
        Ok(())
    }

    fn delete_by_term(&self, term: &Term) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.remove_matching(&Query::Term(term.clone()));
        Ok(())
    }

    fn delete_by_query(&self, query: &Query) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.remove_matching(query);
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.live.clear();
        inner.dirty = true;
        Ok(())
    }

    fn add_index_segments(&self, segments: Vec<IndexSnapshot>) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        for segment in segments {
            for doc in segment.docs {
                inner.insert(doc);
            }
        }
        Ok(())
    }

    fn force_merge(&self, _max_segments: u32) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.force_merges += 1;
        Ok(())
    }

    fn force_merge_deletes(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.merge_deletes += 1;
        Ok(())
    }

    fn has_uncommitted_changes(&self) -> bool {
        self.inner.read().dirty
    }

    fn set_commit_meta(&self, meta: CommitMeta) {
        self.inner.write().commit_meta = Some(meta);
    }

    fn prepare_commit(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.prepared = true;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.committed = inner.live.clone();
        inner.dirty = false;
        inner.prepared = false;
        inner.commits += 1;
        inner.last_commit_meta = inner.commit_meta.take();
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.live = inner.committed.clone();
        inner.dirty = false;
        inner.prepared = false;
        inner.commit_meta = None;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.inner.write().closed = true;
        Ok(())
    }
}
