//! The update coordinator.
//!
//! [`UpdateCoordinator`] receives update commands, applies them to the index
//! engine, appends them to the update log in the correct order, and drives the
//! per-policy commit trackers. The ordering rule throughout: a log append for
//! a mutation never precedes the mutation's successful application to the
//! engine, so everything a particular log generation holds was definitely
//! committed with it.

use std::sync::{Arc, Weak};

use log::{debug, error, info, warn};
use parking_lot::RwLock;

use crate::config::UpdateConfig;
use crate::engine::{CommitMeta, IndexSplitter};
use crate::error::{ArnicaError, Result};
use crate::query::{self, Query, Term};
use crate::state::{SearcherWarmup, SharedCoreState, WriterLease};
use crate::update::command::{
    AddCommand, CommitCommand, DELETE_ALL_VERSION, DeleteByIdCommand, DeleteByQueryCommand,
    MergeCommand, RollbackCommand, SplitCommand,
};
use crate::update::stats::{UpdateStats, UpdateStatsSnapshot};
use crate::update::tracker::{CommitFn, CommitTracker};
use crate::wal::{DbqRecord, LogState, UpdateLog};

/// Callbacks invoked after commit lifecycle events.
pub trait CommitListener: Send + Sync {
    fn post_commit(&self) {}
    fn post_soft_commit(&self) {}
    fn post_optimize(&self) {}
}

/// Field a block (parent/children) add updates against.
const ROOT_FIELD: &str = "_root_";

/// Coordinates the write path of one index.
pub struct UpdateCoordinator {
    config: UpdateConfig,
    core: Arc<SharedCoreState>,
    ulog: Option<Arc<dyn UpdateLog>>,
    commit_tracker: CommitTracker,
    soft_commit_tracker: CommitTracker,
    stats: UpdateStats,
    listeners: RwLock<Vec<Arc<dyn CommitListener>>>,
}

impl UpdateCoordinator {
    /// Create a coordinator over shared core state and an optional update
    /// log.
    pub fn new(
        config: UpdateConfig,
        core: Arc<SharedCoreState>,
        ulog: Option<Arc<dyn UpdateLog>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<UpdateCoordinator>| {
            let commit_tracker = CommitTracker::new(
                "hard",
                config.auto_commit_max_docs,
                config.auto_commit_max_time_ms,
                config.auto_commit_open_searcher,
                false,
                Self::autocommit_fn(weak.clone(), config.auto_commit_open_searcher, false),
            );
            let soft_commit_tracker = CommitTracker::new(
                "soft",
                config.auto_soft_commit_max_docs,
                config.auto_soft_commit_max_time_ms,
                true,
                true,
                Self::autocommit_fn(weak.clone(), true, true),
            );

            UpdateCoordinator {
                config,
                core,
                ulog,
                commit_tracker,
                soft_commit_tracker,
                stats: UpdateStats::default(),
                listeners: RwLock::new(Vec::new()),
            }
        })
    }

    fn autocommit_fn(
        weak: Weak<UpdateCoordinator>,
        open_searcher: bool,
        soft_commit: bool,
    ) -> CommitFn {
        Box::new(move || {
            let Some(coordinator) = weak.upgrade() else {
                return;
            };
            let mut cmd = if soft_commit {
                CommitCommand::soft()
            } else {
                CommitCommand::hard()
            };
            cmd.open_searcher = open_searcher;
            cmd.wait_searcher = true;
            if let Err(err) = coordinator.commit(cmd) {
                error!("auto commit failed: {err}");
            }
        })
    }

    /// Register a commit listener.
    pub fn add_listener(&self, listener: Arc<dyn CommitListener>) {
        self.listeners.write().push(listener);
    }

    /// The coordinator configuration.
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// The hard-policy commit tracker.
    pub fn commit_tracker(&self) -> &CommitTracker {
        &self.commit_tracker
    }

    /// The soft-policy commit tracker.
    pub fn soft_commit_tracker(&self) -> &CommitTracker {
        &self.soft_commit_tracker
    }

    /// The tracker that receives every per-document autocommit event, as
    /// selected by the configured commit-within policy.
    fn driving_tracker(&self) -> &CommitTracker {
        if self.config.commit_within_soft_commit {
            &self.soft_commit_tracker
        } else {
            &self.commit_tracker
        }
    }

    // ── Adds ───────────────────────────────────────────────────────

    /// Add a document.
    ///
    /// Failures that are not already caller-facing surface as a bad request
    /// carrying the printable document id.
    pub fn add_doc(&self, cmd: AddCommand) -> Result<()> {
        let printable_id = cmd.printable_id();
        self.add_doc0(cmd).map_err(|err| match err {
            e @ (ArnicaError::BadRequest(_) | ArnicaError::Unsupported(_) | ArnicaError::Fatal(_)) => {
                e
            }
            other => ArnicaError::bad_request(format!(
                "error writing document id {printable_id} to the index; possible analysis error: {other}"
            )),
        })
    }

    fn add_doc0(&self, mut cmd: AddCommand) -> Result<()> {
        self.stats.add_commands.increment();
        self.stats.add_commands_cumulative.increment();

        // With no unique key there is nothing to overwrite against.
        if self.config.unique_key_field.is_none() {
            cmd.overwrite = false;
        }

        let result = self.apply_add(&cmd);
        match &result {
            Ok(()) => self.stats.num_docs_pending.increment(),
            Err(_) => self.stats.record_error(),
        }
        result
    }

    fn apply_add(&self, cmd: &AddCommand) -> Result<()> {
        if cmd.overwrite {
            // Deletes-by-query logged with a version newer than this add mean
            // the add arrived out of order and is born partially deleted by
            // deletes it has not seen applied yet.
            let deletes_after = match (&self.ulog, cmd.version > 0) {
                (Some(ulog), true) => ulog.delete_by_query_newer_than(cmd.version),
                _ => None,
            };

            if let Some(dbqs) = deletes_after {
                self.add_and_delete(cmd, &dbqs)?;
            } else {
                self.do_normal_update(cmd)?;
            }
        } else {
            self.allow_duplicate_update(cmd)?;
        }

        if !cmd.ignores_autocommit() {
            self.driving_tracker().added_document(cmd.commit_within);
        }

        Ok(())
    }

    fn allow_duplicate_update(&self, cmd: &AddCommand) -> Result<()> {
        let writer = self.core.acquire_writer();
        if cmd.is_block() {
            writer.add_document_block(cmd.block_documents())?;
        } else {
            writer.add_document(cmd.doc.clone())?;
        }
        if let Some(ulog) = &self.ulog {
            ulog.add(cmd, false)?;
        }
        Ok(())
    }

    fn do_normal_update(&self, cmd: &AddCommand) -> Result<()> {
        let id_term = self.id_term(cmd)?;

        // An explicit override term comes from dedup post-processing;
        // updating against it can leave an older copy behind under the same
        // id, so a guard delete keeps ids unique.
        let (update_term, guard_delete) = match &cmd.update_term {
            Some(term) => (term.clone(), true),
            None => (id_term.clone(), false),
        };

        let writer = self.core.acquire_writer();
        self.update_doc_or_doc_values(cmd, &writer, &update_term)?;

        if guard_delete {
            let guard = Query::Boolean {
                must: vec![Query::Term(id_term)],
                must_not: vec![Query::Term(update_term)],
            };
            writer.delete_by_query(&guard)?;
        }

        // Log after the engine accepted the mutation: a logged add is an
        // applied add, and a commit sneaking in between captures a state the
        // log agrees with.
        if let Some(ulog) = &self.ulog {
            ulog.add(cmd, false)?;
        }
        Ok(())
    }

    fn add_and_delete(&self, cmd: &AddCommand, deletes_after: &[DbqRecord]) -> Result<()> {
        info!(
            "reordered deletes-by-query detected: {} newer than version {}",
            deletes_after.len(),
            cmd.version
        );

        let mut dbq_queries = Vec::with_capacity(deletes_after.len());
        for dbq in deletes_after {
            let mut del = DeleteByQueryCommand::new(dbq.query.clone());
            del.version = -dbq.version;
            match self.parse_delete_query(&del) {
                Ok(q) => dbq_queries.push(q),
                Err(err) => error!("failed to parse reordered delete query {:?}: {err}", dbq.query),
            }
        }

        let id_term = self.id_term(cmd)?;
        let writer = self.core.acquire_writer();

        // One critical section for the add, the re-applied deletes, and the
        // log append: a concurrent commit's searcher swap must not observe
        // half of this sequence.
        let _update_guard = self.core.update_lock().lock();
        self.update_doc_or_doc_values(cmd, &writer, &id_term)?;
        for q in &dbq_queries {
            writer.delete_by_query(q)?;
        }
        if let Some(ulog) = &self.ulog {
            ulog.add(cmd, true)?;
        }
        Ok(())
    }

    fn id_term(&self, cmd: &AddCommand) -> Result<Term> {
        let field = if cmd.is_block() {
            ROOT_FIELD.to_string()
        } else {
            self.config.unique_key_field.clone().ok_or_else(|| {
                ArnicaError::bad_request("overwrite requires a unique key field")
            })?
        };
        let id = cmd
            .doc
            .id
            .clone()
            .or_else(|| {
                self.config
                    .unique_key_field
                    .as_deref()
                    .and_then(|key| cmd.doc.get(key))
                    .and_then(|v| v.as_text().map(str::to_string))
            })
            .ok_or_else(|| {
                ArnicaError::bad_request("document is missing its unique key value")
            })?;
        Ok(Term::new(field, id))
    }

    fn update_doc_or_doc_values(
        &self,
        cmd: &AddCommand,
        writer: &WriterLease,
        update_term: &Term,
    ) -> Result<()> {
        if cmd.in_place_update {
            // In-place updates carry only the unique key plus updatable
            // fields; the key itself must not be rewritten.
            let mut doc = cmd.doc.clone();
            if let Some(key) = &self.config.unique_key_field {
                doc.fields.remove(key);
            }
            debug!("update_doc_values({update_term:?})");
            writer.update_doc_values(update_term, doc)
        } else if cmd.is_block() {
            debug!("update_document_block({update_term:?})");
            writer.update_document_block(update_term, cmd.block_documents())
        } else {
            debug!("update_document({update_term:?})");
            writer.update_document(update_term, cmd.doc.clone())
        }
    }

    // ── Deletes ────────────────────────────────────────────────────

    /// Delete a document by unique key.
    ///
    /// Does not report how many documents matched; the engine cannot always
    /// answer that cheaply.
    pub fn delete(&self, cmd: DeleteByIdCommand) -> Result<()> {
        self.stats.delete_by_id_commands.increment();
        self.stats.delete_by_id_commands_cumulative.increment();

        let field = self
            .config
            .unique_key_field
            .clone()
            .ok_or_else(|| ArnicaError::bad_request("delete by id requires a unique key field"))?;
        let term = Term::new(field, cmd.id.clone());

        {
            let writer = self.core.acquire_writer();
            writer.delete_by_term(&term)?;
        }

        if let Some(ulog) = &self.ulog {
            ulog.delete(&cmd)?;
        }

        self.update_delete_trackers(cmd.commit_within, cmd.flags);
        Ok(())
    }

    /// Delete documents matching a query.
    pub fn delete_by_query(&self, cmd: DeleteByQueryCommand) -> Result<()> {
        self.stats.delete_by_query_commands.increment();
        self.stats.delete_by_query_commands_cumulative.increment();

        let result = self.apply_delete_by_query(&cmd);
        if result.is_err() {
            self.stats.record_error();
        }
        result
    }

    fn apply_delete_by_query(&self, cmd: &DeleteByQueryCommand) -> Result<()> {
        let q = self.parse_delete_query(cmd)?;
        let del_all = q.is_match_all();

        // Administrative reset: wipe the engine and the log, no version
        // checks, no tracker bookkeeping.
        if del_all && cmd.version == DELETE_ALL_VERSION {
            let _guard = self.core.update_lock().lock();
            self.delete_all()?;
            if let Some(ulog) = &self.ulog {
                ulog.delete_all()?;
            }
            return Ok(());
        }

        {
            // Serialized against the searcher-reopen phase of a commit: the
            // delete invalidates any open realtime view, and the log's cache
            // clearing must not land between the pre-soft and post-soft
            // hooks. The view refresh runs first so an already-open
            // log-backed view and the engine agree before the delete applies.
            let _guard = self.core.update_lock().lock();
            if let Some(ulog) = &self.ulog {
                ulog.open_realtime_searcher();
            }

            if del_all {
                self.delete_all()?;
            } else {
                let writer = self.core.acquire_writer();
                writer.delete_by_query(&q)?;
            }

            if let Some(ulog) = &self.ulog {
                ulog.delete_by_query(cmd)?;
            }
        }

        self.update_delete_trackers(cmd.commit_within, cmd.flags);
        Ok(())
    }

    fn parse_delete_query(&self, cmd: &DeleteByQueryCommand) -> Result<Query> {
        let q = query::parse(&cmd.query)?;

        // Exclude documents whose version field already exceeds the delete's
        // own version: a stale or reordered delete must not take out a
        // concurrently arrived newer write. Formulated as MUST_NOT so
        // documents without a version field still match.
        if self.ulog.is_some() && cmd.version != 0 && cmd.version != DELETE_ALL_VERSION {
            let floor = cmd.version.abs();
            return Ok(Query::Boolean {
                must: vec![q],
                must_not: vec![Query::at_least(self.config.version_field.clone(), floor)],
            });
        }
        Ok(q)
    }

    fn delete_all(&self) -> Result<()> {
        info!("removing all documents from the index");
        let writer = self.core.acquire_writer();
        writer.delete_all()
    }

    /// Administrative surface: empty the engine and the log.
    pub fn clear_index(&self) -> Result<()> {
        self.delete_all()?;
        if let Some(ulog) = &self.ulog {
            ulog.delete_all()?;
        }
        Ok(())
    }

    fn update_delete_trackers(&self, commit_within: i64, cmd_flags: u32) {
        if cmd_flags & crate::update::command::flags::IGNORE_AUTOCOMMIT != 0 {
            return;
        }
        self.driving_tracker().deleted_document(commit_within);

        if self.commit_tracker.time_upper_bound_ms() > 0 {
            self.commit_tracker
                .schedule_commit_within(self.commit_tracker.time_upper_bound_ms() as u64);
        }
        if self.soft_commit_tracker.time_upper_bound_ms() > 0 {
            self.soft_commit_tracker
                .schedule_commit_within(self.soft_commit_tracker.time_upper_bound_ms() as u64);
        }
    }

    // ── Merge ──────────────────────────────────────────────────────

    /// Merge external index snapshots into this index. Returns `1` if
    /// anything was merged, `0` for empty input.
    pub fn merge_indexes(&self, cmd: MergeCommand) -> Result<u64> {
        self.stats.merge_indexes_commands.increment();
        info!("start merge_indexes: {} source snapshots", cmd.sources.len());

        let merged = if cmd.sources.is_empty() {
            0
        } else {
            let writer = self.core.acquire_writer();
            writer.add_index_segments(cmd.sources)?;
            1
        };
        info!("end_merge_indexes");

        // Merged segments bypass the per-document counters, so elapsed time
        // is the only autocommit trigger that can apply.
        if merged == 1 && self.commit_tracker.time_upper_bound_ms() > 0 {
            self.commit_tracker
                .schedule_commit_within(self.commit_tracker.time_upper_bound_ms() as u64);
        } else if merged == 1 && self.soft_commit_tracker.time_upper_bound_ms() > 0 {
            self.soft_commit_tracker
                .schedule_commit_within(self.soft_commit_tracker.time_upper_bound_ms() as u64);
        }

        Ok(merged)
    }

    // ── Commit / rollback ──────────────────────────────────────────

    /// Run the prepare phase of a two-phase commit: stamp commit metadata and
    /// prepare the engine, touching neither the log nor the trackers.
    pub fn prepare_commit(&self, cmd: &CommitCommand) -> Result<()> {
        info!("start prepare_commit {cmd:?}");
        let result: Result<()> = (|| {
            let writer = self.core.acquire_writer();
            writer.set_commit_meta(CommitMeta::now());
            writer.prepare_commit()
        })();
        info!("end_prepare_commit");
        if result.is_err() {
            self.stats.record_error();
        }
        result
    }

    /// Commit pending changes according to the command.
    pub fn commit(&self, cmd: CommitCommand) -> Result<()> {
        if cmd.prepare_commit {
            return self.prepare_commit(&cmd);
        }

        if cmd.optimize {
            self.stats.optimize_commands.increment();
        } else if cmd.soft_commit {
            self.stats.soft_commit_commands.increment();
        } else {
            self.stats.commit_commands.increment();
            if cmd.expunge_deletes {
                self.stats.expunge_delete_commands.increment();
            }
        }

        let mut wait_searcher: Option<SearcherWarmup> = None;

        // Only one hard commit (or writer-lifecycle operation) at a time.
        let commit_guard = (!cmd.soft_commit).then(|| self.core.commit_lock().lock());
        let result = self.commit_body(&cmd, &mut wait_searcher);
        drop(commit_guard);

        // The short-window counters reset whenever a commit attempt
        // finishes, success or not.
        self.stats.add_commands.reset();
        self.stats.delete_by_id_commands.reset();
        self.stats.delete_by_query_commands.reset();
        if result.is_err() {
            self.stats.record_error();
        }

        // Block for searcher registration only after every lock is gone, so
        // a slow warm-up never stalls unrelated writers.
        if let Some(warmup) = wait_searcher {
            warmup.wait();
        }

        result
    }

    fn commit_body(
        &self,
        cmd: &CommitCommand,
        wait_searcher: &mut Option<SearcherWarmup>,
    ) -> Result<()> {
        info!("start {cmd:?}");

        // Cancel weaker pending work before the commit itself executes.
        if cmd.open_searcher {
            self.soft_commit_tracker.cancel_pending_commit();
        }
        if !cmd.soft_commit && (cmd.open_searcher || !self.commit_tracker.open_searcher()) {
            // A pending hard autocommit only yields to a commit of equal or
            // greater strength: if the autocommit would open a searcher,
            // this commit must open one too.
            self.commit_tracker.cancel_pending_commit();
        }

        {
            let writer = self.core.acquire_writer();

            if cmd.optimize {
                if cmd.max_optimize_segments == 1 {
                    warn!("starting optimize... reading and rewriting the entire index");
                } else {
                    warn!(
                        "starting optimize... rewriting a large part of the index, reducing to {} segments",
                        cmd.max_optimize_segments
                    );
                }
                writer.force_merge(cmd.max_optimize_segments)?;
            } else if cmd.expunge_deletes {
                warn!("starting expunge_deletes... rewriting segments with enough deletions");
                writer.force_merge_deletes()?;
            }

            if !cmd.soft_commit {
                {
                    // The log's pre-commit hook must not land between another
                    // commit's pre-soft and post-soft hooks.
                    let _guard = self.core.update_lock().lock();
                    if let Some(ulog) = &self.ulog {
                        ulog.pre_commit(cmd)?;
                    }
                }

                if writer.has_uncommitted_changes() {
                    writer.set_commit_meta(CommitMeta::now());
                    writer.commit()?;
                } else {
                    info!("no uncommitted changes; skipping engine commit");
                }

                self.stats.num_docs_pending.reset();
                for listener in self.listeners.read().iter() {
                    listener.post_commit();
                }
            }
        }

        if cmd.optimize {
            for listener in self.listeners.read().iter() {
                listener.post_optimize();
            }
        }

        if cmd.soft_commit {
            {
                let _guard = self.core.update_lock().lock();
                if let Some(ulog) = &self.ulog {
                    ulog.pre_soft_commit(cmd)?;
                }
                let warmup = self.core.open_registered_searcher();
                if cmd.wait_searcher {
                    *wait_searcher = Some(warmup);
                }
                if let Some(ulog) = &self.ulog {
                    ulog.post_soft_commit(cmd)?;
                }
            }
            for listener in self.listeners.read().iter() {
                listener.post_soft_commit();
            }
        } else {
            {
                let _guard = self.core.update_lock().lock();
                if let Some(ulog) = &self.ulog {
                    ulog.pre_soft_commit(cmd)?;
                }
                if cmd.open_searcher {
                    let warmup = self.core.open_registered_searcher();
                    if cmd.wait_searcher {
                        *wait_searcher = Some(warmup);
                    }
                } else {
                    // Refresh the realtime view without registering a
                    // searcher for client queries; realtime-get and version
                    // checks still need to see the committed state.
                    self.core.open_realtime_searcher();
                }
                if let Some(ulog) = &self.ulog {
                    ulog.post_soft_commit(cmd)?;
                }
            }
            // post_commit signals that a new searcher is visible, so it
            // stays outside the update lock.
            if let Some(ulog) = &self.ulog {
                ulog.post_commit(cmd)?;
            }
        }

        if cmd.soft_commit {
            self.soft_commit_tracker.did_commit();
        } else {
            self.commit_tracker.did_commit();
        }

        info!("end_commit_flush");
        Ok(())
    }

    /// Discard all uncommitted changes.
    ///
    /// Rejected when the index participates in distributed replica
    /// coordination; that mode needs log-consistent rollback semantics this
    /// path does not provide.
    pub fn rollback(&self, _cmd: RollbackCommand) -> Result<()> {
        if self.config.distributed {
            return Err(ArnicaError::unsupported(
                "rollback is not supported for replica-coordinated indexes",
            ));
        }

        self.stats.rollback_commands.increment();

        let result: Result<()> = (|| {
            info!("start rollback");
            self.rollback_writer()?;
            self.commit_tracker.did_rollback();
            self.soft_commit_tracker.did_rollback();
            info!("end_rollback");
            Ok(())
        })();

        // The windowed counts were folded into the cumulative totals when the
        // commands ran; rolling back subtracts them out again.
        self.stats
            .add_commands_cumulative
            .sub(self.stats.add_commands.sum_then_reset());
        self.stats
            .delete_by_id_commands_cumulative
            .sub(self.stats.delete_by_id_commands.sum_then_reset());
        self.stats
            .delete_by_query_commands_cumulative
            .sub(self.stats.delete_by_query_commands.sum_then_reset());
        if result.is_err() {
            self.stats.record_error();
        }
        result
    }

    fn rollback_writer(&self) -> Result<()> {
        self.stats.num_docs_pending.reset();
        self.core.rollback_index_writer()
    }

    /// Retire the current index writer, optionally discarding its
    /// uncommitted state first.
    pub fn new_index_writer(&self, rollback: bool) -> Result<()> {
        self.core.new_index_writer(rollback)
    }

    // ── Close / split ──────────────────────────────────────────────

    /// Final flush when the shared writer is being retired.
    ///
    /// Bypasses the full commit path: re-entering `commit()` would fire the
    /// listener chain during shutdown. Fatal errors are rethrown immediately;
    /// other failures are logged and suppressed so the close sequence still
    /// closes the log and the engine.
    pub fn close_writer(&self) -> Result<()> {
        let _commit_guard = self.core.commit_lock().lock();
        let writer = self.core.acquire_writer();

        if !self.config.commit_on_close {
            writer.rollback()?;
            // Leave the log files uncapped; capping deletes files some
            // platforms still hold open.
            if let Some(ulog) = &self.ulog {
                ulog.close(false)?;
            }
            writer.close()?;
            return Ok(());
        }

        let try_to_commit = match &self.ulog {
            Some(ulog) => ulog.has_uncommitted_changes() && ulog.state() == LogState::Active,
            None => false,
        };

        if try_to_commit {
            info!("committing on index writer close");
            let mut cmd = CommitCommand::hard();
            cmd.open_searcher = false;
            cmd.wait_searcher = false;

            let result: Result<()> = (|| {
                if let Some(ulog) = &self.ulog {
                    let _guard = self.core.update_lock().lock();
                    ulog.pre_commit(&cmd)?;
                }
                writer.set_commit_meta(CommitMeta::now());
                writer.commit()?;
                if let Some(ulog) = &self.ulog {
                    let _guard = self.core.update_lock().lock();
                    ulog.post_commit(&cmd)?;
                }
                Ok(())
            })();
            if let Err(err) = result {
                if err.is_fatal() {
                    return Err(err);
                }
                error!("error in final commit: {err}");
            }
        }

        if let Some(ulog) = &self.ulog {
            if let Err(err) = ulog.close(false) {
                if err.is_fatal() {
                    return Err(err);
                }
                error!("error closing log files: {err}");
            }
        }

        writer.close()?;
        Ok(())
    }

    /// Split the index: force a non-opening, non-waiting commit so the
    /// committed state is authoritative, then hand it to the splitter.
    pub fn split(&self, cmd: &SplitCommand, splitter: &dyn IndexSplitter) -> Result<()> {
        let mut commit_cmd = CommitCommand::hard();
        commit_cmd.open_searcher = false;
        commit_cmd.wait_searcher = false;
        self.commit(commit_cmd)?;

        splitter.split(cmd)
    }

    /// Shut down autocommit scheduling. Does not flush; see
    /// [`close_writer`](Self::close_writer).
    pub fn close(&self) {
        debug!("closing update coordinator");
        self.commit_tracker.close();
        self.soft_commit_tracker.close();
        self.stats.num_docs_pending.reset();
    }

    // ── Statistics ─────────────────────────────────────────────────

    /// Snapshot of the statistics surface.
    pub fn statistics(&self) -> UpdateStatsSnapshot {
        UpdateStatsSnapshot {
            adds: self.stats.add_commands.sum(),
            cumulative_adds: self.stats.add_commands_cumulative.sum(),
            deletes_by_id: self.stats.delete_by_id_commands.sum(),
            cumulative_deletes_by_id: self.stats.delete_by_id_commands_cumulative.sum(),
            deletes_by_query: self.stats.delete_by_query_commands.sum(),
            cumulative_deletes_by_query: self.stats.delete_by_query_commands_cumulative.sum(),
            errors: self.stats.num_errors.sum(),
            cumulative_errors: self.stats.num_errors_cumulative.sum(),
            commits: self.stats.commit_commands.sum(),
            soft_commits: self.stats.soft_commit_commands.sum(),
            optimizes: self.stats.optimize_commands.sum(),
            expunge_deletes: self.stats.expunge_delete_commands.sum(),
            merges: self.stats.merge_indexes_commands.sum(),
            rollbacks: self.stats.rollback_commands.sum(),
            docs_pending: self.stats.num_docs_pending.sum(),
            autocommit_max_docs: self.commit_tracker.docs_upper_bound(),
            autocommit_max_time_ms: self.commit_tracker.time_upper_bound_ms(),
            autocommits: self.commit_tracker.commit_count(),
            soft_autocommit_max_docs: self.soft_commit_tracker.docs_upper_bound(),
            soft_autocommit_max_time_ms: self.soft_commit_tracker.time_upper_bound_ms(),
            soft_autocommits: self.soft_commit_tracker.commit_count(),
        }
    }
}
