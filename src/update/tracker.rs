//! Per-policy autocommit tracking and scheduling.
//!
//! A [`CommitTracker`] watches pending document activity and arms a deferred
//! commit against its document and time bounds. An armed deadline only ever
//! moves earlier. Cancellation is token-based: the scheduler thread re-checks
//! the generation at fire time, so a task it has already dequeued can still be
//! invalidated. Fired commits go through the coordinator's full commit
//! protocol, locks included.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error};
use parking_lot::Mutex;

/// Callback the tracker fires when an armed deadline elapses.
pub type CommitFn = Box<dyn Fn() + Send + Sync>;

/// Delay applied when the document bound trips.
const DOC_TRIGGER_DELAY_MS: u64 = 250;

#[derive(Debug, Clone, Copy)]
struct Pending {
    generation: u64,
    deadline: Instant,
}

enum SchedulerMsg {
    Arm { generation: u64, deadline: Instant },
    Shutdown,
}

#[derive(Debug, Default)]
struct Shared {
    /// Bumped on every cancellation; an armed task only fires while its
    /// generation is still current.
    generation: AtomicU64,
    pending: Mutex<Option<Pending>>,
}

/// Autocommit state for one commit policy.
pub struct CommitTracker {
    name: &'static str,
    docs_upper_bound: i64,
    time_upper_bound_ms: i64,
    open_searcher: bool,
    soft_commit: bool,
    docs_since_commit: AtomicU64,
    commit_count: AtomicU64,
    shared: Arc<Shared>,
    tx: Sender<SchedulerMsg>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for CommitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitTracker")
            .field("name", &self.name)
            .field("docs_upper_bound", &self.docs_upper_bound)
            .field("time_upper_bound_ms", &self.time_upper_bound_ms)
            .field("open_searcher", &self.open_searcher)
            .field("soft_commit", &self.soft_commit)
            .field("docs_since_commit", &self.docs_since_commit)
            .field("commit_count", &self.commit_count)
            .finish()
    }
}

impl CommitTracker {
    /// Create a tracker for one policy. Bounds `<= 0` are disabled.
    ///
    /// `on_commit` runs on the scheduler thread when an armed deadline fires;
    /// it is expected to issue a full commit matching this tracker's policy.
    pub fn new(
        name: &'static str,
        docs_upper_bound: i64,
        time_upper_bound_ms: i64,
        open_searcher: bool,
        soft_commit: bool,
        on_commit: CommitFn,
    ) -> Self {
        let shared = Arc::new(Shared::default());
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = spawn_scheduler(name, shared.clone(), rx, on_commit);

        CommitTracker {
            name,
            docs_upper_bound,
            time_upper_bound_ms,
            open_searcher,
            soft_commit,
            docs_since_commit: AtomicU64::new(0),
            commit_count: AtomicU64::new(0),
            shared,
            tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Record an added document.
    pub fn added_document(&self, commit_within_ms: i64) {
        let docs = self.docs_since_commit.fetch_add(1, Ordering::SeqCst) + 1;
        if self.docs_upper_bound > 0 && docs >= self.docs_upper_bound as u64 {
            self.schedule_commit_within(DOC_TRIGGER_DELAY_MS);
        }
        self.schedule_if_needed(commit_within_ms);
    }

    /// Record a deleted document. Deletions arm the time bounds but do not
    /// count toward the document bound.
    pub fn deleted_document(&self, commit_within_ms: i64) {
        self.schedule_if_needed(commit_within_ms);
    }

    fn schedule_if_needed(&self, commit_within_ms: i64) {
        let delay = if commit_within_ms > 0 {
            commit_within_ms
        } else {
            self.time_upper_bound_ms
        };
        if delay > 0 {
            self.schedule_commit_within(delay as u64);
        }
    }

    /// Arm a commit `delay_ms` from now. A pending deadline that is already
    /// earlier or equal wins; a scheduled commit never moves later.
    pub fn schedule_commit_within(&self, delay_ms: u64) {
        let deadline = Instant::now() + Duration::from_millis(delay_ms);
        let mut pending = self.shared.pending.lock();
        if let Some(p) = pending.as_ref() {
            if p.deadline <= deadline {
                return;
            }
        }
        let generation = self.shared.generation.load(Ordering::SeqCst);
        *pending = Some(Pending {
            generation,
            deadline,
        });
        debug!("{} autocommit armed in {delay_ms}ms", self.name);
        let _ = self.tx.send(SchedulerMsg::Arm {
            generation,
            deadline,
        });
    }

    /// Invalidate the armed commit so it cannot fire, even if the scheduler
    /// already dequeued it.
    pub fn cancel_pending_commit(&self) {
        let mut pending = self.shared.pending.lock();
        if pending.take().is_some() {
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            debug!("{} pending autocommit cancelled", self.name);
        }
    }

    /// A commit of this policy went through: reset the counter, clear any
    /// pending schedule, bump the cumulative count.
    pub fn did_commit(&self) {
        self.docs_since_commit.store(0, Ordering::SeqCst);
        self.cancel_pending_commit();
        self.commit_count.fetch_add(1, Ordering::SeqCst);
    }

    /// A rollback went through: reset the counter and clear any pending
    /// schedule.
    pub fn did_rollback(&self) {
        self.docs_since_commit.store(0, Ordering::SeqCst);
        self.cancel_pending_commit();
    }

    /// Stop the scheduler thread. Pending work is discarded.
    pub fn close(&self) {
        self.cancel_pending_commit();
        if let Some(worker) = self.worker.lock().take() {
            let _ = self.tx.send(SchedulerMsg::Shutdown);
            if worker.thread().id() == std::thread::current().id() {
                // The last owner can be dropped from the scheduler thread
                // itself, inside a fired callback; the thread exits on the
                // shutdown message without being joined.
                return;
            }
            if worker.join().is_err() {
                error!("{} autocommit scheduler panicked", self.name);
            }
        }
    }

    /// Configured document bound.
    pub fn docs_upper_bound(&self) -> i64 {
        self.docs_upper_bound
    }

    /// Configured time bound in milliseconds.
    pub fn time_upper_bound_ms(&self) -> i64 {
        self.time_upper_bound_ms
    }

    /// Whether commits of this policy open a registered searcher.
    pub fn open_searcher(&self) -> bool {
        self.open_searcher
    }

    /// Whether this tracker drives soft commits.
    pub fn soft_commit(&self) -> bool {
        self.soft_commit
    }

    /// Cumulative number of commits attributed to this policy.
    pub fn commit_count(&self) -> u64 {
        self.commit_count.load(Ordering::SeqCst)
    }

    /// Documents counted since the last commit or rollback.
    pub fn docs_since_commit(&self) -> u64 {
        self.docs_since_commit.load(Ordering::SeqCst)
    }

    /// Whether a commit is currently armed.
    pub fn has_pending(&self) -> bool {
        self.shared.pending.lock().is_some()
    }
}

impl Drop for CommitTracker {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_scheduler(
    name: &'static str,
    shared: Arc<Shared>,
    rx: Receiver<SchedulerMsg>,
    on_commit: CommitFn,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut armed: Option<(u64, Instant)> = None;
        loop {
            let msg = match armed {
                Some((generation, deadline)) => {
                    let timeout = deadline.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(timeout) {
                        Ok(msg) => msg,
                        Err(RecvTimeoutError::Timeout) => {
                            armed = None;
                            if take_if_current(&shared, generation) {
                                debug!("{name} autocommit firing");
                                on_commit();
                            }
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match rx.recv() {
                    Ok(msg) => msg,
                    Err(_) => break,
                },
            };

            match msg {
                SchedulerMsg::Arm {
                    generation,
                    deadline,
                } => armed = Some((generation, deadline)),
                SchedulerMsg::Shutdown => break,
            }
        }
    })
}

/// Clear the pending slot and report whether the task may fire. Checked under
/// the same lock `cancel_pending_commit` takes, so a cancellation that wins
/// the lock always stops the task.
fn take_if_current(shared: &Shared, generation: u64) -> bool {
    let mut pending = shared.pending.lock();
    if shared.generation.load(Ordering::SeqCst) != generation {
        return false;
    }
    match pending.as_ref() {
        Some(p) if p.generation == generation => {
            *pending = None;
            true
        }
        _ => false,
    }
}
