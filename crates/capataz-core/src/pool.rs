//! Worker pool: the supervisor's live registry of running worker processes.
//!
//! The pool maps each child pid to the work unit it was started with, so an
//! exited worker can be replaced with identical behavior. It is mutated
//! only by the supervisor's control thread; worker processes hold no
//! reference to it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{Pid, ProcessBackend};
use crate::error::Result;
use crate::types::Signal;
use crate::worker::Worker;

/// In-memory record of running worker processes.
///
/// Invariant: every key is a process that is, to the supervisor's
/// knowledge, still alive. An empty map means no workers are running.
pub struct WorkerPool {
    backend: Arc<dyn ProcessBackend>,
    running: HashMap<Pid, Arc<dyn Worker>>,
}

impl WorkerPool {
    /// Creates an empty pool over the given process backend.
    #[must_use]
    pub fn new(backend: Arc<dyn ProcessBackend>) -> Self {
        Self {
            backend,
            running: HashMap::new(),
        }
    }

    /// Returns the process backend this pool spawns through.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn ProcessBackend> {
        &self.backend
    }

    /// Returns true iff at least one worker is tracked as running.
    #[must_use]
    pub fn has_running(&self) -> bool {
        !self.running.is_empty()
    }

    /// Returns the number of tracked workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.running.len()
    }

    /// Returns true if no workers are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Returns the tracked process identifiers.
    #[must_use]
    pub fn pids(&self) -> Vec<Pid> {
        self.running.keys().copied().collect()
    }

    /// Spawns `count` processes each running `work`, recording each under
    /// its pid.
    ///
    /// Fail-fast: if an individual spawn fails the error propagates
    /// immediately, but siblings already spawned in the same call remain
    /// recorded and running.
    pub fn create_many(&mut self, work: Arc<dyn Worker>, count: usize) -> Result<()> {
        for _ in 0..count {
            let pid = self.backend.spawn(&work)?;
            self.running.insert(pid, Arc::clone(&work));
        }
        Ok(())
    }

    /// Removes and returns the record for `pid`, if tracked.
    ///
    /// Exits of unknown pids are not an error; callers get `None`.
    pub fn remove(&mut self, pid: Pid) -> Option<Arc<dyn Worker>> {
        self.running.remove(&pid)
    }

    /// Replaces an exited worker with a new process running the same work
    /// unit. No-op if `pid` was not tracked.
    pub fn restart(&mut self, pid: Pid) -> Result<()> {
        if let Some(work) = self.remove(pid) {
            tracing::info!(old_pid = %pid, "restarting exited worker");
            self.create_many(work, 1)?;
        }
        Ok(())
    }

    /// Sends `sig` to every tracked worker, best-effort.
    ///
    /// A delivery failure to one pid (it may already have exited) does not
    /// abort delivery to the rest.
    pub fn broadcast(&self, sig: Signal) {
        for pid in self.running.keys() {
            if let Err(e) = self.backend.kill(*pid, sig) {
                tracing::warn!(pid = %pid, error = %e, "broadcast delivery failed");
            }
        }
    }

    /// Last-resort cleanup: broadcasts a non-ignorable kill and clears all
    /// records unconditionally, whether or not termination is confirmed.
    pub fn kill_all(&mut self) {
        self.broadcast(Signal::Kill);
        self.running.clear();
    }
}
