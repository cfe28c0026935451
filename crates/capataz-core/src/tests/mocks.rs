//! Mock process backend for driving the pool and supervisor without
//! side effects.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::backend::{Pid, ProcessBackend, WaitOutcome};
use crate::error::{Result, SupervisorError};
use crate::signal;
use crate::types::Signal;
use crate::worker::Worker;

/// Serializes tests that touch the process-wide pending-signal latch or
/// install signal handlers. Unit tests run on parallel threads; without
/// this, one test's latched signal can be drained by another.
static SIGNAL_LOCK: Mutex<()> = Mutex::new(());

pub fn signal_lock() -> MutexGuard<'static, ()> {
    SIGNAL_LOCK.lock()
}

/// A worker that does nothing; mock spawns never actually run it.
pub struct NoopWorker;

impl Worker for NoopWorker {
    fn run(&self) {}
}

/// Returns a no-op work unit.
pub fn noop_work() -> Arc<dyn Worker> {
    Arc::new(NoopWorker)
}

#[derive(Default)]
struct MockState {
    next_pid: i32,
    spawned: Vec<Pid>,
    killed: Vec<(Pid, Signal)>,
    wait_script: VecDeque<WaitOutcome>,
    fail_spawns_after: Option<usize>,
    terminate_when_exhausted: bool,
    exhaustion_notified: bool,
}

/// Scriptable [`ProcessBackend`] that records every interaction.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    /// Creates a backend handing out pids from 100 upward.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                next_pid: 100,
                ..MockState::default()
            }),
        })
    }

    /// Queues outcomes for successive `wait_any` calls. Once the script is
    /// exhausted, `wait_any` reports no children.
    pub fn script_waits(&self, outcomes: impl IntoIterator<Item = WaitOutcome>) {
        self.state.lock().wait_script.extend(outcomes);
    }

    /// Makes every spawn after the first `n` fail.
    pub fn fail_spawns_after(&self, n: usize) {
        self.state.lock().fail_spawns_after = Some(n);
    }

    /// When the wait script runs out, latch a terminate signal (once) and
    /// report an interrupted wait, so a supervisor run can end even while
    /// workers are still tracked.
    pub fn terminate_when_exhausted(&self) {
        self.state.lock().terminate_when_exhausted = true;
    }

    /// Pids handed out so far, in spawn order.
    pub fn spawned(&self) -> Vec<Pid> {
        self.state.lock().spawned.clone()
    }

    /// Signals delivered so far, in send order.
    pub fn killed(&self) -> Vec<(Pid, Signal)> {
        self.state.lock().killed.clone()
    }
}

impl ProcessBackend for MockBackend {
    fn spawn(&self, _work: &Arc<dyn Worker>) -> Result<Pid> {
        let mut state = self.state.lock();
        if let Some(limit) = state.fail_spawns_after {
            if state.spawned.len() >= limit {
                return Err(SupervisorError::spawn("mock spawn limit reached"));
            }
        }
        let pid = Pid::from_raw(state.next_pid);
        state.next_pid += 1;
        state.spawned.push(pid);
        Ok(pid)
    }

    fn kill(&self, pid: Pid, sig: Signal) -> Result<()> {
        self.state.lock().killed.push((pid, sig));
        Ok(())
    }

    fn wait_any(&self) -> Result<WaitOutcome> {
        let mut state = self.state.lock();
        if let Some(outcome) = state.wait_script.pop_front() {
            return Ok(outcome);
        }
        if state.terminate_when_exhausted && !state.exhaustion_notified {
            state.exhaustion_notified = true;
            signal::latch_for_test(Signal::Term);
            return Ok(WaitOutcome::Interrupted);
        }
        Ok(WaitOutcome::NoChildren)
    }
}
