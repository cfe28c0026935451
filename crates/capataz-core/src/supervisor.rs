//! Supervisor: the signal-driven reap loop and shutdown state machine.
//!
//! One control thread owns the pool. It blocks in the backend's wait call
//! (the only place it sleeps), restarts workers that exit during normal
//! operation, and on a termination signal drains the pool under a deadline
//! before forcing the stragglers.

use std::time::Duration;

use crate::backend::WaitOutcome;
use crate::error::{Result, SupervisorError};
use crate::pool::WorkerPool;
use crate::signal::{self, AlarmAction};
use crate::types::{Signal, SupervisorState};

/// Default bound on how long a graceful shutdown may drain before the
/// remaining workers are forcefully killed.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

type PoolFactory = Box<dyn FnOnce() -> Result<WorkerPool>>;

/// Owns the worker pool and runs the reap loop until no workers remain.
pub struct Supervisor {
    factory: Option<PoolFactory>,
    pool: Option<WorkerPool>,
    shutdown_timeout: Duration,
    state: SupervisorState,
}

impl Supervisor {
    /// Creates a supervisor from a pool factory.
    ///
    /// The factory is invoked exactly once, lazily, at the start of
    /// [`run`](Self::run); creating the pool is what spawns the workers.
    #[must_use]
    pub fn new(factory: impl FnOnce() -> Result<WorkerPool> + 'static) -> Self {
        Self {
            factory: Some(Box::new(factory)),
            pool: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            state: SupervisorState::Idle,
        }
    }

    /// Sets the graceful shutdown deadline.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SupervisorState {
        self.state
    }

    /// Returns the pool, if it has been created.
    #[must_use]
    pub const fn pool(&self) -> Option<&WorkerPool> {
        self.pool.as_ref()
    }

    fn pool_mut(&mut self) -> Result<&mut WorkerPool> {
        if self.pool.is_none() {
            if let Some(factory) = self.factory.take() {
                self.pool = Some(factory()?);
            }
        }
        self.pool
            .as_mut()
            .ok_or_else(|| SupervisorError::config("pool factory already consumed"))
    }

    /// Runs the supervisor until no workers remain.
    ///
    /// Creates the pool (spawning the workers), installs handlers for the
    /// reload, interrupt, and terminate signals, and enters the reap loop.
    /// Handlers are restored to their defaults before returning.
    ///
    /// # Errors
    /// The only fatal conditions are a failed spawn (at startup or on
    /// restart) and failure to install signal handlers; both propagate.
    pub fn run(&mut self) -> Result<()> {
        // Spawn before installing handlers, so the initial workers start
        // with default dispositions.
        self.pool_mut()?;
        signal::install_handlers()?;
        self.state = SupervisorState::Running;
        tracing::info!(workers = self.pool.as_ref().map_or(0, WorkerPool::len), "supervisor running");

        let result = self.reap_loop();

        if let Err(e) = signal::restore_default_handlers() {
            tracing::warn!(error = %e, "failed to restore default signal handlers");
        }
        self.state = SupervisorState::Idle;
        tracing::info!("supervisor stopped");
        result
    }

    /// Blocks until either any child exits or a pending signal needs
    /// dispatch; exits once the wait reports no children left AND the pool
    /// agrees nothing is running.
    fn reap_loop(&mut self) -> Result<()> {
        loop {
            let outcome = {
                let pool = self.pool_mut()?;
                pool.backend().wait_any()?
            };
            match outcome {
                WaitOutcome::Exited(pid) => {
                    // Workers are expected to run indefinitely; any exit,
                    // deliberate or not, gets a replacement.
                    if self.state == SupervisorState::Running {
                        self.pool_mut()?.restart(pid)?;
                    } else {
                        self.pool_mut()?.remove(pid);
                    }
                }
                WaitOutcome::Interrupted => {}
                WaitOutcome::NoChildren => {
                    if !self.pool_mut()?.has_running() {
                        self.dispatch_pending()?;
                        return Ok(());
                    }
                }
            }
            // Signal dispatch must never be starved by a busy wait call.
            self.dispatch_pending()?;
        }
    }

    fn dispatch_pending(&mut self) -> Result<()> {
        while let Some(sig) = signal::take_pending() {
            match sig {
                Signal::Hup => {
                    // Rolling restart: workers are replaced one by one as
                    // their exits come back through the reap loop.
                    tracing::info!("reload signal received, cycling workers");
                    self.pool_mut()?.broadcast(Signal::Term);
                }
                Signal::Int | Signal::Term => self.shutdown(sig)?,
                Signal::Kill => {}
            }
        }
        Ok(())
    }

    /// Graceful shutdown: broadcast, drain under a deadline, then force.
    fn shutdown(&mut self, sig: Signal) -> Result<()> {
        self.state = SupervisorState::ShuttingDown;
        tracing::info!(signal = ?sig, timeout = ?self.shutdown_timeout, "shutting down worker pool");

        // A repeated termination signal should not be swallowed by the
        // latch; with default disposition a second delivery terminates the
        // supervisor immediately, which is acceptable during shutdown.
        signal::restore_default_handlers()?;

        let deadline_secs = self.shutdown_timeout.as_secs().max(1) as u32;
        let pool = self.pool_mut()?;
        pool.broadcast(sig);

        // The alarm handler does nothing; firing merely interrupts the
        // blocking wait below so the drain cannot run past the deadline.
        signal::set_alarm(AlarmAction::Wakeup, deadline_secs)?;
        while pool.has_running() {
            match pool.backend().wait_any() {
                Ok(WaitOutcome::Exited(pid)) => {
                    pool.remove(pid);
                }
                Ok(WaitOutcome::Interrupted | WaitOutcome::NoChildren) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "drain wait failed");
                    break;
                }
            }
        }
        if let Err(e) = signal::clear_alarm() {
            tracing::warn!(error = %e, "failed to disarm shutdown deadline");
        }

        // Harmless if everything already exited; necessary if the deadline
        // fired with stragglers.
        if pool.has_running() {
            tracing::warn!(stragglers = pool.len(), "deadline expired, forcing termination");
        }
        pool.kill_all();
        Ok(())
    }
}
