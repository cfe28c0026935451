//! Process backend: the seam between pool bookkeeping and the operating
//! system.
//!
//! [`ForkBackend`] is the production implementation (fork, kill, wait);
//! tests drive the pool and supervisor through a mock instead, so the
//! bookkeeping properties can be checked without side effects.

#![allow(unsafe_code)]

use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::wait::wait;
use nix::unistd::{ForkResult, fork};

pub use nix::unistd::Pid;

use crate::error::{Result, SupervisorError};
use crate::signal;
use crate::types::Signal;
use crate::worker::Worker;

/// Outcome of blocking until any child process exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A child exited; its record should be reaped.
    Exited(Pid),
    /// The wait was interrupted by a signal before any child exited.
    Interrupted,
    /// There are no children left to wait for.
    NoChildren,
}

/// Operating-system process operations used by the pool and supervisor.
pub trait ProcessBackend: Send + Sync {
    /// Creates a new process running `work`.
    ///
    /// The new process invokes the work unit and then terminates with
    /// success status regardless of the work's outcome. Returns the new
    /// process's identifier in the calling process.
    fn spawn(&self, work: &Arc<dyn Worker>) -> Result<Pid>;

    /// Sends `sig` to the process identified by `pid`.
    fn kill(&self, pid: Pid, sig: Signal) -> Result<()>;

    /// Blocks until any child exits, the wait is interrupted, or no
    /// children remain.
    fn wait_any(&self) -> Result<WaitOutcome>;
}

/// Production backend using `fork(2)`, `kill(2)`, and `wait(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForkBackend;

impl ForkBackend {
    /// Creates a new fork backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ProcessBackend for ForkBackend {
    fn spawn(&self, work: &Arc<dyn Worker>) -> Result<Pid> {
        // Fork inherits the parent's signal dispositions; the child resets
        // them before running so a restarted worker does not carry the
        // supervisor's latch handler.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                signal::reset_for_child();
                work.run();
                std::process::exit(0);
            }
            Ok(ForkResult::Parent { child }) => {
                tracing::debug!(pid = %child, "spawned worker process");
                Ok(child)
            }
            Err(e) => Err(SupervisorError::spawn(format!("fork failed: {e}"))),
        }
    }

    fn kill(&self, pid: Pid, sig: Signal) -> Result<()> {
        nix::sys::signal::kill(pid, sig.to_nix())
            .map_err(|e| SupervisorError::Delivery(format!("kill({pid}, {sig:?}) failed: {e}")))
    }

    fn wait_any(&self) -> Result<WaitOutcome> {
        match wait() {
            Ok(status) => match status.pid() {
                Some(pid) => Ok(WaitOutcome::Exited(pid)),
                None => Ok(WaitOutcome::Interrupted),
            },
            Err(Errno::EINTR) => Ok(WaitOutcome::Interrupted),
            Err(Errno::ECHILD) => Ok(WaitOutcome::NoChildren),
            Err(e) => Err(SupervisorError::Wait(format!("wait failed: {e}"))),
        }
    }
}
