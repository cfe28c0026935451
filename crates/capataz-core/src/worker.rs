//! Worker behavior composition.
//!
//! A [`Worker`] is the unit of behavior a pooled process runs. Workers
//! compose as decorators: [`TimeLimited`] bounds how long a process may
//! live, [`QueueWorker`] wraps an external job source with reconnect
//! backoff. Any combination wraps a single inner worker.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::signal::{self, AlarmAction};
use crate::types::Signal;

/// A unit of work executed inside an isolated worker process.
///
/// The supervisor never inspects a worker's outcome; a worker process
/// always exits with success status once its `run` returns. Workers are
/// expected to run indefinitely — any exit is treated as needing a
/// replacement.
pub trait Worker: Send + Sync {
    /// Runs the unit of work. Called exactly once, in the worker process.
    fn run(&self);
}

impl<F> Worker for F
where
    F: Fn() + Send + Sync,
{
    fn run(&self) {
        self();
    }
}

// =============================================================================
// TimeLimited
// =============================================================================

/// Decorator that bounds a worker's lifetime.
///
/// Arms an alarm that terminates the process (with success status) after
/// `max_run`, then runs the inner worker; the supervisor's restart path
/// replaces the process. On normal completion the alarm is disarmed.
pub struct TimeLimited {
    inner: Arc<dyn Worker>,
    max_run: Duration,
}

impl TimeLimited {
    /// Wraps `inner` with a maximum run duration.
    #[must_use]
    pub fn new(inner: Arc<dyn Worker>, max_run: Duration) -> Self {
        Self { inner, max_run }
    }
}

impl Worker for TimeLimited {
    fn run(&self) {
        // Alarm granularity is whole seconds; round up so a sub-second
        // limit still fires.
        let seconds = self.max_run.as_secs().max(1) as u32;
        if let Err(e) = signal::set_alarm(AlarmAction::ExitProcess, seconds) {
            tracing::warn!(error = %e, "failed to arm run-duration alarm");
        }
        self.inner.run();
        if let Err(e) = signal::clear_alarm() {
            tracing::warn!(error = %e, "failed to disarm run-duration alarm");
        }
    }
}

// =============================================================================
// Job source interface
// =============================================================================

/// Outcome of a single unit of job-queue work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A job was processed.
    Success,
    /// The poll timed out without work; keep going.
    Timeout,
    /// The broker reports no jobs pending; wait for the connection.
    NoJobs,
    /// Transient failure; back off and retry.
    Retryable,
    /// Unrecoverable failure; the loop terminates and the process exits.
    Fatal,
}

/// Outcome of blocking until the broker connection is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Connection ready.
    Success,
    /// No active connections; back off and retry.
    Retryable,
    /// Unrecoverable failure.
    Fatal,
}

/// External job-queue client.
///
/// The supervisor treats the broker protocol as opaque: it starts the loop,
/// supervises the process running it, and eventually asks it to stop.
pub trait JobSource {
    /// Performs one unit of job-queue work.
    fn poll_once(&mut self) -> PollOutcome;

    /// Blocks until the broker connection is usable again.
    fn wait_for_connection(&mut self) -> ConnectOutcome;

    /// Releases broker resources when the loop ends.
    fn teardown(&mut self) {}
}

/// Factory producing a fresh job source inside each worker process.
pub type JobSourceFactory = Box<dyn Fn() -> Box<dyn JobSource> + Send + Sync>;

// =============================================================================
// QueueWorker
// =============================================================================

/// Decorator wrapping the external job-polling loop.
///
/// Each iteration checks for pending signals, performs one unit of work,
/// and on transient no-connection conditions sleeps a fixed backoff before
/// retrying. A fatal outcome ends the loop; the process then exits and the
/// supervisor restarts it.
pub struct QueueWorker {
    factory: JobSourceFactory,
    backoff: Duration,
}

impl QueueWorker {
    /// Creates a queue worker from a job source factory.
    #[must_use]
    pub fn new(factory: JobSourceFactory, backoff: Duration) -> Self {
        Self { factory, backoff }
    }

    fn backoff(&self) {
        tracing::debug!(backoff = ?self.backoff, "no active connections, backing off");
        thread::sleep(self.backoff);
    }

    /// Returns false when the loop should terminate.
    fn work(&self, source: &mut dyn JobSource) -> bool {
        match source.poll_once() {
            PollOutcome::Success | PollOutcome::Timeout => true,
            PollOutcome::NoJobs => match source.wait_for_connection() {
                ConnectOutcome::Success => true,
                ConnectOutcome::Retryable => {
                    self.backoff();
                    true
                }
                ConnectOutcome::Fatal => false,
            },
            PollOutcome::Retryable => {
                self.backoff();
                true
            }
            PollOutcome::Fatal => false,
        }
    }

    fn termination_pending() -> bool {
        match signal::take_pending() {
            Some(sig) if sig.is_termination() => true,
            Some(_) | None => false,
        }
    }
}

impl Worker for QueueWorker {
    fn run(&self) {
        let mut source = (self.factory)();
        loop {
            // Poll point: stop cooperatively if a termination signal was
            // latched (only relevant when handlers are installed in this
            // process; forked children keep default dispositions).
            if Self::termination_pending() {
                break;
            }
            if !self.work(source.as_mut()) {
                tracing::info!("job loop hit a fatal condition, exiting");
                break;
            }
        }
        source.teardown();
    }
}
