// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # capataz-core
//!
//! Fork-based worker pool supervision primitives (Unix only):
//!
//! - [`Worker`] trait with composable decorators ([`TimeLimited`],
//!   [`QueueWorker`])
//! - [`WorkerPool`] registry of running worker processes
//! - [`Supervisor`] reap loop with restart-on-exit and deadline-bounded
//!   graceful shutdown
//! - [`Daemonizer`] for session detachment and identity switching
//!
//! Concurrency comes purely from OS process isolation: the supervisor's
//! single control thread owns the pool, blocks in `wait(2)`, and treats
//! signal delivery as latched events dispatched at defined poll points.

#![deny(unsafe_code)]

pub mod backend;
pub mod config;
pub mod daemonize;
pub mod error;
pub mod pool;
pub mod signal;
pub mod supervisor;
#[cfg(test)]
pub mod tests;
pub mod types;
pub mod worker;

pub use backend::{ForkBackend, Pid, ProcessBackend, WaitOutcome};
pub use config::PoolConfig;
pub use daemonize::Daemonizer;
pub use error::{Result, SupervisorError};
pub use pool::WorkerPool;
pub use signal::AlarmAction;
pub use supervisor::{DEFAULT_SHUTDOWN_TIMEOUT, Supervisor};
pub use types::{Signal, SupervisorState};
pub use worker::{
    ConnectOutcome, JobSource, JobSourceFactory, PollOutcome, QueueWorker, TimeLimited, Worker,
};
