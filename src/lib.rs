//! Capataz: fork-based worker pool supervision.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use capataz::prelude::*;
//! use std::sync::Arc;
//!
//! let mut supervisor = Supervisor::new(|| {
//!     let mut pool = WorkerPool::new(Arc::new(ForkBackend::new()));
//!     pool.create_many(Arc::new(|| println!("working")), 4)?;
//!     Ok(pool)
//! });
//! supervisor.run().expect("supervisor failed");
//! ```

pub use capataz_core as core;

/// Prelude module for common imports.
pub mod prelude {
    pub use capataz_core::{
        Daemonizer, ForkBackend, JobSource, PoolConfig, ProcessBackend, QueueWorker, Result,
        Signal, Supervisor, SupervisorError, TimeLimited, Worker, WorkerPool,
    };
}
