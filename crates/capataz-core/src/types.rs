//! Core types for the worker pool supervisor.

use serde::{Deserialize, Serialize};

/// Unix signals the supervisor sends to and intercepts from worker processes.
///
/// Only the signals the pool protocol actually uses are modeled: `Hup`
/// triggers a rolling restart, `Int`/`Term` begin a graceful shutdown, and
/// `Kill` is the non-ignorable last resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    /// Hangup (rolling restart of the pool).
    Hup,
    /// Interrupt (graceful shutdown).
    Int,
    /// Terminate (graceful shutdown).
    Term,
    /// Kill (immediate, non-ignorable termination).
    Kill,
}

impl Signal {
    /// Returns the Unix signal number.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Hup => 1,
            Self::Int => 2,
            Self::Kill => 9,
            Self::Term => 15,
        }
    }

    /// Creates a signal from a Unix signal number.
    #[must_use]
    pub const fn from_i32(sig: i32) -> Option<Self> {
        match sig {
            1 => Some(Self::Hup),
            2 => Some(Self::Int),
            9 => Some(Self::Kill),
            15 => Some(Self::Term),
            _ => None,
        }
    }

    /// Returns true if this signal requests a graceful shutdown.
    #[must_use]
    pub const fn is_termination(self) -> bool {
        matches!(self, Self::Int | Self::Term)
    }

    /// Converts to the nix signal type for delivery via `kill(2)`.
    #[must_use]
    pub const fn to_nix(self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal as Nix;
        match self {
            Self::Hup => Nix::SIGHUP,
            Self::Int => Nix::SIGINT,
            Self::Kill => Nix::SIGKILL,
            Self::Term => Nix::SIGTERM,
        }
    }
}

/// Supervisor lifecycle state.
///
/// Transitions are strictly linear per run:
/// ```text
/// Idle → Running → ShuttingDown → Idle
/// ```
/// `Running` may return directly to `Idle` when the pool drains without a
/// termination signal (all workers gone and nothing left to reap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SupervisorState {
    /// No signal handlers installed; the reap loop is not running.
    #[default]
    Idle,
    /// Normal operation: reaping exits and restarting workers.
    Running,
    /// A termination signal was received; draining with a deadline.
    ShuttingDown,
}

impl SupervisorState {
    /// Returns true if the reap loop is active in any form.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}
