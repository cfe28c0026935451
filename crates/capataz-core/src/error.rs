//! Error types for capataz-core.
//!
//! Every variant here is fatal to the operation that produced it; transient
//! conditions (unknown pid exits, queue reconnects) are absorbed locally and
//! never surface as errors.

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Error type for pool, supervisor, and daemonization operations.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The operating system refused to create a process.
    #[error("failed to spawn worker process: {0}")]
    Spawn(String),

    /// The daemonization identity could not be resolved.
    #[error("cannot find user '{0}'")]
    UnknownUser(String),

    /// Switching to the resolved identity failed. Continuing with the wrong
    /// privileges is never acceptable.
    #[error("unable to drop privileges: {0}")]
    PrivilegeDrop(String),

    /// Installing or restoring a signal handler failed. Without handlers the
    /// supervisor cannot guarantee its shutdown semantics.
    #[error("signal setup failed: {0}")]
    SignalSetup(String),

    /// Session detachment (setsid, chdir, fork) failed.
    #[error("daemonization failed: {0}")]
    Daemonize(String),

    /// Waiting for child processes failed for a reason other than
    /// interruption or running out of children.
    #[error("wait for child processes failed: {0}")]
    Wait(String),

    /// Sending a signal to a specific process failed. Broadcast callers
    /// absorb this; it matters only for targeted delivery.
    #[error("signal delivery failed: {0}")]
    Delivery(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SupervisorError {
    /// Creates a spawn error.
    #[must_use]
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    /// Creates a privilege-drop error.
    #[must_use]
    pub fn privilege_drop(msg: impl Into<String>) -> Self {
        Self::PrivilegeDrop(msg.into())
    }

    /// Creates a signal-setup error.
    #[must_use]
    pub fn signal_setup(msg: impl Into<String>) -> Self {
        Self::SignalSetup(msg.into())
    }

    /// Creates a daemonization error.
    #[must_use]
    pub fn daemonize(msg: impl Into<String>) -> Self {
        Self::Daemonize(msg.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
