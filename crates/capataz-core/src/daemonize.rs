//! Session detachment and identity switching.
//!
//! The classic double-fork dance: the first child becomes a session leader,
//! moves to the filesystem root, and resets the umask; its own child — two
//! forks away from any controlling terminal — runs the actual work. Each
//! intermediate exits as soon as the next stage is spawned, so the final
//! process can never re-acquire a terminal.

#![allow(unsafe_code)]

use nix::sys::stat::{Mode, umask};
use nix::unistd::{ForkResult, Gid, Pid, Uid, User, chdir, fork, getppid, setgid, setsid, setuid};

use crate::error::{Result, SupervisorError};

/// Resolved numeric identity for a named user.
#[derive(Debug, Clone)]
struct Identity {
    name: String,
    uid: Uid,
    gid: Gid,
}

/// Detaches the current process from its terminal, optionally under a
/// different system identity.
#[derive(Debug, Default)]
pub struct Daemonizer {
    identity: Option<Identity>,
}

impl Daemonizer {
    /// Creates a daemonizer that keeps the current identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `user_name` to a numeric identity to assume at the start
    /// of [`run`](Self::run).
    ///
    /// No-op unless the current process has superuser privilege; an
    /// unprivileged process could not switch anyway.
    ///
    /// # Errors
    /// [`SupervisorError::UnknownUser`] if the name does not resolve.
    pub fn assume_identity(&mut self, user_name: &str) -> Result<()> {
        if !Uid::current().is_root() && !Uid::effective().is_root() {
            return Ok(());
        }

        let user = User::from_name(user_name)
            .map_err(|e| SupervisorError::daemonize(format!("user lookup failed: {e}")))?
            .ok_or_else(|| SupervisorError::UnknownUser(user_name.to_string()))?;
        self.identity = Some(Identity {
            name: user_name.to_string(),
            uid: user.uid,
            gid: user.gid,
        });
        Ok(())
    }

    /// Switches identity if one was resolved, then detaches and runs
    /// `work` in the fully detached grandchild process.
    ///
    /// No-op if this process is already detached (its parent is pid 1).
    /// In the original (invoking) process this returns once the first
    /// stage is spawned; the caller is expected to exit normally.
    ///
    /// # Errors
    /// [`SupervisorError::PrivilegeDrop`] if the identity switch fails —
    /// continuing with unintended privilege is never acceptable — and
    /// [`SupervisorError::Spawn`] if the first detachment fork fails.
    pub fn run<F>(&self, work: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        if getppid() == Pid::from_raw(1) {
            return Ok(());
        }

        if let Some(id) = &self.identity {
            // Group first: dropping the user id first may remove the
            // permission to drop the group id.
            setgid(id.gid).map_err(|e| {
                SupervisorError::privilege_drop(format!("setgid for '{}' failed: {e}", id.name))
            })?;
            setuid(id.uid).map_err(|e| {
                SupervisorError::privilege_drop(format!("setuid for '{}' failed: {e}", id.name))
            })?;
            tracing::info!(user = %id.name, uid = %id.uid, "assumed identity");
        }

        match unsafe { fork() } {
            Ok(ForkResult::Parent { .. }) => Ok(()),
            Ok(ForkResult::Child) => {
                detach_and_run(work);
            }
            Err(e) => Err(SupervisorError::spawn(format!("detachment fork failed: {e}"))),
        }
    }
}

/// First-stage child: new session, root cwd, open umask, second fork.
/// Never returns; every path ends in process exit.
fn detach_and_run<F>(work: F) -> !
where
    F: FnOnce() -> Result<()>,
{
    if let Err(e) = setsid() {
        fatal_in_child(&format!("setsid failed: {e}"));
    }
    if let Err(e) = chdir("/") {
        fatal_in_child(&format!("chdir('/') failed: {e}"));
    }
    umask(Mode::empty());

    match unsafe { fork() } {
        // Intermediate exits immediately; the grandchild is reparented to
        // pid 1 with no controlling terminal.
        Ok(ForkResult::Parent { .. }) => std::process::exit(0),
        Ok(ForkResult::Child) => match work() {
            Ok(()) => std::process::exit(0),
            Err(e) => fatal_in_child(&format!("daemonized work failed: {e}")),
        },
        Err(e) => fatal_in_child(&format!("second detachment fork failed: {e}")),
    }
}

fn fatal_in_child(msg: &str) -> ! {
    // There is no caller to propagate to inside a detachment stage.
    eprintln!("capataz: {msg}");
    std::process::exit(1);
}
