//! Asynchronous signal plumbing: the pending-signal latch and the one-shot
//! alarm primitive.
//!
//! Signal handlers here do the absolute minimum that is async-signal-safe:
//! set a bit in an atomic, or `_exit`. Everything else happens at defined
//! poll points (`take_pending`) on the control thread.
//!
//! Handlers are deliberately installed without `SA_RESTART` so that a
//! delivery interrupts a blocking `wait(2)` with `EINTR`; the supervisor's
//! reap loop and the shutdown deadline both depend on that wakeup.

#![allow(unsafe_code)]

use std::sync::atomic::{AtomicU32, Ordering};

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal as NixSignal, sigaction};
use nix::unistd::alarm;

use crate::error::{Result, SupervisorError};
use crate::types::Signal;

/// Bitmask of received-but-undispatched signals, indexed by signal number.
static PENDING: AtomicU32 = AtomicU32::new(0);

extern "C" fn note_signal(sig: libc::c_int) {
    PENDING.fetch_or(1 << sig as u32, Ordering::SeqCst);
}

extern "C" fn wakeup(_sig: libc::c_int) {
    // No-op. Its only purpose is to interrupt a blocking wait with EINTR.
}

extern "C" fn exit_process(_sig: libc::c_int) {
    unsafe { libc::_exit(0) }
}

/// Signals the supervisor intercepts.
const INTERCEPTED: [NixSignal; 3] = [NixSignal::SIGHUP, NixSignal::SIGINT, NixSignal::SIGTERM];

fn set_handler(sig: NixSignal, handler: SigHandler) -> Result<()> {
    let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
    unsafe { sigaction(sig, &action) }
        .map(|_| ())
        .map_err(|e| SupervisorError::signal_setup(format!("sigaction({sig}) failed: {e}")))
}

/// Installs the supervisor's handlers for HUP, INT, and TERM.
pub fn install_handlers() -> Result<()> {
    for sig in INTERCEPTED {
        set_handler(sig, SigHandler::Handler(note_signal))?;
    }
    Ok(())
}

/// Restores default dispositions for HUP, INT, and TERM.
///
/// Called when shutdown begins so that a repeated termination signal is not
/// swallowed by the latch, and again when the reap loop exits.
pub fn restore_default_handlers() -> Result<()> {
    for sig in INTERCEPTED {
        set_handler(sig, SigHandler::SigDfl)?;
    }
    Ok(())
}

/// Takes one pending signal, if any, clearing its latch bit.
///
/// Dispatch order is fixed (HUP, INT, TERM) and independent of arrival
/// order; repeated deliveries of the same signal collapse into one.
#[must_use]
pub fn take_pending() -> Option<Signal> {
    for sig in [Signal::Hup, Signal::Int, Signal::Term] {
        let bit = 1u32 << sig.as_i32() as u32;
        if PENDING.fetch_and(!bit, Ordering::SeqCst) & bit != 0 {
            return Some(sig);
        }
    }
    None
}

/// What the one-shot alarm does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmAction {
    /// Interrupt a blocking wait and nothing else.
    Wakeup,
    /// Terminate the current process with success status.
    ExitProcess,
}

/// Arms a one-shot alarm that performs `action` after `seconds`.
///
/// A previously armed alarm is superseded. `seconds` is clamped to at least
/// one, since `alarm(0)` means cancel.
pub fn set_alarm(action: AlarmAction, seconds: u32) -> Result<()> {
    let handler = match action {
        AlarmAction::Wakeup => wakeup,
        AlarmAction::ExitProcess => exit_process,
    };
    set_handler(NixSignal::SIGALRM, SigHandler::Handler(handler))?;
    alarm::set(seconds.max(1));
    Ok(())
}

/// Cancels any pending alarm and restores the default SIGALRM disposition.
pub fn clear_alarm() -> Result<()> {
    alarm::cancel();
    set_handler(NixSignal::SIGALRM, SigHandler::SigDfl)
}

/// Resets signal state in a freshly forked child before it runs its work
/// unit: intercepted signals revert to their default dispositions and any
/// latched-but-undispatched signals inherited from the parent are dropped.
pub(crate) fn reset_for_child() {
    for sig in INTERCEPTED {
        // Failure to reset in the child leaves it with the parent's latch
        // handler; nothing useful can be done about it there.
        let _ = set_handler(sig, SigHandler::SigDfl);
    }
    PENDING.store(0, Ordering::SeqCst);
}

/// Latches a signal as if it had been delivered. Test hook.
#[cfg(test)]
pub(crate) fn latch_for_test(sig: Signal) {
    PENDING.fetch_or(1 << sig.as_i32() as u32, Ordering::SeqCst);
}
