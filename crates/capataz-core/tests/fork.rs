//! Real-process scenarios: fork, signal delivery, and shutdown timing.
//!
//! Each supervisor under test runs inside a forked child so that signal
//! dispositions and `wait(2)` semantics match production exactly; the test
//! process observes it from outside with `kill` and `waitpid`. Tests
//! serialize on a static lock because `wait(2)` reaps any child of the
//! process.

#![cfg(unix)]
#![allow(unsafe_code)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{self as nix_signal, SigHandler, Signal as NixSignal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork};
use parking_lot::{Mutex, MutexGuard};

use capataz_core::{
    ForkBackend, ProcessBackend, Supervisor, TimeLimited, WaitOutcome, Worker, WorkerPool,
};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock()
}

/// Forks a child that runs a supervisor over `count` copies of `worker`
/// and exits with 0 on a clean run, 1 on error.
fn fork_supervised(worker: Arc<dyn Worker>, count: usize, timeout: Duration) -> Pid {
    match unsafe { fork() }.expect("fork") {
        ForkResult::Child => {
            let mut supervisor = Supervisor::new(move || {
                let mut pool = WorkerPool::new(Arc::new(ForkBackend::new()));
                pool.create_many(worker, count)?;
                Ok(pool)
            })
            .with_shutdown_timeout(timeout);
            process::exit(i32::from(supervisor.run().is_err()));
        }
        ForkResult::Parent { child } => child,
    }
}

fn sleep_forever() {
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

#[test]
fn time_limited_worker_exits_at_deadline() {
    let _guard = serial();
    let backend = ForkBackend::new();
    let work: Arc<dyn Worker> = Arc::new(TimeLimited::new(
        Arc::new(sleep_forever),
        Duration::from_secs(1),
    ));

    let started = Instant::now();
    let pid = backend.spawn(&work).unwrap();
    let status = waitpid(pid, None).unwrap();
    let elapsed = started.elapsed();

    assert!(
        matches!(status, WaitStatus::Exited(p, 0) if p == pid),
        "expected clean exit, got {status:?}"
    );
    assert!(elapsed >= Duration::from_millis(900), "exited early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "alarm never fired: {elapsed:?}");
}

#[test]
fn pool_restart_replaces_real_process() {
    let _guard = serial();
    let backend: Arc<dyn ProcessBackend> = Arc::new(ForkBackend::new());
    let mut pool = WorkerPool::new(Arc::clone(&backend));

    // The worker exits immediately, so both generations can be reaped.
    pool.create_many(Arc::new(|| {}), 1).unwrap();
    let first = pool.pids()[0];

    match backend.wait_any().unwrap() {
        WaitOutcome::Exited(pid) => {
            assert_eq!(pid, first);
            pool.restart(pid).unwrap();
        }
        other => panic!("unexpected wait outcome: {other:?}"),
    }

    assert_eq!(pool.len(), 1);
    let second = pool.pids()[0];
    assert_ne!(second, first, "replacement must be a new process");

    match backend.wait_any().unwrap() {
        WaitOutcome::Exited(pid) => assert_eq!(pid, second),
        other => panic!("unexpected wait outcome: {other:?}"),
    }
}

#[test]
fn interrupt_drains_pool_and_exits_cleanly() {
    let _guard = serial();
    let worker: Arc<dyn Worker> = Arc::new(sleep_forever);
    let child = fork_supervised(worker, 3, Duration::from_secs(10));

    // Give the supervisor time to spawn its pool.
    thread::sleep(Duration::from_millis(400));
    let started = Instant::now();
    kill(child, NixSignal::SIGINT).unwrap();
    let status = waitpid(child, None).unwrap();

    assert!(
        matches!(status, WaitStatus::Exited(p, 0) if p == child),
        "expected clean exit, got {status:?}"
    );
    // Workers keep default dispositions, so the broadcast kills them well
    // before the deadline.
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "drain did not finish promptly"
    );
}

#[test]
fn shutdown_deadline_forces_stubborn_workers() {
    let _guard = serial();
    let worker: Arc<dyn Worker> = Arc::new(|| {
        // A worker that refuses the graceful signal; only the forced kill
        // after the deadline can end it.
        unsafe {
            let _ = nix_signal::signal(NixSignal::SIGTERM, SigHandler::SigIgn);
        }
        sleep_forever();
    });
    let child = fork_supervised(worker, 2, Duration::from_secs(1));

    thread::sleep(Duration::from_millis(400));
    let started = Instant::now();
    kill(child, NixSignal::SIGTERM).unwrap();
    let status = waitpid(child, None).unwrap();
    let elapsed = started.elapsed();

    assert!(
        matches!(status, WaitStatus::Exited(p, 0) if p == child),
        "expected clean exit, got {status:?}"
    );
    assert!(
        elapsed >= Duration::from_millis(700),
        "deadline cut short: {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_secs(8),
        "force kill never happened: {elapsed:?}"
    );
}

#[test]
fn externally_killed_worker_is_replaced() {
    let _guard = serial();
    let marker = marker_path("replace");
    let _ = fs::remove_file(&marker);

    let path = marker.clone();
    let worker: Arc<dyn Worker> = Arc::new(move || {
        if let Ok(mut f) = fs::OpenOptions::new().create(true).append(true).open(&path) {
            let _ = writeln!(f, "{}", process::id());
        }
        sleep_forever();
    });
    let child = fork_supervised(worker, 3, Duration::from_secs(10));

    thread::sleep(Duration::from_millis(500));
    let contents = fs::read_to_string(&marker).unwrap_or_default();
    let initial: Vec<i32> = contents.lines().filter_map(|l| l.parse().ok()).collect();
    assert_eq!(initial.len(), 3, "pool did not come up: {contents:?}");

    // Kill one worker out from under the supervisor.
    kill(Pid::from_raw(initial[0]), NixSignal::SIGKILL).unwrap();
    thread::sleep(Duration::from_millis(500));

    kill(child, NixSignal::SIGTERM).unwrap();
    let status = waitpid(child, None).unwrap();
    assert!(
        matches!(status, WaitStatus::Exited(p, 0) if p == child),
        "expected clean exit, got {status:?}"
    );

    let contents = fs::read_to_string(&marker).unwrap_or_default();
    let _ = fs::remove_file(&marker);
    assert_eq!(
        contents.lines().count(),
        4,
        "exactly one replacement expected: {contents:?}"
    );
}

#[test]
fn reload_restarts_workers_with_fresh_processes() {
    let _guard = serial();
    let marker = marker_path("reload");
    let _ = fs::remove_file(&marker);

    // Each worker generation records its pid before parking.
    let path = marker.clone();
    let worker: Arc<dyn Worker> = Arc::new(move || {
        if let Ok(mut f) = fs::OpenOptions::new().create(true).append(true).open(&path) {
            let _ = writeln!(f, "{}", process::id());
        }
        sleep_forever();
    });
    let child = fork_supervised(worker, 2, Duration::from_secs(10));

    thread::sleep(Duration::from_millis(500));
    kill(child, NixSignal::SIGHUP).unwrap();
    thread::sleep(Duration::from_millis(500));
    kill(child, NixSignal::SIGTERM).unwrap();
    let status = waitpid(child, None).unwrap();

    assert!(
        matches!(status, WaitStatus::Exited(p, 0) if p == child),
        "expected clean exit, got {status:?}"
    );
    let contents = fs::read_to_string(&marker).unwrap_or_default();
    let _ = fs::remove_file(&marker);
    let generations = contents.lines().count();
    assert!(
        generations >= 4,
        "expected replacements after reload, saw {generations} worker starts"
    );
}

fn marker_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("capataz-{tag}-{}.log", process::id()))
}
