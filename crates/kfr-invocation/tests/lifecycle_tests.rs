//! End-to-end lifecycle tests with real child processes.

#![cfg(unix)]

use kfr_common::{CommandLine, Error, InvocationError};
use kfr_invocation::{InvocationManager, LifecycleConfig};
use kfr_process_runner::InvocationOutcome;
use kfr_progress::{HeadlessSurface, ModalResult};
use std::time::{Duration, Instant};

fn cmd(argv: &[&str]) -> CommandLine {
    CommandLine::new(argv.iter().copied()).unwrap()
}

fn wait_until_gone(pid: u32, within: Duration) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if !kfr_process::process_exists(pid).unwrap_or(true) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn test_echo_completes() {
    let manager = InvocationManager::default();
    let mut surface = HeadlessSurface::new();
    let report = manager
        .invoke(cmd(&["echo", "hi"]), "Running echo", &mut surface)
        .unwrap();

    assert!(matches!(report.outcome(), InvocationOutcome::Completed(Some(0))));
    assert_eq!(report.modal_result(), ModalResult::WorkFinished);
    assert!(report.invocation().stdout_lossy().contains("hi"));
    assert_eq!(surface.close_count(), 1);
}

#[test]
fn test_missing_program_launch_failed() {
    let manager = InvocationManager::default();
    let mut surface = HeadlessSurface::new();
    let report = manager
        .invoke(cmd(&["/nonexistent/binary"]), "Running nothing", &mut surface)
        .unwrap();

    assert!(matches!(report.outcome(), InvocationOutcome::LaunchFailed(_)));
    assert!(report.invocation().pid().is_none());
    assert!(report.failure_message().unwrap().contains("/nonexistent/binary"));
}

#[test]
fn test_cancel_long_running_process() {
    let grace = Duration::from_secs(3);
    let manager = InvocationManager::new(LifecycleConfig {
        grace_window: grace,
        ..LifecycleConfig::default()
    });
    let mut surface = HeadlessSurface::cancel_after(Duration::from_millis(100));

    let started = Instant::now();
    let report = manager
        .invoke(cmd(&["sleep", "30"]), "Sleeping", &mut surface)
        .unwrap();

    assert!(report.is_cancelled());
    assert!(started.elapsed() < grace + Duration::from_secs(1));
    let pid = report.invocation().pid().unwrap();
    assert!(!kfr_process::process_exists(pid).unwrap());
    assert!(report.into_result().unwrap().is_none());
}

#[test]
fn test_non_zero_exit_keeps_output() {
    let manager = InvocationManager::default();
    let mut surface = HeadlessSurface::new();
    let report = manager
        .invoke(
            cmd(&["sh", "-c", "echo routed 0 of 12; echo no board 1>&2; exit 1"]),
            "Routing",
            &mut surface,
        )
        .unwrap();

    let message = report.failure_message().unwrap();
    assert!(message.contains("exit code: 1"));
    assert!(message.contains("routed 0 of 12"));
    assert!(message.contains("no board"));
    assert!(matches!(
        report.into_result(),
        Err(InvocationError::NonZeroExit { exit_code: Some(1), .. })
    ));
}

#[test]
fn test_cancel_of_term_ignoring_child_is_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("child.pid");
    let script = format!("trap '' TERM; echo $$ > {}; exec sleep 30", pid_file.display());

    let grace = Duration::from_millis(300);
    let manager = InvocationManager::new(LifecycleConfig {
        grace_window: grace,
        join_timeout: Duration::from_secs(5),
    });
    let mut surface = HeadlessSurface::cancel_after(Duration::from_millis(200));

    let started = Instant::now();
    let report = manager
        .invoke(cmd(&["sh", "-c", &script]), "Stubborn", &mut surface)
        .unwrap();

    assert!(report.is_cancelled());
    assert_eq!(report.invocation().signal(), Some(9));
    assert!(started.elapsed() < Duration::from_millis(200) + grace + Duration::from_secs(2));

    let pid: u32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(wait_until_gone(pid, Duration::from_secs(1)));
}

#[test]
fn test_join_shorter_than_grace_is_rejected_up_front() {
    let manager = InvocationManager::new(LifecycleConfig {
        grace_window: Duration::from_secs(30),
        join_timeout: Duration::from_millis(500),
    });
    let mut surface = HeadlessSurface::cancel_after(Duration::from_millis(200));

    let err = manager
        .invoke(cmd(&["sleep", "30"]), "Misconfigured", &mut surface)
        .unwrap_err();

    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(surface.close_count(), 0);
}

#[test]
fn test_cancel_racing_completion_closes_once() {
    let manager = InvocationManager::default();
    for _ in 0..10 {
        let mut surface = HeadlessSurface::cancel_after(Duration::from_millis(0));
        let report = manager
            .invoke(cmd(&["true"]), "Racing", &mut surface)
            .unwrap();

        assert_eq!(surface.close_count(), 1);
        assert_eq!(surface.last_result(), Some(report.modal_result()));
        match report.modal_result() {
            ModalResult::CancelRequested => assert!(report.is_cancelled()),
            ModalResult::WorkFinished => assert!(report.is_success()),
        }
    }
}
