#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)] // Integration tests use unwrap for brevity

//! Integration tests for the subprocess manager against real `sh`/`cat`
//! processes.

use std::time::Duration;

use dgbridge_core::Listener;
use dgbridge_daemon::subprocess::{SpawnConfig, SubprocessBuses, SubprocessError, SubprocessManager};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn sh(script: &str) -> SpawnConfig {
    SpawnConfig::new("sh", vec!["-c".into(), script.into()])
}

async fn next_line(listener: &mut Listener<String>) -> Option<String> {
    tokio::time::timeout(RECV_TIMEOUT, listener.recv())
        .await
        .expect("timed out waiting for a line")
}

// =========================================================================
// Output
// =========================================================================

#[tokio::test]
async fn stdout_and_stderr_lines_reach_their_buses() {
    let buses = SubprocessBuses::default();
    let mut out = buses.stdout_line.register();
    let mut err = buses.stderr_line.register();

    let process =
        SubprocessManager::start_with_buses(sh("echo one; echo two; echo oops >&2"), buses)
            .unwrap();

    assert_eq!(next_line(&mut out).await.as_deref(), Some("one"));
    assert_eq!(next_line(&mut out).await.as_deref(), Some("two"));
    assert_eq!(next_line(&mut err).await.as_deref(), Some("oops"));

    // Both buses close once the streams reach EOF.
    assert_eq!(next_line(&mut out).await, None);
    assert_eq!(next_line(&mut err).await, None);

    let exit = process.wait().await;
    assert_eq!(exit.code(), Some(0));
    assert!(process.has_exited());
}

#[tokio::test]
async fn carriage_returns_and_unterminated_lines_are_handled() {
    let buses = SubprocessBuses::default();
    let mut out = buses.stdout_line.register();

    let _process =
        SubprocessManager::start_with_buses(sh("printf 'dos\\r\\nlast'"), buses).unwrap();

    assert_eq!(next_line(&mut out).await.as_deref(), Some("dos"));
    assert_eq!(next_line(&mut out).await.as_deref(), Some("last"));
    assert_eq!(next_line(&mut out).await, None);
}

#[tokio::test]
async fn exit_code_is_reported() {
    let process = SubprocessManager::start(sh("exit 3")).unwrap();
    assert_eq!(process.wait().await.code(), Some(3));
    // Waiting again returns the same exit.
    assert_eq!(process.wait().await.code(), Some(3));
}

#[tokio::test]
async fn working_directory_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "").unwrap();

    let buses = SubprocessBuses::default();
    let mut out = buses.stdout_line.register();
    let _process = SubprocessManager::start_with_buses(
        sh("ls").with_working_directory(dir.path()),
        buses,
    )
    .unwrap();

    assert_eq!(next_line(&mut out).await.as_deref(), Some("marker.txt"));
}

// =========================================================================
// Input
// =========================================================================

#[tokio::test]
async fn stdin_lines_round_trip_through_cat() {
    let buses = SubprocessBuses::default();
    let mut out = buses.stdout_line.register();
    let process = SubprocessManager::start_with_buses(SpawnConfig::new("cat", vec![]), buses)
        .unwrap();

    process.write_stdin("first").unwrap();
    let writer = process.stdin_writer();
    writer.write_line("second").unwrap();

    assert_eq!(next_line(&mut out).await.as_deref(), Some("first"));
    assert_eq!(next_line(&mut out).await.as_deref(), Some("second"));

    process.stop().await;
}

#[tokio::test]
async fn stdin_bus_broadcast_is_written_to_the_process() {
    let buses = SubprocessBuses::default();
    let mut out = buses.stdout_line.register();
    let stdin_bus = buses.stdin_write.clone();
    let process = SubprocessManager::start_with_buses(SpawnConfig::new("cat", vec![]), buses)
        .unwrap();

    stdin_bus.broadcast("via bus".to_string());
    assert_eq!(next_line(&mut out).await.as_deref(), Some("via bus"));

    process.stop().await;
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn spawn_failure_is_reported() {
    let result = SubprocessManager::start(SpawnConfig::new(
        "/nonexistent/dgbridge-test-binary",
        vec![],
    ));
    assert!(matches!(result, Err(SubprocessError::SpawnFailed { .. })));
}

#[tokio::test]
async fn stop_interrupts_and_closes_stdin() {
    let process = SubprocessManager::start(SpawnConfig::new("cat", vec![])).unwrap();
    let writer = process.stdin_writer();

    tokio::time::timeout(RECV_TIMEOUT, process.stop())
        .await
        .unwrap();

    assert!(process.has_exited());
    assert!(!writer.is_open());
    assert!(matches!(
        process.write_stdin("late"),
        Err(SubprocessError::StdinClosed)
    ));
}

#[tokio::test]
async fn stop_is_idempotent() {
    let process = SubprocessManager::start(SpawnConfig::new("cat", vec![])).unwrap();
    let first = process.stop().await;
    let second = process.stop().await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn stop_kills_process_ignoring_sigint() {
    let config = sh("trap '' INT; while true; do sleep 1; done")
        .with_terminate_timeout(Duration::from_millis(200));
    let process = SubprocessManager::start(config).unwrap();
    // Let the shell install its trap.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let exit = tokio::time::timeout(RECV_TIMEOUT, process.stop())
        .await
        .unwrap();
    assert_eq!(exit.code(), None);
}

#[tokio::test]
async fn stdin_closes_after_natural_exit() {
    let process = SubprocessManager::start(sh("exit 0")).unwrap();
    process.wait().await;
    assert!(matches!(
        process.write_stdin("anyone there?"),
        Err(SubprocessError::StdinClosed)
    ));
}
