//! Runner behaviour against real POSIX tools.

#![cfg(unix)]

use gld_core::ports::{FailureKind, SENTINEL_RETURN_CODE};
use gld_runtime::{Output, OutputFormat, RunState, Runner, RunnerError};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sh(script: &str) -> Runner {
    Runner::new(["sh", "-c", script]).unwrap()
}

#[tokio::test]
async fn test_clean_exit_has_no_errors() {
    init_tracing();
    let result = Runner::new("echo hello").unwrap().run().await.unwrap();

    assert_eq!(result.output(), "hello");
    assert!(result.errors().is_empty());
    assert_eq!(result.returncode(), Some(0));
    assert!(result.failure().is_none());
    assert_eq!(result.state(), RunState::Completed);
}

#[tokio::test]
async fn test_stderr_and_exit_code_are_captured() {
    init_tracing();
    let result = sh("echo out; echo err 1>&2; exit 3").run().await.unwrap();

    assert_eq!(result.output_lines(), ["out"]);
    assert_eq!(result.errors(), ["err"]);
    assert_eq!(result.returncode(), Some(3));
    assert!(result.failure().is_none());
}

#[tokio::test]
async fn test_false_returns_one() {
    let result = Runner::new("false").unwrap().run().await.unwrap();
    assert_eq!(result.returncode(), Some(1));
    assert!(!result.succeeded());
}

#[tokio::test]
async fn test_json_output_is_parsed_once() {
    init_tracing();
    let result = Runner::new(["echo", r#"{"a":1}"#])
        .unwrap()
        .format(OutputFormat::Json)
        .run()
        .await
        .unwrap();

    assert_eq!(result.json(), Some(&json!({"a": 1})));
    assert_eq!(result.returncode(), Some(0));
}

#[tokio::test]
async fn test_json_spanning_lines_is_joined() {
    let result = sh(r#"echo '{'; echo '  "modules": ["tape",'; echo '"powerflow"]}'"#)
        .format(OutputFormat::Json)
        .run()
        .await
        .unwrap();

    assert_eq!(result.json(), Some(&json!({"modules": ["tape", "powerflow"]})));
}

#[tokio::test]
async fn test_json_callback_receives_parsed_value() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    Runner::new(["echo", r#"{"application":"gridlabd"}"#])
        .unwrap()
        .format(OutputFormat::Json)
        .on_output(move |output| sink.lock().unwrap().push(output))
        .run()
        .await
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        [Output::Json(json!({"application": "gridlabd"}))]
    );
}

#[tokio::test]
async fn test_invalid_json_is_decode_failure() {
    let result = Runner::new("echo not-json")
        .unwrap()
        .format(OutputFormat::Json)
        .run()
        .await
        .unwrap();

    assert_eq!(result.returncode(), None);
    assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::Decode));
}

#[tokio::test]
async fn test_empty_json_output_is_not_a_failure() {
    let result = Runner::new("true")
        .unwrap()
        .format(OutputFormat::Json)
        .run()
        .await
        .unwrap();

    assert_eq!(result.json(), None);
    assert_eq!(result.returncode(), Some(0));
    assert!(result.failure().is_none());
}

#[tokio::test]
async fn test_streaming_callback_gets_every_line_in_order() {
    init_tracing();
    let lines = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let line_sink = Arc::clone(&lines);
    let error_sink = Arc::clone(&errors);

    let result = sh("for i in 1 2 3 4 5; do echo line$i; echo; echo warn$i 1>&2; done")
        .on_output(move |output| {
            if let Output::Text(line) = output {
                line_sink.lock().unwrap().push(line);
            }
        })
        .on_error(move |line| error_sink.lock().unwrap().push(line))
        .run()
        .await
        .unwrap();

    assert!(result.output_lines().is_empty());
    assert!(result.errors().is_empty());
    assert_eq!(
        *lines.lock().unwrap(),
        ["line1", "line2", "line3", "line4", "line5"]
    );
    assert_eq!(
        *errors.lock().unwrap(),
        ["warn1", "warn2", "warn3", "warn4", "warn5"]
    );
}

#[tokio::test]
async fn test_large_output_on_both_pipes_does_not_deadlock() {
    let result = sh("yes out | head -n 50000; yes err | head -n 50000 1>&2")
        .timeout(Some(Duration::from_secs(30)))
        .run()
        .await
        .unwrap();

    assert_eq!(result.returncode(), Some(0));
    assert_eq!(result.output_lines().len(), 50000);
    assert_eq!(result.errors().len(), 50000);
}

#[tokio::test]
async fn test_missing_program_is_captured() {
    init_tracing();
    let result = Runner::new("gld-no-such-program --version")
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(result.returncode(), None);
    assert_eq!(result.failure().map(|f| f.kind), Some(FailureKind::NotFound));
    assert_eq!(result.state(), RunState::LaunchFailed);
}

#[tokio::test]
async fn test_missing_program_propagates_when_listed() {
    let err = Runner::new("gld-no-such-program")
        .unwrap()
        .propagate(&[FailureKind::NotFound])
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, RunnerError::Propagated(f) if f.kind == FailureKind::NotFound));
}

#[tokio::test]
async fn test_unlisted_kind_is_not_propagated() {
    let result = Runner::new("gld-no-such-program")
        .unwrap()
        .propagate(&[FailureKind::Timeout])
        .run()
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_non_executable_file_is_permission_denied() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("gridlabd");
    std::fs::write(&path, "#!/bin/sh\necho never\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

    let result = Runner::new(vec![path.to_string_lossy().into_owned()])
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(result.returncode(), None);
    assert_eq!(
        result.failure().map(|f| f.kind),
        Some(FailureKind::PermissionDenied)
    );
}

#[tokio::test]
async fn test_timeout_returns_sentinel() {
    init_tracing();
    let started = Instant::now();
    let result = Runner::new("sleep 10")
        .unwrap()
        .timeout(Some(Duration::from_millis(200)))
        .run()
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.returncode(), Some(SENTINEL_RETURN_CODE));
    let failure = result.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert!(failure.message.contains("timed out"));
    assert_eq!(result.state(), RunState::TimedOut);
}

#[tokio::test]
async fn test_timeout_propagates_when_listed() {
    let err = Runner::new("sleep 10")
        .unwrap()
        .timeout(Some(Duration::from_millis(200)))
        .propagate(&[FailureKind::Timeout])
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, RunnerError::Propagated(f) if f.is_timeout()));
}

#[tokio::test]
async fn test_fast_command_finishes_within_timeout() {
    let result = Runner::new("echo quick")
        .unwrap()
        .timeout(Some(Duration::from_secs(10)))
        .run()
        .await
        .unwrap();
    assert_eq!(result.output(), "quick");
    assert_eq!(result.returncode(), Some(0));
}

#[tokio::test]
async fn test_killed_process_reports_signal_code() {
    let result = sh("kill -9 $$").run().await.unwrap();
    assert_eq!(result.returncode(), Some(128 + 9));
    assert!(result.failure().is_none());
}

#[test]
fn test_run_blocking() {
    let result = Runner::new("echo blocking")
        .unwrap()
        .run_blocking()
        .unwrap();
    assert_eq!(result.output(), "blocking");
    assert_eq!(result.returncode(), Some(0));
}
