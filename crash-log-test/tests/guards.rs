//! When the application is in a state where a crash log would be useless or
//! misleading, nothing is written and the process is just aborted
use crash_log_test::*;

fn run_vetoed(opts: &ClientOptions, explanation: &str) {
    capture_output();

    let td = tempfile::tempdir().expect("failed to create temp dir");
    let output = run_client(td.path(), Signal::Segv, opts);
    assert_aborted(&output);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(explanation));
    assert!(!stderr.contains("Crash encountered"));

    assert!(artifacts(td.path(), "log").is_empty());
    assert!(artifacts(td.path(), "dmp").is_empty());
    assert!(!td.path().join(CLEANUP_MARKER).exists());
}

#[test]
fn emergency_state() {
    run_vetoed(
        &ClientOptions {
            emergency: true,
            minidump: cfg!(any(target_os = "linux", target_os = "android")),
            ..Default::default()
        },
        "As an emergency save was loaded no crash information will be generated.",
    );
}

#[test]
fn missing_dependencies() {
    run_vetoed(
        &ClientOptions {
            missing_dependencies: true,
            ..Default::default()
        },
        "no crash information will be generated.",
    );
}

#[test]
fn emergency_takes_precedence() {
    run_vetoed(
        &ClientOptions {
            emergency: true,
            missing_dependencies: true,
            ..Default::default()
        },
        "As an emergency save was loaded",
    );
}
