use crash_log_test::*;

#[test]
fn segv_simple() {
    run_test(Signal::Segv, &ClientOptions::default());
}

#[test]
fn segv_threaded() {
    run_test(
        Signal::Segv,
        &ClientOptions {
            use_thread: true,
            ..Default::default()
        },
    );
}

#[test]
fn segv_with_message() {
    let log = run_test(
        Signal::Segv,
        &ClientOptions {
            message: Some("the frobnicator exploded".to_owned()),
            ..Default::default()
        },
    );

    // Additional sections come after the built in ones
    let stacktrace = log.find("Stacktrace:\n").expect("missing stacktrace");
    let client = log.find("Client:\n").expect("missing client section");
    assert!(stacktrace < client);
}

/// The frames of the signal handler itself are skipped, the stack trace
/// starts where the fault actually happened
fn assert_starts_at_fault(log: &str, function: &str) {
    let stacktrace = &log[log.find("Stacktrace:\n").expect("missing stacktrace")..];
    let first = stacktrace.lines().nth(1).expect("missing first frame");

    assert!(
        stacktrace.contains(function),
        "faulting function {function} missing from stacktrace:\n{stacktrace}"
    );
    assert!(
        !stacktrace.contains("signal_handler"),
        "stacktrace includes the signal handler:\n{stacktrace}"
    );
    assert!(first.starts_with(" [00] "));
}

#[test]
fn invalid_write_simple() {
    let log = run_test(Signal::InvalidWrite, &ClientOptions::default());
    assert_starts_at_fault(&log, "write_invalid_address");
}

#[test]
fn invalid_write_threaded() {
    let log = run_test(
        Signal::InvalidWrite,
        &ClientOptions {
            use_thread: true,
            ..Default::default()
        },
    );
    assert_starts_at_fault(&log, "write_invalid_address");
}
