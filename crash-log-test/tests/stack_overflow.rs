//! The handler runs on the alternate signal stack installed by
//! `per_thread_init`, without which a stack overflow could not be reported
use crash_log_test::*;

fn assert_overflow_reported(log: &str) {
    let stacktrace = &log[log.find("Stacktrace:\n").expect("missing stacktrace")..];
    assert!(
        stacktrace.contains("overflow_stack"),
        "overflowing function missing from stacktrace:\n{stacktrace}"
    );
}

#[test]
fn stack_overflow_simple() {
    let log = run_test(Signal::StackOverflow, &ClientOptions::default());
    assert_overflow_reported(&log);
}

#[test]
fn stack_overflow_threaded() {
    let log = run_test(
        Signal::StackOverflow,
        &ClientOptions {
            use_thread: true,
            ..Default::default()
        },
    );
    assert_overflow_reported(&log);
}
