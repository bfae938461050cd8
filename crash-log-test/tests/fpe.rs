use crash_log_test::*;

#[test]
fn fpe_simple() {
    run_test(Signal::Fpe, &ClientOptions::default());
}

#[test]
fn fpe_threaded() {
    run_test(
        Signal::Fpe,
        &ClientOptions {
            use_thread: true,
            ..Default::default()
        },
    );
}
