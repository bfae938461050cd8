use std::{
    fmt,
    path::{Path, PathBuf},
    process::Output,
};

/// How the crash client crashes. Most variants are sent with `raise`, the
/// rest are actual faults.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Abort,
    Bus,
    Fpe,
    Illegal,
    Segv,
    /// A write to an address in the unmapped zero page
    InvalidWrite,
    /// Overflows the stack of the crashing thread
    StackOverflow,
}

impl Signal {
    #[inline]
    pub fn to_crash_log(self) -> crash_log::Signal {
        match self {
            Self::Abort => crash_log::Signal::Abort,
            Self::Bus => crash_log::Signal::Bus,
            Self::Fpe => crash_log::Signal::Fpe,
            Self::Illegal => crash_log::Signal::Illegal,
            Self::Segv | Self::InvalidWrite | Self::StackOverflow => crash_log::Signal::Segv,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Abort => "abort",
            Self::Bus => "bus",
            Self::Fpe => "fpe",
            Self::Illegal => "illegal",
            Self::Segv => "segv",
            Self::InvalidWrite => "invalid-write",
            Self::StackOverflow => "stack-overflow",
        })
    }
}

/// Options passed through to the crash client
#[derive(Default, Clone)]
pub struct ClientOptions {
    pub use_thread: bool,
    pub emergency: bool,
    pub missing_dependencies: bool,
    pub message: Option<String>,
    pub minidump: bool,
}

/// The name of the file the crash client's cleanup hook creates in the
/// output directory
pub const CLEANUP_MARKER: &str = "cleanup-ran";

#[inline]
pub fn capture_output() {
    static SUB: std::sync::Once = std::sync::Once::new();

    SUB.call_once(|| {
        tracing_subscriber::fmt().with_test_writer().init();
    });
}

pub fn run_client(dir: &Path, signal: Signal, opts: &ClientOptions) -> Output {
    use std::env;

    // Adapted from
    // https://github.com/rust-lang/cargo/blob/485670b3983b52289a2f353d589c57fae2f60f82/tests/testsuite/support/mod.rs#L507
    let mut cmd_path = env::current_exe().expect("failed to get exe path");
    cmd_path.pop();
    if cmd_path.ends_with("deps") {
        cmd_path.pop();
    }

    cmd_path.push("crash-client");
    if !env::consts::EXE_SUFFIX.is_empty() {
        cmd_path.set_extension(env::consts::EXE_SUFFIX);
    }

    let mut cmd = std::process::Command::new(&cmd_path);
    cmd.stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());
    cmd.arg("--dir").arg(dir);
    cmd.arg("--signal").arg(signal.to_string());

    if opts.use_thread {
        cmd.arg("--use-thread");
    }
    if opts.emergency {
        cmd.arg("--emergency");
    }
    if opts.missing_dependencies {
        cmd.arg("--missing-dependencies");
    }
    if let Some(msg) = &opts.message {
        cmd.arg("--message").arg(msg);
    }
    if opts.minidump {
        cmd.arg("--minidump");
    }

    let child = cmd.spawn().expect("failed to run crash-client");
    let output = child.wait_with_output().expect("failed to wait for output");

    println!("{}", String::from_utf8_lossy(&output.stdout));
    eprintln!("{}", String::from_utf8_lossy(&output.stderr));

    output
}

/// Asserts the client was terminated by `SIGABRT`, which is how every path
/// through the crash log handler ends
pub fn assert_aborted(output: &Output) {
    use std::os::unix::process::ExitStatusExt;

    assert_eq!(
        output.status.signal(),
        Some(libc::SIGABRT),
        "client was not aborted: {:?}",
        output.status
    );
}

/// Retrieves all of the files with the specified extension in the directory
pub fn artifacts(dir: &Path, extension: &str) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .expect("failed to read output directory")
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            (path.extension()? == extension).then_some(path)
        })
        .collect()
}

/// Crashes the client with the specified signal and verifies the crash log
/// it writes, returning its contents
pub fn run_test(signal: Signal, opts: &ClientOptions) -> String {
    capture_output();

    let td = tempfile::tempdir().expect("failed to create temp dir");
    let output = run_client(td.path(), signal, opts);
    assert_aborted(&output);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Crash encountered, generating crash log..."));

    let logs = artifacts(td.path(), "log");
    assert_eq!(logs.len(), 1, "expected exactly 1 crash log");
    assert!(
        td.path().join(CLEANUP_MARKER).exists(),
        "cleanup hook was not run"
    );

    let log = std::fs::read_to_string(&logs[0]).expect("failed to read crash log");
    assert_crash_log(&log, signal.to_crash_log(), opts.message.as_deref());
    log
}

pub fn assert_crash_log(log: &str, signal: crash_log::Signal, message: Option<&str>) {
    assert!(log.starts_with("*** Crash Log ***\n"));
    assert!(log.contains("Operating system:\n Name:     "));
    assert!(log.contains(&format!(
        "Crash reason:\n Signal:  {} ({}, {})\n Message: {}\n",
        signal.description(),
        signal.name(),
        signal.number(),
        message.unwrap_or("<none>"),
    )));
    assert!(log.contains("Stacktrace:\n [00] "));
}

/// Verifies the crash reason recorded in a minidump matches the signal
pub fn assert_minidump(md_buf: &[u8], signal: crash_log::Signal) {
    use minidump::CrashReason;
    use minidump_common::errors::ExceptionCodeLinux;

    let md = minidump::Minidump::read(md_buf).expect("failed to parse minidump");

    let exc: minidump::MinidumpException<'_> =
        md.get_stream().expect("unable to find exception stream");
    let sys: minidump::MinidumpSystemInfo =
        md.get_stream().expect("unable to find system info stream");

    let crash_reason = exc.get_crash_reason(sys.os, sys.cpu);

    let expected = match signal {
        crash_log::Signal::Abort => ExceptionCodeLinux::SIGABRT,
        crash_log::Signal::Bus => ExceptionCodeLinux::SIGBUS,
        crash_log::Signal::Fpe => ExceptionCodeLinux::SIGFPE,
        crash_log::Signal::Illegal => ExceptionCodeLinux::SIGILL,
        crash_log::Signal::Segv => ExceptionCodeLinux::SIGSEGV,
    };

    // Signals raised with `raise` rather than an actual fault have a user
    // rather than a fault specific code, which may or may not be recognized
    let is_expected = match (signal, &crash_reason) {
        (crash_log::Signal::Bus, CrashReason::LinuxSigbus(_))
        | (crash_log::Signal::Fpe, CrashReason::LinuxSigfpe(_))
        | (crash_log::Signal::Illegal, CrashReason::LinuxSigill(_))
        | (crash_log::Signal::Segv, CrashReason::LinuxSigsegv(_)) => true,
        (_, CrashReason::LinuxGeneral(code, _)) => *code == expected,
        _ => false,
    };

    assert!(is_expected, "unexpected crash reason {crash_reason:?}");
}
