use crash_log_test::{CLEANUP_MARKER, Signal};

use clap::Parser;
use crash_log::{CrashDirectory, CrashHooks, CrashLog, CrashReporter};
use std::path::PathBuf;

#[derive(Parser)]
struct Command {
    /// The directory the crash log, and minidump, are written to
    #[clap(long)]
    dir: PathBuf,
    /// The signal to raise
    #[clap(long)]
    signal: Signal,
    /// Raises the signal on a separate thread rather than the main thread
    #[clap(long)]
    use_thread: bool,
    /// Pretend the application state is an emergency state
    #[clap(long)]
    emergency: bool,
    /// Pretend the application state is missing dependencies
    #[clap(long)]
    missing_dependencies: bool,
    /// The message describing the failure
    #[clap(long)]
    message: Option<String>,
    /// Also writes a minidump
    #[clap(long)]
    minidump: bool,
}

struct Hooks {
    emergency: bool,
    missing_dependencies: bool,
    cleanup_marker: PathBuf,
}

unsafe impl CrashHooks for Hooks {
    fn is_emergency_state(&self) -> bool {
        self.emergency
    }

    fn is_missing_dependencies(&self) -> bool {
        self.missing_dependencies
    }

    fn write_sections(&self, report: &mut String) {
        report.push_str("Client:\n Name:    crash-client\n\n");
    }

    fn after_report(&self) {
        let _ = std::fs::write(&self.cleanup_marker, b"");
    }
}

fn real_main() -> anyhow::Result<()> {
    let cmd = Command::parse();

    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    println!("pid: {}", std::process::id());

    let crash_dir = CrashDirectory::new(&cmd.dir);
    let output_dir = crash_dir.dir().to_owned();

    #[allow(unused_mut)]
    let mut reporter = CrashReporter::new(crash_dir)
        .with_hooks(Box::new(Hooks {
            emergency: cmd.emergency,
            missing_dependencies: cmd.missing_dependencies,
            cleanup_marker: output_dir.join(CLEANUP_MARKER),
        }))
        .with_dump_dir(output_dir);

    if cmd.minidump {
        cfg_if::cfg_if! {
            if #[cfg(any(target_os = "linux", target_os = "android"))] {
                reporter = reporter.with_dump_writer(Box::new(crash_log::dump::ForkedMinidumpWriter));
            } else {
                anyhow::bail!("minidumps are only supported on Linux and Android");
            }
        }
    }

    let crash_log = CrashLog::attach(reporter)?;

    if let Some(message) = cmd.message {
        crash_log.set_message(message);
    }

    let signal = cmd.signal;

    let raise_signal = move || -> anyhow::Result<()> {
        crash_log::per_thread_init()?;

        match signal {
            Signal::InvalidWrite => write_invalid_address(),
            Signal::StackOverflow => overflow_stack(),
            signal => {
                // SAFETY: we're about to intentionally crash ourselves
                unsafe {
                    libc::raise(signal.to_crash_log().number());
                }
            }
        }

        Ok(())
    };

    if cmd.use_thread {
        std::thread::spawn(raise_signal)
            .join()
            .expect("failed to join thread")?;
    } else {
        raise_signal()?;
    }

    anyhow::bail!("we should have raised a signal and aborted");
}

/// Writes to the zero page, which is never mapped. The address is not null as
/// debug builds check for null pointer writes before they can fault.
#[inline(never)]
fn write_invalid_address() {
    let address = std::hint::black_box(0x10usize);

    // SAFETY: we're about to intentionally crash ourselves
    unsafe {
        std::ptr::write_volatile(address as *mut u32, 0xdead);
    }
}

/// Needs more stack than either the main thread or a spawned thread has
#[inline(never)]
fn overflow_stack() {
    let mut big_boi = [0u8; 9 * 1024 * 1024];
    big_boi[big_boi.len() - 1] = 1;

    std::hint::black_box(&mut big_boi);
}

fn main() {
    // We want this program to crash and have a crash log written, it
    // _shouldn't_ have errors that prevent that from happening, so emit an
    // error code if we do encounter an error so that we can fail the test
    if let Err(e) = real_main() {
        eprintln!("error: {:#}", e);

        // When exiting due to a crash, the exit code will be 128 + the integer
        // signal number, at least on unixes
        std::process::exit(222);
    }
}
