//! [`CrashLog`] writes a human readable crash log, and optionally a minidump,
//! when the process receives a fatal signal, and then terminates the process.
//!
//! The following signals are handled
//!
//! ## `SIGSEGV`
//!
//! Signal sent to a process when it makes an invalid virtual memory reference,
//! a [segmentation fault](https://en.wikipedia.org/wiki/Segmentation_fault).
//!
//! ## `SIGABRT`
//!
//! Signal sent to a process to tell it to abort, usually initiated by the
//! process itself via `std::process::abort` or `libc::abort`.
//!
//! ## `SIGFPE`
//!
//! Signal sent to a process when it executes an erroneous arithmetic operation.
//!
//! ## `SIGBUS`
//!
//! Signal sent to a process when it causes a [bus error](https://en.wikipedia.org/wiki/Bus_error).
//!
//! ## `SIGILL`
//!
//! Signal sent to a process when it attempts to execute an **illegal**,
//! malformed, unknown, or privileged, instruction.
//!
//! # Fault path
//!
//! The very first thing the installed handler does is reset the disposition
//! of _all_ of the above signals back to `SIG_DFL`, so that a fault raised
//! while the crash log is being written goes straight to the default action
//! (termination) instead of recursing back into the handler. After that the
//! [`CrashReporter`] consults the [`CrashHooks`] guard predicates, assembles
//! and writes the report, runs the cleanup hook, and the process is aborted.
//! There is no path that returns control to the code that faulted.
//!
//! ```no_run
//! use crash_log::{CrashDirectory, CrashLog, CrashReporter};
//!
//! let reporter = CrashReporter::new(CrashDirectory::new("crashes"));
//! let _crash_log = CrashLog::attach(reporter).expect("failed to attach crash log");
//! ```

#![allow(unsafe_code)]

pub mod dump;
mod error;
mod hooks;
mod naming;
mod os_info;
mod registrar;
pub mod report;
mod reporter;
mod signal;
pub mod stacktrace;

pub use dump::{DumpStatus, DumpWriter, Fault};
pub use error::Error;
pub use hooks::{CrashHooks, NoHooks, make_cleanup_hook};
pub use naming::{CrashDirectory, FileNamer};
pub use os_info::{OsInfo, OsInfoSource, Uname};
pub use registrar::{HandlerSet, handle_fatal_signal};
pub use reporter::{CrashReporter, ReportOutcome, Termination, Veto};
pub use signal::{FATAL_SIGNALS, Signal};
pub use stacktrace::{MAX_FRAMES, StackCapture};

#[cfg(feature = "debug-print")]
#[macro_export]
macro_rules! debug_print {
    ($s:literal) => {
        let cstr = concat!($s, "\n");
        $crate::write_stderr(cstr);
    };
}

#[cfg(not(feature = "debug-print"))]
#[macro_export]
macro_rules! debug_print {
    ($s:literal) => {};
}

/// Writes the specified string directly to stderr, bypassing any buffering or
/// locking done by [`std::io::Stderr`].
///
/// This is safe to be called from within a compromised context.
#[inline]
pub fn write_stderr(s: &str) {
    unsafe {
        libc::write(2, s.as_ptr().cast(), s.len());
    }
}

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        pub use crash_context::CrashContext;
    } else {
        /// The thread context captured at the time of the crash. Only
        /// captured on Linux and Android, this is an empty placeholder on
        /// other targets.
        #[derive(Clone)]
        pub struct CrashContext {
            _priv: (),
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;

        pub use unix::{CrashLog, SignalRegistrar, per_thread_init};
    } else {
        compile_error!("crash-log only supports unix targets");
    }
}
