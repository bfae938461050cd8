//! Capturing of the faulting thread's call stack.

use std::fmt::Write;

/// The maximum number of frames written to the crash log
pub const MAX_FRAMES: usize = 64;

/// Captures the call stack of the current thread
pub trait StackCapture: Send + Sync {
    /// Returns a description of each frame, innermost first, of at most
    /// `max_frames` frames, or `None` if unwinding is not supported.
    ///
    /// If `fault_ip` is specified, frames before the one containing that
    /// instruction are skipped. If no such frame is found, the entire stack
    /// is returned instead.
    fn capture(&self, fault_ip: Option<usize>, max_frames: usize) -> Option<Vec<String>>;
}

/// Unwinds the current thread with [`backtrace`], resolving symbols where
/// possible and falling back to the raw instruction pointer when not.
///
/// Note that unwinding and especially symbolication is not guaranteed to be
/// signal safe, see <https://github.com/rust-lang/backtrace-rs/issues/414>.
/// This is why the stack trace is captured after the other sections of the
/// crash log have already been assembled.
pub struct Unwinder;

impl StackCapture for Unwinder {
    fn capture(&self, fault_ip: Option<usize>, max_frames: usize) -> Option<Vec<String>> {
        let mut frames = Vec::with_capacity(max_frames);
        if max_frames == 0 {
            return Some(frames);
        }

        // The innermost frames belong to the signal handler and the unwinder,
        // which just crowd out the frames that actually matter
        let mut ip_found = fault_ip.is_none();

        loop {
            // SAFETY: we're in the crash path, nothing else is going to be
            // unwinding concurrently and taking the lock backtrace uses for the
            // synchronized variants could deadlock if we crashed while holding it
            unsafe {
                backtrace::trace_unsynchronized(|frame| {
                    if !ip_found {
                        if Some(frame.ip() as usize) != fault_ip {
                            return true;
                        }

                        ip_found = true;
                    }

                    frames.push(describe_frame(frame));
                    frames.len() < max_frames
                });
            }

            if ip_found {
                break;
            }

            ip_found = true;
        }

        Some(frames)
    }
}

/// Used on targets where we know unwinding does not work
pub struct Unsupported;

impl StackCapture for Unsupported {
    fn capture(&self, _fault_ip: Option<usize>, _max_frames: usize) -> Option<Vec<String>> {
        None
    }
}

/// The [`StackCapture`] to use for the current target
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd"
))]
#[inline]
pub fn native() -> Box<dyn StackCapture> {
    Box::new(Unwinder)
}

/// The [`StackCapture`] to use for the current target
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd"
)))]
#[inline]
pub fn native() -> Box<dyn StackCapture> {
    Box::new(Unsupported)
}

fn describe_frame(frame: &backtrace::Frame) -> String {
    let ip = frame.ip();
    let mut description = None;

    // SAFETY: see Unwinder::capture
    unsafe {
        backtrace::resolve_frame_unsynchronized(frame, |symbol| {
            // Inlined functions resolve to multiple symbols for the same frame,
            // the first one is the innermost, which is the one we want
            if description.is_some() {
                return;
            }

            let Some(name) = symbol.name() else {
                return;
            };

            let mut desc = name.to_string();
            if let (Some(file), Some(line)) = (symbol.filename(), symbol.lineno()) {
                let _ = write!(desc, " at {}:{line}", file.display());
            }

            description = Some(desc);
        });
    }

    match description {
        Some(desc) => format!("{desc} [{ip:p}]"),
        None => format!("[{ip:p}]"),
    }
}
