//! Optional binary minidump written alongside the crash log.

use crate::{CrashContext, Signal};
use std::path::{Path, PathBuf};

/// The fault being reported
pub struct Fault<'a> {
    /// The signal that was raised
    pub signal: Signal,
    /// The context of the faulting thread, if it could be captured. This is
    /// only ever available when the fault was an actual signal on Linux or
    /// Android.
    pub context: Option<&'a CrashContext>,
    /// The address of the faulting instruction, if known. The stack trace
    /// starts at the frame containing it, skipping the frames of the signal
    /// handler itself.
    pub instruction_pointer: Option<usize>,
}

/// The result of attempting to write a minidump
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DumpStatus {
    /// The minidump was written and moved to the specified path
    Success(PathBuf),
    /// A minidump writer was configured, but writing or moving the minidump
    /// failed
    Failed,
    /// No minidump writer was configured
    NotAttempted,
}

/// Writes a binary minidump of the crashing process.
///
/// The writer chooses where it writes the minidump within `dir`. Once it is
/// done, successfully or not, it must invoke `on_written` exactly once with
/// the path it wrote to and whether the write succeeded, the return of that
/// callback is whether the minidump was successfully moved to its final
/// location. The return of `write_dump` is whether the entire write and move
/// succeeded.
pub trait DumpWriter: Send + Sync {
    fn write_dump(
        &self,
        dir: &Path,
        fault: &Fault<'_>,
        on_written: &mut dyn FnMut(&Path, bool) -> bool,
    ) -> bool;
}

#[cfg(all(feature = "minidump", any(target_os = "linux", target_os = "android")))]
pub use forked::ForkedMinidumpWriter;

#[cfg(all(feature = "minidump", any(target_os = "linux", target_os = "android")))]
mod forked {
    use super::{DumpWriter, Fault};
    use std::path::Path;

    /// Writes a minidump with [`minidump_writer`] from a forked child process.
    ///
    /// Linux minidumps are written by `ptrace`ing every thread of the target,
    /// which can't be done from within the target itself, so a child is
    /// forked that attaches to the crashed parent while the parent waits for
    /// it to exit.
    pub struct ForkedMinidumpWriter;

    impl DumpWriter for ForkedMinidumpWriter {
        fn write_dump(
            &self,
            dir: &Path,
            fault: &Fault<'_>,
            on_written: &mut dyn FnMut(&Path, bool) -> bool,
        ) -> bool {
            let pid = std::process::id() as i32;
            let tid = fault
                .context
                .map_or_else(|| unsafe { libc::syscall(libc::SYS_gettid) as i32 }, |cc| cc.tid);
            let temp_path = dir.join(format!(".minidump-{pid}-{tid}.tmp"));

            let written = {
                // Allow ourselves to be ptraced by the child
                let _set_dumpable = SetDumpable::new();
                crate::debug_print!("set dumpable");

                // SAFETY: syscalls, the child only writes the dump and exits
                unsafe {
                    match libc::fork() {
                        -1 => false,
                        0 => {
                            let written = write_minidump(&temp_path, pid, tid, fault);
                            libc::_exit(if written { 0 } else { 1 });
                        }
                        child => wait_for_child(child),
                    }
                }
            };

            on_written(&temp_path, written)
        }
    }

    fn write_minidump(path: &Path, pid: i32, tid: i32, fault: &Fault<'_>) -> bool {
        let Ok(mut file) = std::fs::File::create(path) else {
            return false;
        };

        let mut writer = minidump_writer::minidump_writer::MinidumpWriter::new(pid, tid);
        if let Some(cc) = fault.context {
            writer.set_crash_context(minidump_writer::crash_context::CrashContext {
                inner: cc.clone(),
            });
        }

        writer.dump(&mut file).is_ok() && file.sync_all().is_ok()
    }

    unsafe fn wait_for_child(child: libc::pid_t) -> bool {
        unsafe {
            let mut status = 0;
            loop {
                if libc::waitpid(child, &mut status, 0) != -1 {
                    break;
                }

                if std::io::Error::last_os_error().raw_os_error() != Some(libc::EINTR) {
                    return false;
                }
            }

            libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0
        }
    }

    /// We define these constans ourselves rather than use libc as they are
    /// missing from eg. Android
    const PR_GET_DUMPABLE: i32 = 3;
    const PR_SET_DUMPABLE: i32 = 4;
    const PR_SET_PTRACER: i32 = 0x59616d61;
    const PR_SET_PTRACER_ANY: i32 = -1;

    /// Helper that sets the process as dumpable and ptraceable by any process
    /// if it is not, and when dropped returns it back to the original state
    struct SetDumpable {
        was_dumpable: bool,
    }

    impl SetDumpable {
        fn new() -> Self {
            // SAFETY: syscalls
            unsafe {
                let is_dumpable = libc::syscall(libc::SYS_prctl, PR_GET_DUMPABLE, 0, 0, 0, 0);
                let was_dumpable = is_dumpable > 0;

                if !was_dumpable {
                    libc::syscall(libc::SYS_prctl, PR_SET_DUMPABLE, 1, 0, 0, 0);
                }

                // The child's pid isn't known until after the fork, by which
                // time it may already be trying to attach, so allow any
                // process. This is only needed if `/proc/sys/kernel/yama/ptrace_scope`
                // is 1, but doesn't hurt in any other mode.
                libc::syscall(libc::SYS_prctl, PR_SET_PTRACER, PR_SET_PTRACER_ANY, 0, 0, 0);

                Self { was_dumpable }
            }
        }
    }

    impl Drop for SetDumpable {
        fn drop(&mut self) {
            unsafe {
                libc::syscall(libc::SYS_prctl, PR_SET_PTRACER, 0, 0, 0, 0);

                if !self.was_dumpable {
                    libc::syscall(libc::SYS_prctl, PR_SET_DUMPABLE, 0, 0, 0, 0);
                }
            }
        }
    }
}
