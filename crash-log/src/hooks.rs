/// User implemented hooks into the crash log path.
///
/// Every method has a default that does nothing, so implementors only need
/// to override the ones they care about.
///
/// # Safety
///
/// This trait is marked unsafe as every method is run from within a signal
/// handler, in a compromised context. Only a small subset of libc functions
/// are [async signal safe](https://man7.org/linux/man-pages/man7/signal-safety.7.html)
/// and the state that caused the crash may well be reachable from the hooks.
/// Do as _little_ as possible, ideally reading state that was prepared before
/// the crash. If a hook itself faults, the process is terminated by the
/// default action for that signal without any further reporting.
pub unsafe trait CrashHooks: Send + Sync {
    /// Whether the persisted application state is an emergency/recovery
    /// state. If true, no crash log is written as it would be misleading.
    fn is_emergency_state(&self) -> bool {
        false
    }

    /// Whether the persisted application state is missing external
    /// dependencies it requires. If true, no crash log is written as the
    /// crash is most likely a consequence of the missing dependencies.
    fn is_missing_dependencies(&self) -> bool {
        false
    }

    /// Appends additional sections to the crash log, after the stack trace
    fn write_sections(&self, _report: &mut String) {}

    /// Invoked exactly once after the crash log has been written, immediately
    /// before the process is aborted, eg. to release file locks.
    fn after_report(&self) {}
}

/// [`CrashHooks`] that never veto a crash log and do no cleanup
pub struct NoHooks;

unsafe impl CrashHooks for NoHooks {}

/// Creates a [`CrashHooks`] using the supplied closure as the
/// [`CrashHooks::after_report`] cleanup, with every other hook defaulted.
///
/// # Safety
///
/// See the [`CrashHooks`] Safety section for information on why this is `unsafe`.
#[inline]
pub unsafe fn make_cleanup_hook<F>(closure: F) -> Box<dyn CrashHooks>
where
    F: Send + Sync + Fn() + 'static,
{
    struct Wrapper<F> {
        inner: F,
    }

    unsafe impl<F> CrashHooks for Wrapper<F>
    where
        F: Send + Sync + Fn(),
    {
        fn after_report(&self) {
            (self.inner)();
        }
    }

    Box::new(Wrapper { inner: closure })
}
