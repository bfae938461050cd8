use crate::{Signal, Termination};

/// The process wide set of signal dispositions for [`crate::FATAL_SIGNALS`]
pub trait HandlerSet {
    /// Sets the disposition of every fatal signal to the crash log handler
    fn install(&self);
    /// Resets the disposition of every fatal signal back to `SIG_DFL`.
    ///
    /// Must be async signal safe.
    fn reset_to_default(&self);
}

/// The fault path, invoked by the signal handler with the raw signal number.
///
/// The handler set is reset to default before _anything_ else is done, so
/// that any fault that occurs while reporting, of any of the handled kinds,
/// terminates the process via the default action rather than recursing into
/// the handler. Only then is `report` invoked for the signal.
///
/// This never aborts itself, the caller is responsible for terminating the
/// process once this returns.
pub fn handle_fatal_signal<H, R>(handlers: &H, signal: i32, report: R) -> Termination
where
    H: HandlerSet + ?Sized,
    R: FnOnce(Signal) -> Termination,
{
    handlers.reset_to_default();
    crate::debug_print!("reset signal handlers");

    match Signal::try_from(signal) {
        Ok(signal) => report(signal),
        Err(_) => Termination::Unhandled,
    }
}
