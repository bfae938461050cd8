mod altstack;
mod state;

use crate::{CrashReporter, Error, Fault, HandlerSet, Signal, Termination};

/// The [`HandlerSet`] of the actual process signal dispositions
pub struct SignalRegistrar;

impl HandlerSet for SignalRegistrar {
    #[inline]
    fn install(&self) {
        // SAFETY: syscalls
        unsafe { state::install_handlers() }
    }

    #[inline]
    fn reset_to_default(&self) {
        // SAFETY: syscalls
        unsafe { state::reset_handlers() }
    }
}

/// Prepares the calling thread for crash handling.
///
/// Signal dispositions are process wide so there is nothing to do for them,
/// but the [alternate signal stack](https://man7.org/linux/man-pages/man2/sigaltstack.2.html)
/// is per thread, and without one a `SIGSEGV` caused by a stack overflow
/// can't be reported as the handler would run on the very stack that
/// overflowed. [`std::thread`] already installs a (small) alternate stack for
/// threads it creates, if it is large enough it is used, otherwise a new one
/// is mapped and is unmapped again when the thread exits.
///
/// Calling this more than once on the same thread is a no-op. The thread
/// that calls [`CrashLog::attach`] is initialized automatically.
#[inline]
pub fn per_thread_init() -> Result<(), Error> {
    // SAFETY: syscalls
    unsafe { altstack::install() }
}

/// A process wide crash log handler.
///
/// While attached, a fatal signal on any thread results in a crash log being
/// written by the attached [`CrashReporter`], after which the process is
/// aborted.
pub struct CrashLog;

impl CrashLog {
    /// Installs the signal handlers, reporting any crash with `reporter`.
    ///
    /// Only one [`CrashLog`] can be attached at a time.
    pub fn attach(reporter: CrashReporter) -> Result<Self, Error> {
        state::attach(reporter)?;
        Ok(Self)
    }

    /// Detaches the handler, restoring the signal dispositions that were
    /// installed before [`Self::attach`].
    ///
    /// This is done automatically when this [`CrashLog`] is dropped.
    #[inline]
    pub fn detach(self) {
        state::detach();
    }

    /// Sets the message describing the nature of the failure, eg. before
    /// deliberately aborting due to an unrecoverable error
    pub fn set_message(&self, message: impl Into<String>) {
        let mut lock = state::HANDLER.lock();

        if let Some(reporter) = &mut *lock {
            reporter.set_message(message);
        }
    }

    /// Runs the fault path for the specified signal without it actually
    /// being raised, and without aborting the process.
    ///
    /// Just as for a real signal, the fatal signal dispositions are reset to
    /// `SIG_DFL` first, and are _not_ reinstalled afterwards, so any real
    /// signal raised after this call terminates the process without a crash
    /// log unless the [`CrashLog`] is detached and attached again.
    pub fn simulate_signal(&self, signal: Signal) -> Termination {
        crate::handle_fatal_signal(&SignalRegistrar, signal.number(), |signal| {
            let lock = state::HANDLER.lock();

            match &*lock {
                Some(reporter) => reporter.report(&Fault {
                    signal,
                    context: None,
                    instruction_pointer: None,
                }),
                None => Termination::Unhandled,
            }
        })
    }
}

impl Drop for CrashLog {
    fn drop(&mut self) {
        state::detach();
    }
}
