use crate::{CrashReporter, Error, FATAL_SIGNALS, Fault, Signal, Termination};
use std::{mem, ptr, time::Duration};

/// How long a faulting thread waits for the handler if another thread is
/// already holding it. If the other thread is reporting a crash of its own
/// it will abort the process long before this elapses.
const HANDLER_WAIT: Duration = Duration::from_secs(5);

/// Restores the signal handler for the specified signal back to its default
/// handler, which _should_ perform the default signal action as seen in
/// <https://man7.org/linux/man-pages/man7/signal.7.html>
#[inline]
unsafe fn install_default_handler(sig: Signal) {
    unsafe { set_handler(sig, libc::SIG_DFL) };
}

unsafe fn set_handler(sig: Signal, action: usize) {
    // Android L+ expose signal and sigaction symbols that override the system
    // ones. There is a bug in these functions where a request to set the handler
    // to SIG_DFL is ignored. In that case, an infinite loop is entered as the
    // signal is repeatedly sent to our signal handler.
    // To work around this, directly call the system's sigaction.
    unsafe {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "android")] {
                let mut sa: libc::sigaction = mem::zeroed();
                libc::sigemptyset(&mut sa.sa_mask);
                sa.sa_sigaction = action;
                sa.sa_flags = libc::SA_RESTART;
                libc::syscall(
                    libc::SYS_rt_sigaction,
                    sig as i32,
                    &sa,
                    ptr::null::<libc::sigaction>(),
                    mem::size_of::<libc::sigset_t>(),
                );
            } else {
                libc::signal(sig as i32, action);
            }
        }
    }
}

/// Resets every fatal signal to its default disposition.
///
/// This is the first thing done on the fault path, it must not allocate or
/// take locks.
pub(super) unsafe fn reset_handlers() {
    for sig in FATAL_SIGNALS {
        unsafe { install_default_handler(sig) };
    }
}

static OLD_HANDLERS: parking_lot::Mutex<Option<[libc::sigaction; 5]>> =
    parking_lot::const_mutex(None);

/// Restores all of the signal handlers back to their previous values, or the
/// default if the previous value cannot be restored
unsafe fn restore_handlers() {
    let mut ohl = OLD_HANDLERS.lock();

    if let Some(old) = &*ohl {
        unsafe {
            for (sig, action) in FATAL_SIGNALS.into_iter().zip(old.iter()) {
                if libc::sigaction(sig as i32, action, ptr::null_mut()) == -1 {
                    install_default_handler(sig);
                }
            }
        }
    }

    ohl.take();
}

pub(super) unsafe fn install_handlers() {
    let mut ohl = OLD_HANDLERS.lock();

    if ohl.is_some() {
        return;
    }

    unsafe {
        // Store all of the current handlers so we can restore them later
        let mut old_handlers: [libc::sigaction; 5] = mem::zeroed();

        for (sig, handler) in FATAL_SIGNALS.iter().zip(old_handlers.iter_mut()) {
            if libc::sigaction(*sig as i32, ptr::null(), handler) == -1 {
                log::error!(
                    "unable to retrieve current {sig} handler: {}",
                    std::io::Error::last_os_error()
                );
                return;
            }
        }

        let mut sa: libc::sigaction = mem::zeroed();
        libc::sigemptyset(&mut sa.sa_mask);

        // Mask all fatal signals while we're handling one of them, a
        // synchronous fault while masked still terminates the process
        for sig in FATAL_SIGNALS {
            libc::sigaddset(&mut sa.sa_mask, sig as i32);
        }

        sa.sa_sigaction = signal_handler as usize;
        sa.sa_flags = libc::SA_ONSTACK | libc::SA_SIGINFO;

        for sig in FATAL_SIGNALS {
            // At this point it is impractical to back out changes, and so
            // failure to install a signal is only logged
            if libc::sigaction(sig as i32, &sa, ptr::null_mut()) == -1 {
                log::warn!(
                    "failed to install {sig} handler: {}",
                    std::io::Error::last_os_error()
                );
            }
        }

        *ohl = Some(old_handlers);
    }
}

pub(super) fn attach(reporter: CrashReporter) -> Result<(), Error> {
    let mut lock = HANDLER.lock();

    if lock.is_some() {
        return Err(Error::HandlerAlreadyInstalled);
    }

    super::per_thread_init()?;
    crate::HandlerSet::install(&super::SignalRegistrar);

    *lock = Some(reporter);
    log::debug!("crash log handler attached");

    Ok(())
}

/// Detaches our signal handler, restoring the previously installed or
/// default handlers
pub(super) fn detach() {
    let mut lock = HANDLER.lock();
    if lock.is_some() {
        // SAFETY: syscalls
        unsafe {
            restore_handlers();
        }
        lock.take();
        log::debug!("crash log handler detached");
    }
}

pub(super) static HANDLER: parking_lot::Mutex<Option<CrashReporter>> =
    parking_lot::const_mutex(None);

/// This is the actual function installed for each signal we handle, invoked
/// by the kernel
unsafe extern "C" fn signal_handler(
    sig: i32,
    info: *mut libc::siginfo_t,
    uc: *mut libc::c_void,
) {
    crate::handle_fatal_signal(&super::SignalRegistrar, sig, |signal| unsafe {
        report(signal, info, uc)
    });

    crate::debug_print!("aborting");
    std::process::abort();
}

unsafe fn report(signal: Signal, info: *mut libc::siginfo_t, uc: *mut libc::c_void) -> Termination {
    // The lock is only ever held for long outside of a crash if the fault
    // happened on this very thread while holding it, in which case waiting
    // forever would deadlock
    let Some(handler) = HANDLER.try_lock_for(HANDLER_WAIT) else {
        crate::debug_print!("unable to acquire handler");
        return Termination::Unhandled;
    };

    let Some(reporter) = &*handler else {
        crate::debug_print!("no handler attached");
        return Termination::Unhandled;
    };

    let context = unsafe { capture_context(info, uc) };
    crate::debug_print!("captured crash context");

    reporter.report(&Fault {
        signal,
        context: context.as_deref(),
        instruction_pointer: unsafe { instruction_pointer(uc) },
    })
}

/// Retrieves the address of the faulting instruction from the context the
/// kernel passed to the handler
#[cfg(all(any(target_os = "linux", target_os = "android"), target_arch = "x86_64"))]
unsafe fn instruction_pointer(uc: *mut libc::c_void) -> Option<usize> {
    let uc = unsafe { uc.cast::<libc::ucontext_t>().as_ref()? };
    Some(uc.uc_mcontext.gregs[libc::REG_RIP as usize] as usize)
}

#[cfg(all(any(target_os = "linux", target_os = "android"), target_arch = "aarch64"))]
unsafe fn instruction_pointer(uc: *mut libc::c_void) -> Option<usize> {
    let uc = unsafe { uc.cast::<libc::ucontext_t>().as_ref()? };
    Some(uc.uc_mcontext.pc as usize)
}

#[cfg(not(all(
    any(target_os = "linux", target_os = "android"),
    any(target_arch = "x86_64", target_arch = "aarch64")
)))]
unsafe fn instruction_pointer(_uc: *mut libc::c_void) -> Option<usize> {
    None
}

#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn capture_context(
    info: *mut libc::siginfo_t,
    uc: *mut libc::c_void,
) -> Option<parking_lot::MutexGuard<'static, crash_context::CrashContext>> {
    if info.is_null() || uc.is_null() {
        return None;
    }

    let mut cc = CRASH_CONTEXT.try_lock()?;
    unsafe { fill_crash_context(&mut cc, &*info, &*uc) };
    Some(cc)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
unsafe fn capture_context(
    _info: *mut libc::siginfo_t,
    _uc: *mut libc::c_void,
) -> Option<&'static crate::CrashContext> {
    None
}

/// The size of `CrashContext` can be too big w.r.t the size of alternate stack
/// for `signal_handler`. Keep the crash context as a .bss field.
#[cfg(any(target_os = "linux", target_os = "android"))]
static CRASH_CONTEXT: parking_lot::Mutex<crash_context::CrashContext> =
    parking_lot::const_mutex(unsafe { mem::zeroed() });

#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn fill_crash_context(
    cc: &mut crash_context::CrashContext,
    info: &libc::siginfo_t,
    uc: &libc::c_void,
) {
    unsafe {
        ptr::write_bytes(cc as *mut crash_context::CrashContext, 0, 1);

        // The siginfo_t in libc is lowest common denominator, but this code is
        // specifically targeting linux/android, which contains the si_pid field
        // that we require
        let nix_info = &*((info as *const libc::siginfo_t).cast::<libc::signalfd_siginfo>());
        ptr::copy_nonoverlapping(nix_info, &mut cc.siginfo, 1);

        let uc_ptr = &*(uc as *const libc::c_void).cast::<crash_context::ucontext_t>();
        ptr::copy_nonoverlapping(uc_ptr, &mut cc.context, 1);

        cfg_if::cfg_if! {
            if #[cfg(target_arch = "aarch64")] {
                let fp_ptr = uc_ptr.uc_mcontext.__reserved.as_ptr().cast::<crash_context::fpsimd_context>();

                if (*fp_ptr).head.magic == crash_context::FPSIMD_MAGIC {
                    ptr::copy_nonoverlapping(fp_ptr, &mut cc.float_state, 1);
                }
            } else if #[cfg(not(target_arch = "arm"))] {
                if !uc_ptr.uc_mcontext.fpregs.is_null() {
                    ptr::copy_nonoverlapping(uc_ptr.uc_mcontext.fpregs, ((&mut cc.float_state) as *mut crash_context::fpregset_t).cast(), 1);
                }
            }
        }

        cc.pid = std::process::id() as i32;
        cc.tid = libc::syscall(libc::SYS_gettid) as i32;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn current_handler(sig: Signal) -> usize {
        unsafe {
            let mut sa: libc::sigaction = mem::zeroed();
            assert_eq!(libc::sigaction(sig as i32, ptr::null(), &mut sa), 0);
            sa.sa_sigaction
        }
    }

    // Signal dispositions are process wide, so everything that touches them
    // is done in a single test to avoid interference between test threads
    #[test]
    fn install_reset_restore() {
        unsafe {
            install_handlers();
            for sig in FATAL_SIGNALS {
                assert_eq!(current_handler(sig), signal_handler as usize);
            }

            // Installing again keeps the originally saved handlers
            install_handlers();

            reset_handlers();
            for sig in FATAL_SIGNALS {
                assert_eq!(current_handler(sig), libc::SIG_DFL);
            }

            restore_handlers();
            for sig in FATAL_SIGNALS {
                assert_ne!(current_handler(sig), signal_handler as usize);
            }
            assert!(OLD_HANDLERS.lock().is_none());
        }
    }
}
