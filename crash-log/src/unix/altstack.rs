use crate::Error;
use std::{cell::RefCell, io, mem, ptr};

// std::cmp::max is not const :(
const fn get_stack_size() -> usize {
    if libc::SIGSTKSZ > 64 * 1024 {
        libc::SIGSTKSZ
    } else {
        64 * 1024
    }
}

/// The size of the alternate stack that is mapped for a thread.
///
/// This is larger than what is usually used for a signal stack as the crash
/// log is assembled on it, and symbolication in particular can go fairly deep.
/// The memory is only ever committed if we actually crash.
const SIG_STACK_SIZE: usize = get_stack_size();

/// An alternate stack we mapped for the current thread
struct AltStack {
    /// The alternate stack that was installed before ours, if any
    old: Option<libc::stack_t>,
    new: libc::stack_t,
    /// The full mapping, including the guard page
    mapping: *mut libc::c_void,
    mapping_len: usize,
}

impl Drop for AltStack {
    fn drop(&mut self) {
        unsafe {
            let mut current_stack = mem::zeroed();
            if libc::sigaltstack(ptr::null(), &mut current_stack) == -1 {
                return;
            }

            // Only uninstall if the current alternate stack is still ours
            if current_stack.ss_sp == self.new.ss_sp {
                let restore = self.old.unwrap_or_else(|| {
                    let mut disable: libc::stack_t = mem::zeroed();
                    disable.ss_flags = libc::SS_DISABLE;
                    disable
                });

                if libc::sigaltstack(&restore, ptr::null_mut()) == -1 {
                    // Leaking the memory is better than leaving the thread
                    // with an alternate stack pointing at unmapped memory
                    return;
                }
            }

            let r = libc::munmap(self.mapping, self.mapping_len);
            debug_assert_eq!(r, 0, "munmap failed during thread shutdown");
        }
    }
}

thread_local! {
    static ALT_STACK: RefCell<Option<AltStack>> = const { RefCell::new(None) };
}

/// Installs an alternate signal stack for the current thread, unless it
/// already has one that is large enough
pub(super) unsafe fn install() -> Result<(), Error> {
    ALT_STACK.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Ok(());
        }

        unsafe {
            let mut old_stack: libc::stack_t = mem::zeroed();
            if libc::sigaltstack(ptr::null(), &mut old_stack) == -1 {
                return Err(io::Error::last_os_error().into());
            }

            let old_enabled = old_stack.ss_flags & libc::SS_DISABLE == 0;
            if old_enabled && old_stack.ss_size >= SIG_STACK_SIZE {
                return Ok(());
            }

            // A guard page below the stack so that overflowing the alternate
            // stack faults rather than silently corrupting adjacent memory
            let guard_size = libc::sysconf(libc::_SC_PAGESIZE) as usize;
            let mapping_len = guard_size + SIG_STACK_SIZE;

            let mapping = libc::mmap(
                ptr::null_mut(),
                mapping_len,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            );
            if mapping == libc::MAP_FAILED {
                return Err(Error::OutOfMemory);
            }

            let stack_ptr = (mapping as usize + guard_size) as *mut libc::c_void;
            if libc::mprotect(stack_ptr, SIG_STACK_SIZE, libc::PROT_READ | libc::PROT_WRITE) == -1
            {
                let err = io::Error::last_os_error();
                libc::munmap(mapping, mapping_len);
                return Err(err.into());
            }

            let new_stack = libc::stack_t {
                ss_sp: stack_ptr,
                ss_flags: 0,
                ss_size: SIG_STACK_SIZE,
            };
            if libc::sigaltstack(&new_stack, ptr::null_mut()) == -1 {
                let err = io::Error::last_os_error();
                libc::munmap(mapping, mapping_len);
                return Err(err.into());
            }

            *slot = Some(AltStack {
                old: old_enabled.then_some(old_stack),
                new: new_stack,
                mapping,
                mapping_len,
            });

            Ok(())
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn current() -> libc::stack_t {
        unsafe {
            let mut stack = mem::zeroed();
            assert_eq!(libc::sigaltstack(ptr::null(), &mut stack), 0);
            stack
        }
    }

    #[test]
    fn installs_and_restores() {
        std::thread::spawn(|| {
            let before = current();

            unsafe { install().unwrap() };
            let installed = current();
            assert_eq!(installed.ss_flags & libc::SS_DISABLE, 0);
            assert!(installed.ss_size >= SIG_STACK_SIZE || installed.ss_sp == before.ss_sp);

            // Idempotent
            unsafe { install().unwrap() };
            assert_eq!(current().ss_sp, installed.ss_sp);

            // Dropping our stack restores the previous one
            let ours = ALT_STACK.with(|slot| slot.borrow_mut().take());
            let was_ours = ours.is_some();
            drop(ours);

            if was_ours {
                let after = current();
                if before.ss_flags & libc::SS_DISABLE == 0 {
                    assert_eq!(after.ss_sp, before.ss_sp);
                } else {
                    assert_ne!(after.ss_flags & libc::SS_DISABLE, 0);
                }
            }
        })
        .join()
        .unwrap();
    }
}
