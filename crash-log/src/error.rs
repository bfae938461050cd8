/// An error that can occur when attaching a [`crate::CrashLog`] or preparing a
/// thread for crash handling.
///
/// Nothing on the fault path itself ever produces one of these, failures there
/// are absorbed into the crash log.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Unable to `mmap` memory for the alternate signal stack
    #[error("unable to allocate memory for the alternate signal stack")]
    OutOfMemory,
    /// For simplicity sake, only one [`crate::CrashLog`] can be attached at
    /// any one time.
    #[error("a crash log handler is already installed")]
    HandlerAlreadyInstalled,
    /// An I/O or other syscall failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
