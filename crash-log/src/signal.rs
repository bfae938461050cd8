use std::fmt;

/// The fatal signals that are caught and reported
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Signal {
    Segv = libc::SIGSEGV,
    Abort = libc::SIGABRT,
    Fpe = libc::SIGFPE,
    Bus = libc::SIGBUS,
    Illegal = libc::SIGILL,
}

/// Every signal the crash log handler is installed for
pub const FATAL_SIGNALS: [Signal; 5] = [
    Signal::Segv,
    Signal::Abort,
    Signal::Fpe,
    Signal::Bus,
    Signal::Illegal,
];

impl Signal {
    /// The raw signal number
    #[inline]
    pub fn number(self) -> i32 {
        self as i32
    }

    /// The symbolic name, eg. `SIGSEGV`
    pub fn name(self) -> &'static str {
        match self {
            Self::Segv => "SIGSEGV",
            Self::Abort => "SIGABRT",
            Self::Fpe => "SIGFPE",
            Self::Bus => "SIGBUS",
            Self::Illegal => "SIGILL",
        }
    }

    /// Human readable description of the signal.
    ///
    /// These are the same strings glibc's `strsignal` returns, but unlike
    /// `strsignal` this doesn't touch locale data so is fine to call from the
    /// signal handler.
    pub fn description(self) -> &'static str {
        match self {
            Self::Segv => "Segmentation fault",
            Self::Abort => "Aborted",
            Self::Fpe => "Floating point exception",
            Self::Bus => "Bus error",
            Self::Illegal => "Illegal instruction",
        }
    }
}

impl TryFrom<i32> for Signal {
    type Error = i32;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        FATAL_SIGNALS
            .into_iter()
            .find(|sig| sig.number() == raw)
            .ok_or(raw)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn converts_from_raw() {
        for sig in FATAL_SIGNALS {
            assert_eq!(Signal::try_from(sig.number()), Ok(sig));
        }

        assert_eq!(Signal::try_from(libc::SIGTRAP), Err(libc::SIGTRAP));
        assert_eq!(Signal::try_from(libc::SIGINT), Err(libc::SIGINT));
    }

    #[test]
    fn names() {
        assert_eq!(Signal::Segv.to_string(), "SIGSEGV");
        assert_eq!(Signal::Segv.number(), libc::SIGSEGV);
        assert_eq!(Signal::Fpe.description(), "Floating point exception");
    }
}
