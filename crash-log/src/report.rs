//! The sections of the crash log.
//!
//! Each section writer takes whatever data could be gathered and appends its
//! text to the report. None of them can fail, data that is unavailable is
//! written as a placeholder line instead.

use crate::{OsInfo, Signal};
use chrono::{DateTime, Utc};
use std::{fmt::Write, io};

/// Appends the crash log title and the time of the crash
pub fn write_header(out: &mut String, crashed_at: &DateTime<Utc>) {
    let _ = write!(
        out,
        "*** Crash Log ***\n\nCrash at: {} (UTC)\n\n",
        crashed_at.format("%Y-%m-%d %H:%M:%S")
    );
}

/// Appends the operating system identity, or a single line explaining why it
/// couldn't be retrieved
pub fn write_os_section(out: &mut String, os: &io::Result<OsInfo>) {
    match os {
        Ok(os) => {
            let _ = write!(
                out,
                "Operating system:\n \
                 Name:     {}\n \
                 Release:  {}\n \
                 Version:  {}\n \
                 Machine:  {}\n\n",
                os.name, os.release, os.version, os.machine,
            );
        }
        Err(err) => {
            let _ = write!(out, "Could not get OS version: {err}\n\n");
        }
    }
}

/// Appends the signal that caused the crash along with the message describing
/// the failure, if one was set
pub fn write_error_section(out: &mut String, signal: Signal, message: Option<&str>) {
    let _ = write!(
        out,
        "Crash reason:\n \
         Signal:  {} ({}, {})\n \
         Message: {}\n\n",
        signal.description(),
        signal.name(),
        signal.number(),
        message.unwrap_or("<none>"),
    );
}

/// Appends the captured stack frames, or `Not supported.` if the stack could
/// not be unwound at all
pub fn write_stacktrace_section(out: &mut String, frames: Option<&[String]>) {
    out.push_str("Stacktrace:\n");

    match frames {
        Some(frames) => {
            for (i, frame) in frames.iter().enumerate() {
                let _ = writeln!(out, " [{i:02}] {frame}");
            }
        }
        None => out.push_str(" Not supported.\n"),
    }

    out.push('\n');
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_os() -> OsInfo {
        OsInfo {
            name: "TestOS".to_owned(),
            release: "1.0".to_owned(),
            version: "rev1".to_owned(),
            machine: "x86_64".to_owned(),
        }
    }

    #[test]
    fn os_section() {
        let mut out = String::new();
        write_os_section(&mut out, &Ok(test_os()));

        assert_eq!(
            out,
            "Operating system:\n Name:     TestOS\n Release:  1.0\n Version:  rev1\n Machine:  x86_64\n\n"
        );
    }

    #[test]
    fn os_section_fallback() {
        let mut out = String::new();
        write_os_section(
            &mut out,
            &Err(io::Error::from_raw_os_error(libc::EFAULT)),
        );

        let lines: Vec<_> = out.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Could not get OS version: "));
    }

    #[test]
    fn error_section() {
        let mut out = String::new();
        write_error_section(&mut out, Signal::Abort, Some("assertion failed: x > 0"));

        assert_eq!(
            out,
            "Crash reason:\n Signal:  Aborted (SIGABRT, 6)\n Message: assertion failed: x > 0\n\n"
        );

        let mut out = String::new();
        write_error_section(&mut out, Signal::Segv, None);
        assert!(out.contains(" Message: <none>\n"));
    }

    #[test]
    fn stacktrace_pads_indices() {
        let frames: Vec<_> = (0..11).map(|i| format!("frame{i}")).collect();

        let mut out = String::new();
        write_stacktrace_section(&mut out, Some(&frames));

        assert!(out.starts_with("Stacktrace:\n [00] frame0\n"));
        assert!(out.contains(" [09] frame9\n [10] frame10\n"));
        assert!(out.ends_with("\n\n"));
    }

    #[test]
    fn stacktrace_unsupported() {
        let mut out = String::new();
        write_stacktrace_section(&mut out, None);

        assert_eq!(out, "Stacktrace:\n Not supported.\n\n");
        assert_eq!(out.matches(" [").count(), 0);
    }
}
