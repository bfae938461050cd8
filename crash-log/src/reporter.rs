use crate::{
    CrashHooks, DumpStatus, DumpWriter, Fault, FileNamer, NoHooks, OsInfoSource, StackCapture,
    Uname, report, stacktrace, write_stderr,
};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// The reason a crash log was not written
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Veto {
    /// [`CrashHooks::is_emergency_state`] returned true
    EmergencyState,
    /// [`CrashHooks::is_missing_dependencies`] returned true
    MissingDependencies,
}

impl Veto {
    /// The explanation printed to the console instead of writing a crash log
    pub fn explanation(self) -> &'static str {
        match self {
            Self::EmergencyState => {
                "A serious fault condition occurred in the application. The application will shut down.\n\
                 As an emergency save was loaded no crash information will be generated.\n"
            }
            Self::MissingDependencies => {
                "A serious fault condition occurred in the application. The application will shut down.\n\
                 As a save was loaded for which required dependencies are missing\n\
                 no crash information will be generated.\n"
            }
        }
    }
}

/// What was written for a crash
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportOutcome {
    /// The path the crash log was written to, or `None` if writing failed
    pub log: Option<PathBuf>,
    /// The outcome of writing the minidump
    pub dump: DumpStatus,
}

/// How the fault path concluded, immediately before the process is aborted
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// A guard predicate vetoed the crash log
    Vetoed(Veto),
    /// The crash log was assembled and written
    Reported(ReportOutcome),
    /// There was nothing to report with, eg. no [`crate::CrashLog`] is
    /// attached, or the signal is not one that is handled
    Unhandled,
}

/// Assembles and writes the crash log for a single fault.
///
/// Every collaborator is injected so that the whole report can be produced
/// without an actual crash. The defaults query the real OS via `uname`,
/// unwind the current thread, never veto, and don't write a minidump.
pub struct CrashReporter {
    namer: Box<dyn FileNamer>,
    hooks: Box<dyn CrashHooks>,
    os_info: Box<dyn OsInfoSource>,
    stack: Box<dyn StackCapture>,
    dump_writer: Option<Box<dyn DumpWriter>>,
    dump_dir: PathBuf,
    message: Option<String>,
}

impl CrashReporter {
    /// Creates a reporter that writes its artifacts to the paths created by
    /// the specified [`FileNamer`]
    pub fn new(namer: impl FileNamer + 'static) -> Self {
        Self {
            namer: Box::new(namer),
            hooks: Box::new(NoHooks),
            os_info: Box::new(Uname),
            stack: stacktrace::native(),
            dump_writer: None,
            dump_dir: std::env::temp_dir(),
            message: None,
        }
    }

    /// Sets the guard predicates, extra sections, and cleanup hook
    #[inline]
    pub fn with_hooks(mut self, hooks: Box<dyn CrashHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    #[inline]
    pub fn with_os_info(mut self, os_info: Box<dyn OsInfoSource>) -> Self {
        self.os_info = os_info;
        self
    }

    #[inline]
    pub fn with_stack_capture(mut self, stack: Box<dyn StackCapture>) -> Self {
        self.stack = stack;
        self
    }

    /// Enables writing of a minidump alongside the crash log
    #[inline]
    pub fn with_dump_writer(mut self, writer: Box<dyn DumpWriter>) -> Self {
        self.dump_writer = Some(writer);
        self
    }

    /// Sets the directory the [`DumpWriter`] writes its temporary file to,
    /// defaults to [`std::env::temp_dir`]
    #[inline]
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = dir.into();
        self
    }

    /// Sets the message describing the nature of the failure, written in the
    /// crash reason section
    #[inline]
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    /// Runs the crash log state machine for the specified fault.
    ///
    /// This does not abort the process, that is left to the caller so that
    /// the report path can be exercised without crashing.
    pub fn report(&self, fault: &Fault<'_>) -> Termination {
        if let Some(veto) = self.check_guards() {
            write_stderr(veto.explanation());
            return Termination::Vetoed(veto);
        }

        write_stderr("Crash encountered, generating crash log...\n");

        let text = self.assemble(fault, Utc::now());
        let dump = self.write_dump(fault);
        let log = self.persist(&text);

        self.hooks.after_report();

        write_stderr("Bye!\n");

        Termination::Reported(ReportOutcome { log, dump })
    }

    fn check_guards(&self) -> Option<Veto> {
        if self.hooks.is_emergency_state() {
            Some(Veto::EmergencyState)
        } else if self.hooks.is_missing_dependencies() {
            Some(Veto::MissingDependencies)
        } else {
            None
        }
    }

    /// Assembles the full text of the crash log.
    ///
    /// The output only depends on the inputs, the collaborators, and the
    /// timestamp, which is the only thing that differs between two crashes of
    /// the same kind and stack.
    pub fn assemble(&self, fault: &Fault<'_>, crashed_at: DateTime<Utc>) -> String {
        let mut out = String::with_capacity(8 * 1024);

        report::write_header(&mut out, &crashed_at);
        report::write_os_section(&mut out, &self.os_info.os_info());
        report::write_error_section(&mut out, fault.signal, self.message.as_deref());

        let frames = self.stack.capture(fault.instruction_pointer, stacktrace::MAX_FRAMES);
        report::write_stacktrace_section(&mut out, frames.as_deref());

        self.hooks.write_sections(&mut out);

        out
    }

    fn write_dump(&self, fault: &Fault<'_>) -> DumpStatus {
        let Some(writer) = &self.dump_writer else {
            return DumpStatus::NotAttempted;
        };

        write_stderr("Writing crash dump to disk...\n");

        let dump_path = self.namer.create_file_name(".dmp");
        let mut relocated = false;

        let written = writer.write_dump(&self.dump_dir, fault, &mut |temp_path: &Path, succeeded: bool| {
            // Even a failed write may have left a partial dump that is of some
            // use, so it is moved regardless
            relocated = std::fs::rename(temp_path, &dump_path).is_ok();
            succeeded && relocated
        });

        if written && relocated {
            write_stderr(&format!("Crash dump written to {}.\n", dump_path.display()));
            DumpStatus::Success(dump_path)
        } else {
            write_stderr("Writing crash dump failed.\n");
            DumpStatus::Failed
        }
    }

    fn persist(&self, text: &str) -> Option<PathBuf> {
        write_stderr("Writing crash log to disk...\n");

        let path = self.namer.create_file_name(".log");

        match std::fs::write(&path, text) {
            Ok(()) => {
                write_stderr(&format!("Crash log written to {}.\n", path.display()));
                Some(path)
            }
            Err(err) => {
                write_stderr(&format!(
                    "Writing crash log to {} failed: {err}\n",
                    path.display()
                ));
                None
            }
        }
    }
}
