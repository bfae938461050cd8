use chrono::Utc;
use std::path::{Path, PathBuf};

/// Creates the paths that crash artifacts are written to.
///
/// Every artifact of a single crash is named by the same [`FileNamer`], only
/// differing by suffix, eg. `.log` for the crash log and `.dmp` for the
/// minidump.
pub trait FileNamer: Send + Sync {
    fn create_file_name(&self, suffix: &str) -> PathBuf;
}

impl<F> FileNamer for F
where
    F: Send + Sync + Fn(&str) -> PathBuf,
{
    fn create_file_name(&self, suffix: &str) -> PathBuf {
        (self)(suffix)
    }
}

/// Names artifacts `<dir>/crash-<YYYYmmdd-HHMMSS>-<pid><suffix>`, the
/// timestamp being when the [`CrashDirectory`] was created.
///
/// The name is fixed up front so that nothing needs to be computed, other
/// than the final concatenation, while handling a crash.
pub struct CrashDirectory {
    dir: PathBuf,
    stem: String,
}

impl CrashDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let stem = format!(
            "crash-{}-{}",
            Utc::now().format("%Y%m%d-%H%M%S"),
            std::process::id()
        );

        Self {
            dir: dir.into(),
            stem,
        }
    }

    /// The directory artifacts are placed in
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileNamer for CrashDirectory {
    fn create_file_name(&self, suffix: &str) -> PathBuf {
        let mut name = self.stem.clone();
        name.push_str(suffix);
        self.dir.join(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shares_stem() {
        let cd = CrashDirectory::new("/tmp/crashes");
        assert_eq!(cd.dir(), Path::new("/tmp/crashes"));

        let log = cd.create_file_name(".log");
        let dmp = cd.create_file_name(".dmp");

        assert_eq!(log.parent(), Some(Path::new("/tmp/crashes")));
        assert_eq!(log.file_stem(), dmp.file_stem());
        assert_eq!(log.extension().unwrap(), "log");
        assert_eq!(dmp.extension().unwrap(), "dmp");

        let name = log.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("crash-"));
        assert!(name.ends_with(&format!("-{}.log", std::process::id())));
    }

    #[test]
    fn closure_namer() {
        let namer = |suffix: &str| PathBuf::from(format!("out/report{suffix}"));
        assert_eq!(namer.create_file_name(".log"), Path::new("out/report.log"));
    }
}
