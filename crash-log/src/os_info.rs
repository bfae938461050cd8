use std::{io, mem};

/// Identity of the host operating system
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OsInfo {
    pub name: String,
    pub release: String,
    pub version: String,
    pub machine: String,
}

/// Source of the operating system identity written to the crash log
pub trait OsInfoSource: Send + Sync {
    fn os_info(&self) -> io::Result<OsInfo>;
}

/// Queries the OS identity via [`uname`](https://man7.org/linux/man-pages/man2/uname.2.html),
/// which is async signal safe
pub struct Uname;

impl OsInfoSource for Uname {
    fn os_info(&self) -> io::Result<OsInfo> {
        // SAFETY: syscall, utsname is plain old data
        let name = unsafe {
            let mut name: libc::utsname = mem::zeroed();
            if libc::uname(&mut name) < 0 {
                return Err(io::Error::last_os_error());
            }
            name
        };

        Ok(OsInfo {
            name: from_field(&name.sysname),
            release: from_field(&name.release),
            version: from_field(&name.version),
            machine: from_field(&name.machine),
        })
    }
}

/// The utsname fields are fixed size and nul terminated, unless they aren't
fn from_field(field: &[libc::c_char]) -> String {
    let bytes: Vec<u8> = field
        .iter()
        .take_while(|c| **c != 0)
        .map(|c| *c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
