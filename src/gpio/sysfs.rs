use std::ffi::CString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{FileExt, MetadataExt};
use std::path::Path;
use std::ptr;
use std::thread;
use std::time::Duration;

use libc::group;

use super::{Error, Level, OutputLine, Result};

const SYSFS_GPIO: &str = "/sys/class/gpio";

// Find group ID for specified group
fn group_to_gid(name: &str) -> Option<u32> {
    if let Ok(name_cstr) = CString::new(name) {
        let mut buf: [libc::c_char; 4096] = [0; 4096];
        let mut res: *mut group = ptr::null_mut();
        let mut grp = group {
            gr_name: ptr::null_mut(),
            gr_passwd: ptr::null_mut(),
            gr_gid: 0,
            gr_mem: ptr::null_mut(),
        };

        unsafe {
            if libc::getgrnam_r(
                name_cstr.as_ptr(),
                &mut grp,
                buf.as_mut_ptr(),
                buf.len(),
                &mut res,
            ) == 0
                && !res.is_null()
            {
                return Some((*res).gr_gid);
            }
        }
    }

    None
}

// Accepts "21", "BCM21", "GPIO21" and "gpio21"
pub(crate) fn parse_line_name(name: &str) -> Result<u32> {
    let trimmed = name.trim();
    let digits = ["bcm", "gpio"]
        .iter()
        .find_map(|prefix| {
            trimmed
                .get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(prefix))
                .map(|_| &trimmed[prefix.len()..])
        })
        .unwrap_or(trimmed);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidLineName(name.to_owned()));
    }

    digits
        .parse()
        .map_err(|_| Error::InvalidLineName(name.to_owned()))
}

fn line_path(line: u32) -> String {
    format!("{}/gpio{}", SYSFS_GPIO, line)
}

// Translate the kernel's responses into something more descriptive
fn map_io_error(err: io::Error, line: u32, path: &str) -> Error {
    match err.kind() {
        io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.to_owned()),
        io::ErrorKind::InvalidInput => Error::LineNotAvailable(line),
        _ => Error::Io(err),
    }
}

fn export(line: u32) -> Result<()> {
    // Only export if the line isn't already exported
    if !Path::new(&line_path(line)).exists() {
        let path = format!("{}/export", SYSFS_GPIO);
        File::create(&path)
            .and_then(|mut file| file.write_fmt(format_args!("{}", line)))
            .map_err(|e| map_io_error(e, line, &path))?;
    }

    Ok(())
}

fn wait_for_group(line: u32) -> Result<()> {
    // The symlink created by exporting a line starts off owned by root:root. There's
    // a short delay before udev changes the group to gpio. Wait for max. 1s, so
    // non-root users don't run into permission issues when setting the direction.
    let gid_gpio = group_to_gid("gpio").unwrap_or(0);

    let mut counter = 0;
    while counter < 20 {
        let meta = fs::metadata(line_path(line))?;
        if meta.gid() == gid_gpio {
            break;
        }

        thread::sleep(Duration::from_millis(50));
        counter += 1;
    }

    Ok(())
}

fn unexport(line: u32) -> Result<()> {
    // Only unexport if the line is actually exported
    if Path::new(&line_path(line)).exists() {
        File::create(format!("{}/unexport", SYSFS_GPIO))?
            .write_fmt(format_args!("{}", line))?;
    }

    Ok(())
}

// Writing "low" or "high" configures the line as an output and sets its
// initial level in a single step, so it never glitches.
fn set_output(line: u32, initial: Level) -> Result<()> {
    let b_direction: &[u8] = match initial {
        Level::Low => b"low",
        Level::High => b"high",
    };

    let path = format!("{}/direction", line_path(line));
    File::create(&path)
        .and_then(|mut file| file.write_all(b_direction))
        .map_err(|e| map_io_error(e, line, &path))?;

    Ok(())
}

fn open_value(line: u32) -> Result<File> {
    let path = format!("{}/value", line_path(line));

    OpenOptions::new()
        .write(true)
        .open(&path)
        .map_err(|e| map_io_error(e, line, &path))
}

// Everything that happens after exporting, and needs to be undone on failure
fn configure(line: u32) -> Result<File> {
    wait_for_group(line)?;
    set_output(line, Level::Low)?;

    open_value(line)
}

/// A GPIO line controlled through the `/sys/class/gpio` interface.
///
/// The line is configured as an output when it's opened, and is unexported
/// when `SysfsLine` goes out of scope.
pub struct SysfsLine {
    line: u32,
    value: File,
}

impl SysfsLine {
    /// Opens the specified line and configures it as an output, initially set low.
    ///
    /// Accepted names are described [here]. If the line wasn't exported by
    /// someone else, and configuring it fails, it's unexported again before
    /// the error is returned.
    ///
    /// [here]: index.html#line-names
    pub fn open(name: &str) -> Result<SysfsLine> {
        let line = parse_line_name(name)?;
        let exported = Path::new(&line_path(line)).exists();

        export(line)?;

        match configure(line) {
            Ok(value) => {
                log::debug!("Opened GPIO line {} ({}) as output", line, name);

                Ok(SysfsLine { line, value })
            }
            Err(e) => {
                if !exported {
                    let _ = unexport(line);
                }

                Err(e)
            }
        }
    }

    /// Returns the line's GPIO number.
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl OutputLine for SysfsLine {
    fn write(&mut self, level: Level) -> io::Result<()> {
        let value: &[u8] = match level {
            Level::Low => b"0",
            Level::High => b"1",
        };

        self.value.write_all_at(value, 0)
    }
}

impl fmt::Debug for SysfsLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SysfsLine")
            .field("line", &self.line)
            .field("value", &self.value)
            .finish()
    }
}

impl Drop for SysfsLine {
    fn drop(&mut self) {
        if let Err(e) = unexport(self.line) {
            log::warn!("Unable to unexport GPIO line {}: {}", self.line, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_line_names() {
        assert_eq!(parse_line_name("21").unwrap(), 21);
        assert_eq!(parse_line_name("BCM21").unwrap(), 21);
        assert_eq!(parse_line_name("bcm4").unwrap(), 4);
        assert_eq!(parse_line_name("GPIO17").unwrap(), 17);
        assert_eq!(parse_line_name("gpio512").unwrap(), 512);
        assert_eq!(parse_line_name(" gpio5 ").unwrap(), 5);
    }

    #[test]
    fn rejects_invalid_line_names() {
        for name in &["", "BCM", "gpio-1", "PWM0", "21a", "BCM 21", "12.5"] {
            match parse_line_name(name) {
                Err(Error::InvalidLineName(ref n)) => assert_eq!(n, name),
                other => panic!("{:?} parsed as {:?}", name, other),
            }
        }
    }

    #[test]
    fn permission_errors_name_the_path() {
        let err = map_io_error(
            io::Error::from(io::ErrorKind::PermissionDenied),
            4,
            "/sys/class/gpio/export",
        );

        match err {
            Error::PermissionDenied(path) => assert_eq!(path, "/sys/class/gpio/export"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn configure_fails_for_missing_line() {
        // Never exported, so waiting for its group fails before anything is written
        match configure(4_000_000) {
            Err(Error::Io(ref e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn rejected_exports_map_to_line_not_available() {
        let err = map_io_error(io::Error::from(io::ErrorKind::InvalidInput), 999, "export");

        assert!(matches!(err, Error::LineNotAvailable(999)));
    }
}
