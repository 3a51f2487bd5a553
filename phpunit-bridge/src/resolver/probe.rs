// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use tracing::debug;

/// Access to the host filesystem and process table, as needed by
/// [`ExecutableResolver`](super::ExecutableResolver).
///
/// [`SystemProbe`] is the real implementation. Tests substitute a fake to script the host and
/// count probe invocations.
pub trait HostProbe: Send + Sync {
    /// Returns true if `path` exists.
    fn exists(&self, path: &str) -> bool;

    /// Returns `path` made absolute against the current directory.
    fn absolute(&self, path: &str) -> String;

    /// Runs `locator` (`which` or `where`) with `name` as its only argument.
    ///
    /// Returns the captured standard output if the locator exited successfully.
    fn locate(&self, locator: &str, name: &str) -> Option<Vec<u8>>;

    /// Returns the state of the file at `path`, for deletion purposes.
    fn file_status(&self, path: &Utf8Path) -> io::Result<FileStatus>;

    /// Removes the file at `path`.
    fn remove_file(&self, path: &Utf8Path) -> io::Result<()>;
}

/// The state of a file about to be deleted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileStatus {
    /// The file does not exist.
    Missing,

    /// The file exists and nothing prevents deleting it.
    Accessible,

    /// The file exists but is currently locked, e.g. held open by another process on Windows.
    Locked,
}

/// A [`HostProbe`] backed by the real filesystem and real processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemProbe;

impl HostProbe for SystemProbe {
    fn exists(&self, path: &str) -> bool {
        Utf8Path::new(path).exists()
    }

    fn absolute(&self, path: &str) -> String {
        match std::path::absolute(path) {
            Ok(absolute) => match Utf8PathBuf::from_path_buf(absolute) {
                Ok(absolute) => absolute.into_string(),
                Err(absolute) => absolute.to_string_lossy().into_owned(),
            },
            Err(error) => {
                debug!(path, %error, "unable to make path absolute, using it as-is");
                path.to_owned()
            }
        }
    }

    fn locate(&self, locator: &str, name: &str) -> Option<Vec<u8>> {
        let output = duct::cmd(locator, [name])
            .stdout_capture()
            .stderr_null()
            .unchecked()
            .run();

        match output {
            Ok(output) if output.status.success() => Some(output.stdout),
            Ok(output) => {
                debug!(locator, name, status = %output.status, "locator did not find executable");
                None
            }
            Err(error) => {
                debug!(locator, name, %error, "failed to run locator");
                None
            }
        }
    }

    fn file_status(&self, path: &Utf8Path) -> io::Result<FileStatus> {
        match fs_err::metadata(path) {
            Ok(_) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(FileStatus::Missing),
            Err(error) => return Err(error),
        }

        if cfg!(windows) {
            // Files held open by another process can't be deleted on Windows. Opening one for
            // writing fails with a sharing or lock violation.
            match fs_err::OpenOptions::new().write(true).open(path) {
                Ok(_) => Ok(FileStatus::Accessible),
                Err(error) if is_windows_lock_error(&error) => Ok(FileStatus::Locked),
                Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(FileStatus::Missing),
                Err(error) => Err(error),
            }
        } else {
            // Unlinking depends on the directory, not on the file's own mode.
            Ok(FileStatus::Accessible)
        }
    }

    fn remove_file(&self, path: &Utf8Path) -> io::Result<()> {
        fs_err::remove_file(path)
    }
}

fn is_windows_lock_error(error: &io::Error) -> bool {
    // ERROR_SHARING_VIOLATION and ERROR_LOCK_VIOLATION.
    const WINDOWS_LOCK_ERRORS: [i32; 2] = [32, 33];

    error.kind() == io::ErrorKind::PermissionDenied
        || error
            .raw_os_error()
            .is_some_and(|code| WINDOWS_LOCK_ERRORS.contains(&code))
}

/// Normalizes the output of a locator into a single path.
///
/// Takes the first line, strips carriage returns, and trims surrounding whitespace.
pub fn normalize_output(output: &[u8]) -> String {
    let output = String::from_utf8_lossy(output);
    output
        .split('\n')
        .next()
        .unwrap_or_default()
        .replace('\r', "")
        .trim()
        .to_owned()
}
