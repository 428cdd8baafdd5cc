//! Atomic pid file I/O operations.
//!
//! Format: the decimal pid followed by a newline.
//! ```text
//! <pid>
//! ```

use std::fs;
use std::io;
use std::path::Path;

/// Write the pid file atomically using temp file + rename.
///
/// # Atomicity
/// 1. Write to `<path>.tmp`
/// 2. Rename to `<path>` (atomic on Unix/macOS)
pub fn write_pidfile(path: &Path, pid: u32) -> io::Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }

    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");

    fs::write(&temp_path, format!("{pid}\n"))?;
    fs::rename(&temp_path, path)
}

/// Read the pid file.
///
/// Returns `Ok(None)` when the file is missing or does not hold a pid.
pub fn read_pidfile(path: &Path) -> io::Result<Option<u32>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(parse_pidfile_content(&content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Delete the pid file (idempotent - no error if missing).
pub fn delete_pidfile(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn parse_pidfile_content(content: &str) -> Option<u32> {
    content
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|pid| *pid > 0)
}
