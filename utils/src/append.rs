//! Append-only line logs.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Append `line` plus a newline to `path`, creating the file and its parents.
///
/// The line is written with a single `write_all` so concurrent appenders on
/// the same host do not interleave within a line.
pub fn append_line(path: impl AsRef<Path>, line: &str) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line.trim_end_matches(['\r', '\n']));
    buf.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(buf.as_bytes())?;
    file.flush()
}
