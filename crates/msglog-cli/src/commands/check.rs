//! Implementation of the `msglog check` command.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use msglog_core::LocalFile;

use super::reader_for;
use crate::Config;

/// Prints one verdict per file. Returns how many were message logs.
pub fn run<W: Write>(writer: &mut W, files: &[PathBuf], config: &Config) -> Result<usize> {
    let mut found = 0;
    for path in files {
        let reader = reader_for(path, config);
        let is_log = reader
            .is_message_log(&LocalFile::new(path))
            .with_context(|| format!("failed to check {}", path.display()))?;
        if is_log {
            found += 1;
            writeln!(writer, "{}: {} message log", path.display(), reader.format())?;
        } else {
            writeln!(writer, "{}: not a message log", path.display())?;
        }
    }
    Ok(found)
}
