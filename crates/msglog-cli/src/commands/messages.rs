//! Implementation of the `msglog messages` command.
//!
//! Streams a log and prints each entry as one JSON line.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use msglog_core::LocalFile;

use super::{parse_message_type, reader_for};
use crate::Config;

/// Prints the entries on lines (or records) `[from, until)`, optionally of one type.
///
/// Returns the number of entries printed.
pub fn run<W: Write>(
    writer: &mut W,
    file: &Path,
    message_type: Option<&str>,
    from: usize,
    until: Option<usize>,
    config: &Config,
) -> Result<usize> {
    let message_type = message_type.map(parse_message_type).transpose()?;
    let reader = reader_for(file, config);
    let stream = reader
        .stream_messages_range(&LocalFile::new(file), from, until.unwrap_or(usize::MAX))
        .with_context(|| format!("failed to open {}", file.display()))?;

    let mut printed = 0;
    for entry in stream {
        let entry = entry.with_context(|| format!("failed to read {}", file.display()))?;
        if message_type.is_some_and(|t| t != entry.message_type()) {
            continue;
        }
        serde_json::to_writer(&mut *writer, &entry).context("failed to serialize message")?;
        // Handle broken pipe gracefully (e.g., when piped to `head`)
        if writeln!(writer).is_err() {
            break;
        }
        printed += 1;
    }
    Ok(printed)
}
