//! Implementation of the `msglog convert` command.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use msglog_core::format::converted_log_name;
use msglog_core::{LocalFile, LogFile, LogFormat};

use super::reader_for;
use crate::Config;

/// Converts a binary log to text, returning the path written.
pub fn run<W: Write>(writer: &mut W, file: &Path, output: Option<&Path>, config: &Config) -> Result<PathBuf> {
    let input = LocalFile::new(file);
    let mut reader = reader_for(file, config);
    if reader.format() != LogFormat::Binary {
        bail!("{} is not a binary message log", file.display());
    }

    let output = output.map_or_else(
        || file.with_file_name(converted_log_name(input.name())),
        Path::to_path_buf,
    );
    let written = reader
        .write_log_as_json(&input, &output)
        .with_context(|| format!("failed to convert {}", file.display()))?;

    writeln!(writer, "Wrote {written} messages to {}", output.display())?;
    Ok(output)
}
