//! CLI subcommand implementations.

pub mod check;
pub mod convert;
pub mod events;
pub mod messages;
pub mod summary;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use msglog_core::{LogFormat, MessageLogReader, MessageType, StandardCodecs};

use crate::Config;

/// A reader for the format implied by the file's name.
fn reader_for(path: &Path, config: &Config) -> MessageLogReader {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    MessageLogReader::new(
        LogFormat::from_file_name(name),
        Arc::new(StandardCodecs::default()),
        config.reader_options(),
    )
}

fn parse_message_type(name: &str) -> Result<MessageType> {
    Ok(name.parse()?)
}
