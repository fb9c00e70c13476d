//! Implementation of the `msglog events` command.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use msglog_core::{LocalFile, MessageType, TimedEvent};

use super::{parse_message_type, reader_for};
use crate::Config;

/// Which messages to time, and against what.
#[derive(Debug, Clone)]
pub struct EventQuery<'a> {
    pub start: usize,
    pub stop_scanning: &'a str,
    pub stop_timer: &'a str,
    pub interesting: &'a [String],
}

pub fn run<W: Write>(
    writer: &mut W,
    file: &Path,
    query: &EventQuery<'_>,
    json: bool,
    config: &Config,
) -> Result<usize> {
    let stop_scanning = parse_message_type(query.stop_scanning)?;
    let stop_timer = parse_message_type(query.stop_timer)?;
    let interesting = query
        .interesting
        .iter()
        .map(|name| parse_message_type(name))
        .collect::<Result<HashSet<MessageType>>>()?;

    let mut reader = reader_for(file, config);
    let log = reader
        .parse(&LocalFile::new(file))
        .with_context(|| format!("failed to read {}", file.display()))?;
    let events = log.messages_after_index_until_type(query.start, stop_scanning, stop_timer, &interesting);

    if json {
        for event in &events {
            serde_json::to_writer(&mut *writer, event).context("failed to serialize event")?;
            writeln!(writer)?;
        }
    } else {
        write!(writer, "{}", format_events(&events))?;
    }
    Ok(events.len())
}

fn format_events(events: &[TimedEvent]) -> String {
    let mut out = String::new();
    if events.is_empty() {
        out.push_str("No events found.\n");
        return out;
    }
    writeln!(out, "{:>6}  {:<28}  {:>8}  {:>10}", "INDEX", "TYPE", "SEQ", "DURATION").unwrap();
    for event in events {
        let duration = if event.duration_millis == 0 {
            "-".to_string()
        } else {
            format!("{}ms", event.duration_millis)
        };
        writeln!(
            out,
            "{:>6}  {:<28}  {:>8}  {:>10}",
            event.index,
            event.entry.message_type().as_str(),
            event.entry.sequence_number(),
            duration
        )
        .unwrap();
    }
    out
}
