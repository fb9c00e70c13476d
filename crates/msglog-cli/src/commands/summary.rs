//! Implementation of the `msglog summary` command.

use std::fmt::Write as _;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use msglog_core::{CodecResolver, LocalFile, LogSummary, StandardCodecs, scan_message_logs, summarize_log};

use super::reader_for;
use crate::Config;

pub fn run<W: Write>(writer: &mut W, paths: &[PathBuf], json: bool, config: &Config) -> Result<()> {
    let summaries = collect(paths, config)?;
    if json {
        serde_json::to_writer_pretty(&mut *writer, &summaries).context("failed to serialize summaries")?;
        writeln!(writer)?;
    } else {
        write!(writer, "{}", format_summaries(&summaries))?;
    }
    Ok(())
}

/// Parses files directly and scans directories for logs.
fn collect(paths: &[PathBuf], config: &Config) -> Result<Vec<LogSummary>> {
    let resolver: Arc<dyn CodecResolver> = Arc::new(StandardCodecs::default());
    let options = config.reader_options();
    let mut summaries = Vec::new();

    for path in paths {
        if path.is_dir() {
            let found = scan_message_logs(path, &resolver, &options)
                .with_context(|| format!("failed to scan {}", path.display()))?;
            tracing::debug!(dir = %path.display(), logs = found.len(), "scanned directory");
            summaries.extend(found);
        } else {
            let mut reader = reader_for(path, config);
            let log = reader
                .parse(&LocalFile::new(path))
                .with_context(|| format!("failed to read {}", path.display()))?;
            summaries.push(summarize_log(log, path));
        }
    }
    Ok(summaries)
}

fn format_duration(millis: Option<i64>) -> String {
    match millis {
        None => "unknown".to_string(),
        Some(ms) if ms.abs() < 1000 => format!("{ms}ms"),
        Some(ms) => {
            let secs = ms / 1000;
            let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
            if h > 0 {
                format!("{h}h {m}m {s}s")
            } else if m > 0 {
                format!("{m}m {s}s")
            } else {
                format!("{s}s")
            }
        }
    }
}

fn format_summaries(summaries: &[LogSummary]) -> String {
    let mut out = String::new();
    if summaries.is_empty() {
        out.push_str("No message logs found.\n");
        return out;
    }

    for (i, summary) in summaries.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let kind = if summary.domain_session {
            "domain session"
        } else {
            "system"
        };
        writeln!(out, "{} ({}, {kind})", summary.file_name, summary.format).unwrap();
        writeln!(out, "  Messages: {}", summary.message_count).unwrap();
        if let Some(first) = summary.first_timestamp {
            writeln!(out, "  Started:  {}", first.format("%Y-%m-%d %H:%M:%S UTC")).unwrap();
        }
        writeln!(out, "  Duration: {}", format_duration(summary.duration_millis)).unwrap();

        let width = summary
            .type_counts
            .keys()
            .map(|t| t.as_str().len())
            .max()
            .unwrap_or(0);
        for (message_type, count) in &summary.type_counts {
            writeln!(out, "    {:<width$}  {count}", message_type.as_str()).unwrap();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};
    use insta::assert_snapshot;
    use msglog_core::{LogFormat, MessageType};

    use super::*;

    fn summary() -> LogSummary {
        LogSummary {
            path: PathBuf::from("/logs/domainSession12_uId1.protobuf.bin"),
            file_name: "domainSession12_uId1.protobuf.bin".to_string(),
            format: LogFormat::Binary,
            domain_session: true,
            message_count: 5,
            type_counts: BTreeMap::from([
                (MessageType::Ack, 2),
                (MessageType::LessonStarted, 1),
                (MessageType::PedagogicalRequest, 2),
            ]),
            first_timestamp: Some(Utc.with_ymd_and_hms(2025, 1, 1, 9, 30, 0).unwrap()),
            duration_millis: Some(3_725_000),
        }
    }

    #[test]
    fn durations_are_human_readable() {
        assert_eq!(format_duration(None), "unknown");
        assert_eq!(format_duration(Some(250)), "250ms");
        assert_eq!(format_duration(Some(42_000)), "42s");
        assert_eq!(format_duration(Some(125_000)), "2m 5s");
        assert_eq!(format_duration(Some(3_725_000)), "1h 2m 5s");
    }

    #[test]
    fn summary_text_output() {
        let mut system = summary();
        system.file_name = "system.log".to_string();
        system.format = LogFormat::Text;
        system.domain_session = false;
        system.message_count = 0;
        system.type_counts.clear();
        system.first_timestamp = None;
        system.duration_millis = None;

        let output = format_summaries(&[summary(), system]);
        assert_snapshot!(output, @r"
        domainSession12_uId1.protobuf.bin (binary, domain session)
          Messages: 5
          Started:  2025-01-01 09:30:00 UTC
          Duration: 1h 2m 5s
            LessonStarted       1
            PedagogicalRequest  2
            ACK                 2

        system.log (text, system)
          Messages: 0
          Duration: unknown
        ");
    }

    #[test]
    fn empty_summary_output() {
        assert_eq!(format_summaries(&[]), "No message logs found.\n");
    }
}
