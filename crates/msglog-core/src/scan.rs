//! Summaries of parsed logs and directory scanning.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::codec::CodecResolver;
use crate::error::LogError;
use crate::file::{LocalFile, LogFile};
use crate::format::LogFormat;
use crate::log::MessageLog;
use crate::message_type::MessageType;
use crate::reader::{MessageLogReader, ReaderOptions};

/// Aggregate facts about one parsed log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSummary {
    pub path: PathBuf,
    pub file_name: String,
    pub format: LogFormat,
    pub domain_session: bool,
    pub message_count: usize,
    pub type_counts: BTreeMap<MessageType, usize>,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub duration_millis: Option<i64>,
}

/// Summarizes a parsed log found at `path`.
#[must_use]
pub fn summarize_log(log: &MessageLog, path: &Path) -> LogSummary {
    let type_counts = log
        .message_types()
        .into_iter()
        .map(|t| (t, log.messages_by_type(t).map_or(0, <[_]>::len)))
        .collect();

    LogSummary {
        path: path.to_path_buf(),
        file_name: log.file_name().to_string(),
        format: log.format(),
        domain_session: log.is_domain_session_log(),
        message_count: log.len(),
        type_counts,
        first_timestamp: log
            .messages()
            .first()
            .and_then(|m| DateTime::from_timestamp_millis(m.timestamp())),
        duration_millis: log.duration_millis(),
    }
}

/// Parses every message log directly inside `dir`.
///
/// Files that are not message logs, or that fail to parse, are skipped with a
/// warning. Results are sorted by file name. A missing directory yields no
/// summaries.
pub fn scan_message_logs(
    dir: &Path,
    resolver: &Arc<dyn CodecResolver>,
    options: &ReaderOptions,
) -> Result<Vec<LogSummary>, LogError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let dir_name = dir.display().to_string();

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| LogError::io(&dir_name, e))? {
        let path = entry.map_err(|e| LogError::io(&dir_name, e))?.path();
        if path.is_file() {
            files.push(LocalFile::new(path));
        }
    }

    let mut summaries: Vec<LogSummary> = files
        .par_iter()
        .filter_map(|file| {
            let mut reader = MessageLogReader::new(
                LogFormat::from_file_name(file.name()),
                Arc::clone(resolver),
                options.clone(),
            );
            match reader.is_message_log(file) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => {
                    tracing::warn!(path = ?file.path(), error = %e, "skipping unreadable file");
                    return None;
                }
            }
            match reader.parse(file) {
                Ok(log) => Some(summarize_log(log, file.path())),
                Err(e) => {
                    tracing::warn!(path = ?file.path(), error = %e, "skipping invalid message log");
                    None
                }
            }
        })
        .collect();

    summaries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(summaries)
}
