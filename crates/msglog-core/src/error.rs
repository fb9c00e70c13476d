//! Error types for message log reading.
//!
//! [`LogError`] aborts a whole parse and always names the file. [`ParseError`]
//! and [`CodecError`] describe a single bad line or record; the parsers log
//! them and move on.

use std::time::Duration;

use thiserror::Error;

use crate::message_type::MessageType;

/// Fatal errors that abort reading a message log.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("message log {file} does not exist")]
    NotFound { file: String },

    #[error("{file} is not a binary message log (expected a {expected} extension)")]
    NotBinaryLog { file: String, expected: &'static str },

    #[error("failed to read message log {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {timeout:?} reading record {record} of {file}")]
    DecodeTimeout {
        file: String,
        record: usize,
        timeout: Duration,
    },

    #[error("record reader for {file} failed: {reason}")]
    ReaderFailed { file: String, reason: String },

    #[error("corrupt record {record} in {file}: {source}")]
    CorruptRecord {
        file: String,
        record: usize,
        #[source]
        source: prost::DecodeError,
    },

    #[error("record {record} in {file} claims {len} bytes (limit {limit})")]
    RecordTooLarge {
        file: String,
        record: usize,
        len: u64,
        limit: u64,
    },

    #[error("failed to write converted log {file}: {source}")]
    Write {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

impl LogError {
    pub(crate) fn io(file: &str, source: std::io::Error) -> Self {
        Self::Io {
            file: file.to_string(),
            source,
        }
    }
}

/// Errors resolving or applying a codec to one message.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("no codec registered for encoding {0}")]
    UnknownEncoding(String),

    #[error(transparent)]
    UnknownMessageType(#[from] crate::message_type::UnknownMessageType),

    #[error("{message_type} message is missing required field {field}")]
    MissingField {
        message_type: String,
        field: String,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single line or record that could not be turned into a log entry.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no #ENCODING# delimiter found")]
    MissingDelimiter,

    #[error("invalid elapsed time {0:?}")]
    InvalidElapsedTime(String),

    #[error("{message_type} message {sequence_number} has no domain session identity")]
    MissingSessionIdentity {
        message_type: MessageType,
        sequence_number: i32,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),
}
