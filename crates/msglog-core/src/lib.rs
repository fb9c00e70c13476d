//! Core logic for reading session message logs.
//!
//! This crate contains:
//! - Message model: protocol messages and domain-session entries
//! - Parsers: line-oriented text logs and length-delimited binary logs
//! - Reader: format dispatch, streaming, and binary-to-text conversion
//! - Queries: per-type lookup, duration, and request/reply event timing

mod binary;
pub mod codec;
pub mod error;
mod events;
pub mod file;
pub mod format;
mod log;
pub mod message;
pub mod message_type;
mod reader;
mod scan;
pub mod text;
pub mod wire;

pub use codec::{CodecResolver, JsonCodec, MessageRegistry, StandardCodecs, TextCodec};
pub use error::{CodecError, LogError, ParseError};
pub use events::TimedEvent;
pub use file::{LocalFile, LogFile, MemoryFile};
pub use format::LogFormat;
pub use log::MessageLog;
pub use message::{DomainSession, DomainSessionMessageEntry, LogEntry, Message, UserSession};
pub use message_type::{MessageType, UnknownMessageType};
pub use reader::{
    DEFAULT_MAX_RECORD_BYTES, DEFAULT_RECORD_TIMEOUT, MessageLogReader, MessageStream,
    ReaderOptions,
};
pub use scan::{LogSummary, scan_message_logs, summarize_log};
pub use text::parse_message_from_log_line;
