//! Format-dispatching entry point for reading message logs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::binary::{self, BinaryStream};
use crate::codec::{CodecResolver, StandardCodecs};
use crate::error::LogError;
use crate::file::LogFile;
use crate::format::{BINARY_LOG_EXTENSION, LogFormat};
use crate::log::{LogBuilder, MessageLog};
use crate::message::LogEntry;
use crate::text::{self, TextStream};

/// Per-record wait before a binary parse is abandoned.
pub const DEFAULT_RECORD_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest binary record accepted, in bytes.
pub const DEFAULT_MAX_RECORD_BYTES: u64 = 64 * 1024 * 1024;

/// Tunables for reading logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// How long to wait for any single binary record.
    pub record_timeout: Duration,
    /// Records claiming more bytes than this are rejected without reading them.
    pub max_record_bytes: u64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            record_timeout: DEFAULT_RECORD_TIMEOUT,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

/// Reads message logs of one format.
///
/// [`parse`](Self::parse) replaces any previously parsed log. A failed parse
/// leaves the reader empty, so [`log`](Self::log) never exposes a partial
/// result.
pub struct MessageLogReader {
    format: LogFormat,
    resolver: Arc<dyn CodecResolver>,
    options: ReaderOptions,
    log: Option<MessageLog>,
}

impl std::fmt::Debug for MessageLogReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLogReader")
            .field("format", &self.format)
            .field("options", &self.options)
            .field("log", &self.log.as_ref().map(MessageLog::file_name))
            .finish_non_exhaustive()
    }
}

impl MessageLogReader {
    pub fn new(format: LogFormat, resolver: Arc<dyn CodecResolver>, options: ReaderOptions) -> Self {
        Self {
            format,
            resolver,
            options,
            log: None,
        }
    }

    /// A reader for the format implied by `name`, using the standard codecs.
    #[must_use]
    pub fn for_file_name(name: &str) -> Self {
        Self::new(
            LogFormat::from_file_name(name),
            Arc::new(StandardCodecs::default()),
            ReaderOptions::default(),
        )
    }

    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    #[must_use]
    pub const fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Reads the whole file.
    ///
    /// Unreadable lines or records are logged and skipped. Fatal failures
    /// (missing file, wrong extension, I/O, a record exceeding the timeout)
    /// discard everything read so far.
    pub fn parse(&mut self, file: &dyn LogFile) -> Result<&MessageLog, LogError> {
        self.log = None;
        let log = match self.format {
            LogFormat::Text => self.parse_text(file)?,
            LogFormat::Binary => binary::parse(file, self.resolver.as_ref(), &self.options)?,
        };
        Ok(&*self.log.insert(log))
    }

    fn parse_text(&self, file: &dyn LogFile) -> Result<MessageLog, LogError> {
        let mut stream = TextStream::open(file, self.resolver.as_ref(), 0, usize::MAX)?;
        let mut builder = LogBuilder::default();
        for entry in stream.by_ref() {
            builder.push(entry?);
        }
        builder.set_domain_session(stream.domain_session());
        let log = builder.finish(file.name(), LogFormat::Text);
        tracing::debug!(file = %log.file_name(), messages = log.len(), "parsed text message log");
        Ok(log)
    }

    /// The last successfully parsed log, or `None` if nothing has been parsed.
    #[must_use]
    pub const fn log(&self) -> Option<&MessageLog> {
        self.log.as_ref()
    }

    /// Forgets the parsed log.
    pub fn reset(&mut self) {
        self.log = None;
    }

    /// Lazily decodes every entry of the file.
    pub fn stream_messages(&self, file: &dyn LogFile) -> Result<MessageStream<'_>, LogError> {
        self.stream_messages_range(file, 0, usize::MAX)
    }

    /// Lazily decodes the entries on lines (or records) `[from, until)`.
    pub fn stream_messages_range(
        &self,
        file: &dyn LogFile,
        from: usize,
        until: usize,
    ) -> Result<MessageStream<'_>, LogError> {
        let inner = match self.format {
            LogFormat::Text => {
                StreamInner::Text(TextStream::open(file, self.resolver.as_ref(), from, until)?)
            }
            LogFormat::Binary => StreamInner::Binary(BinaryStream::open(
                file,
                self.resolver.as_ref(),
                &self.options,
                from,
                until,
            )?),
        };
        Ok(MessageStream { inner: Some(inner) })
    }

    /// Whether `file` looks like a message log of this reader's format.
    ///
    /// Binary logs are recognized by name alone; text files are scanned until
    /// a delimited line is found.
    pub fn is_message_log(&self, file: &dyn LogFile) -> Result<bool, LogError> {
        match self.format {
            LogFormat::Binary => Ok(crate::format::is_binary_log_name(file.name())),
            LogFormat::Text => text::is_message_log(file),
        }
    }

    /// Parses a binary log and writes it to `writer` as a text log.
    ///
    /// Returns the number of messages written.
    pub fn convert_to_text<W: Write>(&mut self, input: &dyn LogFile, writer: &mut W) -> Result<usize, LogError> {
        self.require_binary(input)?;
        let resolver = Arc::clone(&self.resolver);
        let log = self.parse(input)?;
        binary::write_converted(log, resolver.as_ref(), writer)
    }

    /// Parses a binary log and writes its text conversion to `output`.
    ///
    /// The output file is only created once the input has parsed.
    pub fn write_log_as_json(&mut self, input: &dyn LogFile, output: &Path) -> Result<usize, LogError> {
        self.require_binary(input)?;
        let resolver = Arc::clone(&self.resolver);
        let log = self.parse(input)?;

        let output_name = output.display().to_string();
        let file = File::create(output).map_err(|source| LogError::Write {
            file: output_name.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        let written = binary::write_converted(log, resolver.as_ref(), &mut writer)?;
        writer.flush().map_err(|source| LogError::Write {
            file: output_name.clone(),
            source,
        })?;
        tracing::info!(input = %input.name(), output = %output_name, messages = written, "converted binary log");
        Ok(written)
    }

    fn require_binary(&self, input: &dyn LogFile) -> Result<(), LogError> {
        if self.format == LogFormat::Binary {
            Ok(())
        } else {
            Err(LogError::NotBinaryLog {
                file: input.name().to_string(),
                expected: BINARY_LOG_EXTENSION,
            })
        }
    }
}

enum StreamInner<'r> {
    Text(TextStream<'r>),
    Binary(BinaryStream<'r>),
}

/// A lazy, single-pass sequence of log entries.
///
/// Lines or records that cannot be decoded are skipped. A fatal read error is
/// yielded once, after which the stream is exhausted. Dropping or
/// [closing](Self::close) the stream releases the file.
pub struct MessageStream<'r> {
    inner: Option<StreamInner<'r>>,
}

impl MessageStream<'_> {
    /// Whether the entries seen so far came from a domain-session log.
    ///
    /// `None` until a line or record carrying a message has been read.
    #[must_use]
    pub fn is_domain_session_log(&self) -> Option<bool> {
        match self.inner.as_ref()? {
            StreamInner::Text(stream) => stream.domain_session(),
            StreamInner::Binary(stream) => stream.domain_session(),
        }
    }

    /// Releases the underlying file before the stream is exhausted.
    pub fn close(mut self) {
        self.inner = None;
    }
}

impl Iterator for MessageStream<'_> {
    type Item = Result<LogEntry, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = match self.inner.as_mut()? {
            StreamInner::Text(stream) => stream.next(),
            StreamInner::Binary(stream) => stream.next(),
        };
        if !matches!(next, Some(Ok(_))) {
            self.inner = None;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::tests::{StalledFile, encode_records, message_record, session_message};
    use crate::file::{LocalFile, MemoryFile};
    use crate::message_type::MessageType;
    use tempfile::TempDir;

    fn text_log(lines: usize) -> MemoryFile {
        let mut out = Vec::new();
        let log = binary_log(lines);
        let mut reader = MessageLogReader::for_file_name(log.name());
        reader.convert_to_text(&log, &mut out).unwrap();
        MemoryFile::new("ds_1_converted.log", out)
    }

    fn binary_log(count: usize) -> MemoryFile {
        let records: Vec<_> = (0..count)
            .map(|i| {
                let seq = i32::try_from(i).unwrap();
                let mut msg = session_message(MessageType::LearnerState, seq, 1000 + i64::from(seq) * 250);
                msg.payload = serde_json::json!({
                    "performance": {"score": seq},
                    "cognitive": {},
                    "affective": {},
                });
                message_record(&msg, Some((f64::from(seq) * 0.25, f64::from(seq) * 0.25 + 0.01)))
            })
            .collect();
        MemoryFile::new("ds_1.protobuf.bin", encode_records(&records))
    }

    #[test]
    fn reader_is_empty_until_parsed() {
        let mut reader = MessageLogReader::for_file_name("ds_1.log");
        assert!(reader.log().is_none());

        let empty = MemoryFile::new("ds_1.log", "");
        let log = reader.parse(&empty).unwrap();
        assert!(log.is_empty());
        assert!(reader.log().is_some());

        reader.reset();
        assert!(reader.log().is_none());
    }

    #[test]
    fn format_follows_file_name() {
        assert_eq!(MessageLogReader::for_file_name("a.protobuf.bin").format(), LogFormat::Binary);
        assert_eq!(
            MessageLogReader::for_file_name("a.protobuf.bin.logPatch").format(),
            LogFormat::Binary
        );
        assert_eq!(MessageLogReader::for_file_name("a.log").format(), LogFormat::Text);
    }

    #[test]
    fn binary_round_trips_through_text() {
        let binary = binary_log(4);
        let mut binary_reader = MessageLogReader::for_file_name(binary.name());
        let original: Vec<_> = binary_reader.parse(&binary).unwrap().messages().to_vec();

        let converted = text_log(4);
        let mut text_reader = MessageLogReader::for_file_name(converted.name());
        let reparsed = text_reader.parse(&converted).unwrap();

        assert!(reparsed.is_domain_session_log());
        assert_eq!(reparsed.len(), original.len());
        for (a, b) in original.iter().zip(reparsed.messages()) {
            assert_eq!(a.message_type(), b.message_type());
            assert_eq!(a.sequence_number(), b.sequence_number());
            assert_eq!(a.timestamp(), b.timestamp());
            assert_eq!(a.message().payload, b.message().payload);
            let (a, b) = (a.as_domain_session().unwrap(), b.as_domain_session().unwrap());
            assert!((a.elapsed_domain_session_time() - b.elapsed_domain_session_time()).abs() < 1e-9);
            assert!((a.write_time() - b.write_time()).abs() < 1e-9);
        }
    }

    #[test]
    fn timeout_leaves_no_messages() {
        let mut reader = MessageLogReader::new(
            LogFormat::Binary,
            Arc::new(StandardCodecs::default()),
            ReaderOptions {
                record_timeout: Duration::from_millis(100),
                ..ReaderOptions::default()
            },
        );
        let good = binary_log(2);
        assert_eq!(reader.parse(&good).unwrap().len(), 2);

        let err = reader.parse(&StalledFile).unwrap_err();
        assert!(matches!(err, LogError::DecodeTimeout { .. }));
        assert!(reader.log().is_none());
    }

    #[test]
    fn stream_range_and_close() {
        let reader = MessageLogReader::for_file_name("ds_1_converted.log");
        let file = text_log(6);

        let mut stream = reader.stream_messages_range(&file, 2, 5).unwrap();
        assert_eq!(stream.is_domain_session_log(), None);
        let first = stream.next().unwrap().unwrap();
        assert_eq!(first.sequence_number(), 2);
        assert_eq!(stream.is_domain_session_log(), Some(true));
        stream.close();

        let all: Vec<_> = reader
            .stream_messages(&file)
            .unwrap()
            .map(|e| e.unwrap().sequence_number())
            .collect();
        assert_eq!(all, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn stream_of_missing_file_fails_up_front() {
        let dir = TempDir::new().unwrap();
        let reader = MessageLogReader::for_file_name("missing.log");
        let missing = LocalFile::new(dir.path().join("missing.log"));
        assert!(matches!(
            reader.stream_messages(&missing),
            Err(LogError::NotFound { .. })
        ));
    }

    #[test]
    fn binary_stream_yields_timeout_once() {
        let reader = MessageLogReader::new(
            LogFormat::Binary,
            Arc::new(StandardCodecs::default()),
            ReaderOptions {
                record_timeout: Duration::from_millis(50),
                ..ReaderOptions::default()
            },
        );
        let mut stream = reader.stream_messages(&StalledFile).unwrap();
        assert!(matches!(stream.next(), Some(Err(LogError::DecodeTimeout { .. }))));
        assert!(stream.next().is_none());
    }

    #[test]
    fn message_log_sniffing() {
        let text = MessageLogReader::for_file_name("x.log");
        assert!(text.is_message_log(&text_log(1)).unwrap());
        assert!(!text.is_message_log(&MemoryFile::new("x.log", "plain text\n")).unwrap());

        let binary = MessageLogReader::for_file_name("x.protobuf.bin");
        assert!(binary.is_message_log(&MemoryFile::new("x.protobuf.bin", Vec::new())).unwrap());
        assert!(!binary.is_message_log(&MemoryFile::new("x.bin", Vec::new())).unwrap());
    }

    #[test]
    fn write_log_as_json_creates_converted_file() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("ds_1_converted.log");
        let mut reader = MessageLogReader::for_file_name("ds_1.protobuf.bin");

        let written = reader.write_log_as_json(&binary_log(3), &output).unwrap();
        assert_eq!(written, 3);
        assert_eq!(std::fs::read_to_string(&output).unwrap().lines().count(), 3);
        assert_eq!(reader.log().map(MessageLog::len), Some(3));
    }

    #[test]
    fn conversion_requires_binary_reader() {
        let mut reader = MessageLogReader::for_file_name("ds_1.log");
        let err = reader.convert_to_text(&binary_log(1), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, LogError::NotBinaryLog { .. }));
    }
}
