//! Length-delimited binary message logs.
//!
//! Records are read one at a time by a dedicated reader thread. The caller
//! waits at most [`ReaderOptions::record_timeout`] for each record; a record
//! that takes longer aborts the whole parse.

use std::io::{BufReader, Read, Write};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use prost::Message as _;

use crate::codec::{CodecResolver, JSON_ENCODING, JsonCodec, TextCodec};
use crate::error::{CodecError, LogError, ParseError};
use crate::file::LogFile;
use crate::format::{BINARY_LOG_EXTENSION, LogFormat, is_binary_log_name};
use crate::log::{LogBuilder, MessageLog};
use crate::message::{DomainSessionMessageEntry, LogEntry, UNKNOWN_ELAPSED_TIME};
use crate::reader::ReaderOptions;
use crate::text::{CODEC_DELIMITER, LinePrefix, format_log_line};
use crate::wire::{FrameError, LogRecord, read_frame};

enum ReadFailure {
    Frame(FrameError),
    Decode(prost::DecodeError),
}

type ReadResult = Result<Option<LogRecord>, ReadFailure>;

fn read_record<R: Read>(reader: &mut R, limit: u64) -> ReadResult {
    let Some(frame) = read_frame(reader, limit).map_err(ReadFailure::Frame)? else {
        return Ok(None);
    };
    LogRecord::decode(frame.as_slice())
        .map(Some)
        .map_err(ReadFailure::Decode)
}

/// Pulls records from a worker thread, one request at a time.
///
/// The worker reads only when asked, so nothing is read ahead of the caller.
/// After end of stream or any error the reader is fused and yields `None`.
pub(crate) struct RecordReader {
    file_name: String,
    requests: Sender<()>,
    responses: Receiver<ReadResult>,
    timeout: Duration,
    limit: u64,
    read: usize,
    done: bool,
}

impl RecordReader {
    pub(crate) fn open(file: &dyn LogFile, options: &ReaderOptions) -> Result<Self, LogError> {
        let file_name = file.name().to_string();
        if !file.exists() {
            return Err(LogError::NotFound { file: file_name });
        }
        if !is_binary_log_name(&file_name) {
            return Err(LogError::NotBinaryLog {
                file: file_name,
                expected: BINARY_LOG_EXTENSION,
            });
        }
        let stream = file.open().map_err(|e| LogError::io(&file_name, e))?;

        let (request_tx, request_rx) = crossbeam::channel::bounded::<()>(1);
        let (response_tx, response_rx) = crossbeam::channel::bounded(1);
        let limit = options.max_record_bytes;
        thread::Builder::new()
            .name("msglog-record-reader".to_string())
            .spawn(move || {
                let mut reader = BufReader::new(stream);
                for () in request_rx {
                    let result = read_record(&mut reader, limit);
                    let more = matches!(result, Ok(Some(_)));
                    if response_tx.send(result).is_err() || !more {
                        break;
                    }
                }
            })
            .map_err(|e| LogError::ReaderFailed {
                file: file_name.clone(),
                reason: format!("could not start reader thread: {e}"),
            })?;

        Ok(Self {
            file_name,
            requests: request_tx,
            responses: response_rx,
            timeout: options.record_timeout,
            limit,
            read: 0,
            done: false,
        })
    }

    pub(crate) fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Number of records returned so far.
    pub(crate) const fn records_read(&self) -> usize {
        self.read
    }

    pub(crate) fn next_record(&mut self) -> Result<Option<LogRecord>, LogError> {
        if self.done {
            return Ok(None);
        }
        let result = self.fetch();
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    fn fetch(&mut self) -> Result<Option<LogRecord>, LogError> {
        let record = self.read + 1;
        if self.requests.send(()).is_err() {
            return Err(self.reader_failed());
        }
        match self.responses.recv_timeout(self.timeout) {
            Ok(Ok(Some(next))) => {
                self.read = record;
                Ok(Some(next))
            }
            Ok(Ok(None)) => Ok(None),
            Ok(Err(ReadFailure::Frame(FrameError::Io(source)))) => {
                Err(LogError::io(&self.file_name, source))
            }
            Ok(Err(ReadFailure::Frame(FrameError::TooLarge(len)))) => {
                Err(LogError::RecordTooLarge {
                    file: self.file_name.clone(),
                    record,
                    len,
                    limit: self.limit,
                })
            }
            Ok(Err(ReadFailure::Decode(source))) => Err(LogError::CorruptRecord {
                file: self.file_name.clone(),
                record,
                source,
            }),
            Err(RecvTimeoutError::Timeout) => Err(LogError::DecodeTimeout {
                file: self.file_name.clone(),
                record,
                timeout: self.timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(self.reader_failed()),
        }
    }

    fn reader_failed(&self) -> LogError {
        LogError::ReaderFailed {
            file: self.file_name.clone(),
            reason: "reader thread exited".to_string(),
        }
    }
}

/// Turns records into entries, tracking the log's domain-session status.
pub(crate) struct RecordDecoder<'r> {
    resolver: &'r dyn CodecResolver,
    domain_session: Option<bool>,
}

impl<'r> RecordDecoder<'r> {
    pub(crate) const fn new(resolver: &'r dyn CodecResolver) -> Self {
        Self {
            resolver,
            domain_session: None,
        }
    }

    pub(crate) const fn domain_session(&self) -> Option<bool> {
        self.domain_session
    }

    /// Classifies the log from the first record carrying a message.
    pub(crate) fn observe(&mut self, record: &LogRecord) {
        if let Some(wire) = &record.message {
            self.domain_session
                .get_or_insert(wire.domain_session.is_some());
        }
    }

    /// Converts one record, or explains why it has no entry.
    fn convert(&mut self, record: &LogRecord) -> Result<Option<LogEntry>, ParseError> {
        self.observe(record);
        let Some(wire) = &record.message else {
            return Ok(None);
        };
        self.resolver.check_required_fields(wire)?;
        let message = self.resolver.to_common_message(wire)?;

        if self.domain_session == Some(true) {
            let entry = DomainSessionMessageEntry::new(
                message,
                record.elapsed_ds_time.unwrap_or(UNKNOWN_ELAPSED_TIME),
                record.write_time.unwrap_or(UNKNOWN_ELAPSED_TIME),
            )?;
            Ok(Some(LogEntry::DomainSession(entry)))
        } else {
            Ok(Some(LogEntry::System(message)))
        }
    }

    /// Like `convert`, but logs and drops records that fail.
    pub(crate) fn decode(&mut self, file_name: &str, index: usize, record: &LogRecord) -> Option<LogEntry> {
        match self.convert(record) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(file = %file_name, record = index + 1, error = %e, "skipping binary log record");
                None
            }
        }
    }
}

/// Reads a whole binary log.
pub(crate) fn parse(
    file: &dyn LogFile,
    resolver: &dyn CodecResolver,
    options: &ReaderOptions,
) -> Result<MessageLog, LogError> {
    let mut reader = RecordReader::open(file, options)?;
    let mut decoder = RecordDecoder::new(resolver);
    let mut builder = LogBuilder::default();

    while let Some(record) = reader.next_record()? {
        let index = reader.records_read() - 1;
        if let Some(entry) = decoder.decode(reader.file_name(), index, &record) {
            builder.push(entry);
        }
        builder.push_record(record);
    }
    builder.set_domain_session(decoder.domain_session());

    let log = builder.finish(reader.file_name(), LogFormat::Binary);
    tracing::debug!(
        file = %log.file_name(),
        messages = log.len(),
        records = log.original_records().len(),
        "parsed binary message log"
    );
    Ok(log)
}

/// Lazily decoded entries of a binary log over the record range `[from, until)`.
pub(crate) struct BinaryStream<'r> {
    reader: RecordReader,
    decoder: RecordDecoder<'r>,
    from: usize,
    until: usize,
}

impl<'r> BinaryStream<'r> {
    pub(crate) fn open(
        file: &dyn LogFile,
        resolver: &'r dyn CodecResolver,
        options: &ReaderOptions,
        from: usize,
        until: usize,
    ) -> Result<Self, LogError> {
        Ok(Self {
            reader: RecordReader::open(file, options)?,
            decoder: RecordDecoder::new(resolver),
            from,
            until,
        })
    }

    pub(crate) const fn domain_session(&self) -> Option<bool> {
        self.decoder.domain_session()
    }
}

impl Iterator for BinaryStream<'_> {
    type Item = Result<LogEntry, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.reader.records_read() < self.until {
            let record = match self.reader.next_record() {
                Ok(Some(record)) => record,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };
            let index = self.reader.records_read() - 1;
            if index < self.from {
                self.decoder.observe(&record);
                continue;
            }
            if let Some(entry) = self.decoder.decode(self.reader.file_name(), index, &record) {
                return Some(Ok(entry));
            }
        }
        None
    }
}

/// Writes the records of a parsed binary log as a text log.
///
/// Every record with a convertible message becomes one `#JSON#` line, prefixed
/// by its session times or, when it has none, by seconds since the first
/// message. Records without one but with an annotation become a bare line
/// with delimiters blanked out. Returns the number of message lines written.
pub(crate) fn write_converted<W: Write>(
    log: &MessageLog,
    resolver: &dyn CodecResolver,
    writer: &mut W,
) -> Result<usize, LogError> {
    let write_err = |source| LogError::Write {
        file: log.file_name().to_string(),
        source,
    };
    let start = log.messages().first().map(|m| m.timestamp());
    let mut written = 0;

    for (index, record) in log.original_records().iter().enumerate() {
        let line = match convert_record(log, resolver, record, start) {
            Ok(Some(line)) => {
                written += 1;
                line
            }
            Ok(None) => match &record.custom_string {
                Some(text) => annotation_line(text),
                None => continue,
            },
            Err(e) => {
                tracing::warn!(file = %log.file_name(), record = index + 1, error = %e, "record not converted");
                match &record.custom_string {
                    Some(text) => annotation_line(text),
                    None => continue,
                }
            }
        };
        writeln!(writer, "{line}").map_err(write_err)?;
        writer.flush().map_err(write_err)?;
    }
    Ok(written)
}

/// Flattens an annotation onto one line that the text parser will skip.
fn annotation_line(text: &str) -> String {
    text.replace(['\r', '\n', CODEC_DELIMITER], " ")
}

fn convert_record(
    log: &MessageLog,
    resolver: &dyn CodecResolver,
    record: &LogRecord,
    start: Option<i64>,
) -> Result<Option<String>, CodecError> {
    let Some(wire) = &record.message else {
        return Ok(None);
    };
    resolver.check_required_fields(wire)?;
    let message = resolver.to_common_message(wire)?;

    let session_time = record
        .elapsed_ds_time
        .filter(|_| log.is_domain_session_log());
    let prefix = if let Some(elapsed) = session_time {
        LinePrefix::DomainSession {
            elapsed,
            write: record.write_time.unwrap_or(UNKNOWN_ELAPSED_TIME),
        }
    } else {
        let offset = message
            .timestamp
            .saturating_sub(start.unwrap_or(message.timestamp));
        #[allow(clippy::cast_precision_loss)]
        let time = offset as f64 / 1000.0;
        LinePrefix::System { time }
    };
    let payload = JsonCodec.encode(&message)?;
    Ok(Some(format_log_line(prefix, JSON_ENCODING, &payload)))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io;

    use super::*;
    use crate::codec::{StandardCodecs, to_wire_message};
    use crate::file::MemoryFile;
    use crate::message::Message;
    use crate::message::tests::{message, session};
    use crate::message_type::MessageType;
    use crate::wire::write_record;

    pub(crate) fn message_record(message: &Message, times: Option<(f64, f64)>) -> LogRecord {
        LogRecord {
            message: Some(to_wire_message(message)),
            elapsed_ds_time: times.map(|t| t.0),
            write_time: times.map(|t| t.1),
            custom_string: None,
        }
    }

    pub(crate) fn annotation_record(text: &str) -> LogRecord {
        LogRecord {
            custom_string: Some(text.to_string()),
            ..LogRecord::default()
        }
    }

    pub(crate) fn encode_records(records: &[LogRecord]) -> Vec<u8> {
        let mut buf = Vec::new();
        for record in records {
            write_record(&mut buf, record).unwrap();
        }
        buf
    }

    pub(crate) fn session_message(message_type: MessageType, seq: i32, ts: i64) -> Message {
        let mut msg = message(message_type, seq, ts);
        msg.domain_session = Some(session());
        msg
    }

    fn options() -> ReaderOptions {
        ReaderOptions {
            record_timeout: Duration::from_secs(5),
            ..ReaderOptions::default()
        }
    }

    fn parse_records(records: &[LogRecord]) -> Result<MessageLog, LogError> {
        let file = MemoryFile::new("ds_1.protobuf.bin", encode_records(records));
        parse(&file, &StandardCodecs::default(), &options())
    }

    #[test]
    fn parses_domain_session_records() {
        let log = parse_records(&[
            annotation_record("session started"),
            message_record(&session_message(MessageType::LessonStarted, 1, 1000), Some((0.5, 0.75))),
            message_record(&session_message(MessageType::Ack, 2, 1200), None),
        ])
        .unwrap();

        assert!(log.is_domain_session_log());
        assert_eq!(log.len(), 2);
        assert_eq!(log.original_records().len(), 3);

        let first = log.messages()[0].as_domain_session().unwrap();
        assert!((first.elapsed_domain_session_time() - 0.5).abs() < f64::EPSILON);
        assert_eq!(first.domain_session_id(), 7);
        let second = log.messages()[1].as_domain_session().unwrap();
        assert!((second.write_time() - UNKNOWN_ELAPSED_TIME).abs() < f64::EPSILON);
    }

    #[test]
    fn system_log_is_classified_from_first_message() {
        let log = parse_records(&[
            message_record(&message(MessageType::ModuleStatus, 1, 1000), None),
            message_record(&session_message(MessageType::LessonStarted, 2, 2000), Some((1.0, 1.0))),
        ])
        .unwrap();

        assert!(!log.is_domain_session_log());
        assert!(log.messages().iter().all(|m| m.as_domain_session().is_none()));
    }

    #[test]
    fn record_missing_required_field_is_skipped() {
        let mut bad = message_record(&session_message(MessageType::LessonStarted, 2, 2000), None);
        bad.message.as_mut().unwrap().sender_module_name = None;
        let mut survey = session_message(MessageType::SubmitSurveyResults, 3, 3000);
        survey.payload = serde_json::json!({"unrelated": true});

        let log = parse_records(&[
            message_record(&session_message(MessageType::LessonStarted, 1, 1000), None),
            bad,
            message_record(&survey, None),
            message_record(&session_message(MessageType::LessonCompleted, 4, 4000), None),
        ]);
        // LessonCompleted requires completionType.
        let seqs: Vec<_> = log.unwrap().messages().iter().map(|m| m.sequence_number()).collect();
        assert_eq!(seqs, vec![1]);
    }

    #[test]
    fn order_is_file_order() {
        let log = parse_records(&[
            message_record(&message(MessageType::ModuleStatus, 1, 5000), None),
            message_record(&message(MessageType::ModuleStatus, 2, 1000), None),
            message_record(&message(MessageType::ModuleStatus, 3, 3000), None),
        ])
        .unwrap();
        let seqs: Vec<_> = log.messages().iter().map(|m| m.sequence_number()).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(log.duration_millis(), Some(-2000));
    }

    #[test]
    fn extension_and_existence_are_checked() {
        let codecs = StandardCodecs::default();
        let wrong = MemoryFile::new("ds_1.log", Vec::new());
        let err = parse(&wrong, &codecs, &options()).unwrap_err();
        assert!(matches!(err, LogError::NotBinaryLog { file, .. } if file == "ds_1.log"));

        let patch = MemoryFile::new("ds_1.protobuf.bin.logPatch", Vec::new());
        assert!(parse(&patch, &codecs, &options()).unwrap().is_empty());
    }

    #[test]
    fn truncated_record_aborts_parse() {
        let mut bytes = encode_records(&[
            message_record(&message(MessageType::ModuleStatus, 1, 1000), None),
            message_record(&message(MessageType::ModuleStatus, 2, 2000), None),
        ]);
        bytes.truncate(bytes.len() - 4);
        let file = MemoryFile::new("ds_1.protobuf.bin", bytes);

        let err = parse(&file, &StandardCodecs::default(), &options()).unwrap_err();
        assert!(matches!(err, LogError::Io { .. }));
    }

    #[test]
    fn garbage_record_is_corrupt() {
        // Length 3, then bytes that are not a valid record (field 15, wire type 7).
        let file = MemoryFile::new("ds_1.protobuf.bin", vec![3, 0x7f, 0xff, 0xff]);
        let err = parse(&file, &StandardCodecs::default(), &options()).unwrap_err();
        assert!(matches!(err, LogError::CorruptRecord { record: 1, .. }));
    }

    /// A file whose reads stall far longer than any test timeout.
    pub(crate) struct StalledFile;

    struct StalledReader;

    impl Read for StalledReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(Duration::from_secs(3));
            Ok(0)
        }
    }

    impl LogFile for StalledFile {
        fn exists(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "stalled.protobuf.bin"
        }

        fn open(&self) -> io::Result<Box<dyn Read + Send>> {
            Ok(Box::new(StalledReader))
        }
    }

    #[test]
    fn slow_record_times_out() {
        let options = ReaderOptions {
            record_timeout: Duration::from_millis(100),
            ..ReaderOptions::default()
        };
        let err = parse(&StalledFile, &StandardCodecs::default(), &options).unwrap_err();
        assert!(matches!(
            err,
            LogError::DecodeTimeout { ref file, record: 1, .. } if file == "stalled.protobuf.bin"
        ));
    }

    #[test]
    fn stream_covers_record_range() {
        let records: Vec<_> = (0..5)
            .map(|i| message_record(&message(MessageType::ModuleStatus, i, i64::from(i)), None))
            .collect();
        let file = MemoryFile::new("ds_1.protobuf.bin", encode_records(&records));
        let codecs = StandardCodecs::default();

        let seqs: Vec<_> = BinaryStream::open(&file, &codecs, &options(), 1, 3)
            .unwrap()
            .map(|e| e.unwrap().sequence_number())
            .collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn conversion_writes_one_line_per_message() {
        let log = parse_records(&[
            annotation_record("note\nwith newline"),
            message_record(&session_message(MessageType::LessonStarted, 1, 1000), Some((0.5, 0.75))),
            message_record(&session_message(MessageType::Ack, 2, 1200), Some((0.7, 0.8))),
        ])
        .unwrap();

        let mut out = Vec::new();
        let written = write_converted(&log, &StandardCodecs::default(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(written, 2);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "note with newline");
        assert!(lines[1].starts_with("0.5 0.75 #JSON# {"));
        assert!(lines[2].starts_with("0.7 0.8 #JSON# {"));
    }

    #[test]
    fn converted_line_includes_default_fields() {
        let log = parse_records(&[message_record(
            &session_message(MessageType::LessonStarted, 1, 1000),
            Some((0.5, 0.75)),
        )])
        .unwrap();

        let mut out = Vec::new();
        write_converted(&log, &StandardCodecs::default(), &mut out).unwrap();
        insta::assert_snapshot!(String::from_utf8(out).unwrap(), @r#"0.5 0.75 #JSON# {"messageType":"LessonStarted","sequenceNumber":1,"sourceEventId":0,"timestamp":1000,"senderModuleName":"Domain_Module","senderAddress":"inbox@127.0.0.1","senderModuleType":"DomainModule","destinationQueueName":null,"replyToSequenceNumber":null,"needsHandlingResponse":false,"payload":null,"domainSession":{"domainSessionId":7,"userSession":{"userId":1,"username":"learner","experimentId":null},"playbackId":null}}"#);
    }

    #[test]
    fn system_conversion_uses_relative_time() {
        let log = parse_records(&[
            message_record(&message(MessageType::ModuleStatus, 1, 10_000), None),
            message_record(&message(MessageType::ModuleStatus, 2, 12_500), None),
        ])
        .unwrap();

        let mut out = Vec::new();
        write_converted(&log, &StandardCodecs::default(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let prefixes: Vec<_> = text.lines().map(|l| l.split(" #").next().unwrap()).collect();
        assert_eq!(prefixes, vec!["0", "2.5"]);
    }

    fn reparse(converted: Vec<u8>) -> (Vec<LogEntry>, Option<bool>) {
        let file = MemoryFile::new("ds_1_converted.log", converted);
        let codecs = StandardCodecs::default();
        let mut stream = crate::text::TextStream::open(&file, &codecs, 0, usize::MAX).unwrap();
        let entries = stream.by_ref().map(Result::unwrap).collect();
        (entries, stream.domain_session())
    }

    #[test]
    fn annotation_delimiters_do_not_reach_the_text_log() {
        let log = parse_records(&[
            annotation_record("phase #2# begins"),
            annotation_record(r#"x #JSON# {"messageType":"ACK"}"#),
            message_record(&session_message(MessageType::LessonStarted, 1, 1000), Some((0.5, 0.75))),
            message_record(&session_message(MessageType::Ack, 2, 1200), Some((0.7, 0.8))),
        ])
        .unwrap();

        let mut out = Vec::new();
        write_converted(&log, &StandardCodecs::default(), &mut out).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert_eq!(text.lines().next(), Some("phase  2  begins"));

        let (entries, domain_session) = reparse(out);
        assert_eq!(domain_session, Some(true));
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.as_domain_session().is_some()));
    }

    #[test]
    fn record_without_session_time_uses_relative_time() {
        let log = parse_records(&[
            message_record(&session_message(MessageType::LessonStarted, 1, 10_000), Some((0.5, 0.75))),
            message_record(&session_message(MessageType::Ack, 2, 12_500), None),
        ])
        .unwrap();
        assert!(log.is_domain_session_log());

        let mut out = Vec::new();
        write_converted(&log, &StandardCodecs::default(), &mut out).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        let prefixes: Vec<_> = text.lines().map(|l| l.split(" #").next().unwrap()).collect();
        assert_eq!(prefixes, vec!["0.5 0.75", "2.5"]);

        let (entries, domain_session) = reparse(out);
        assert_eq!(domain_session, Some(true));
        let second = entries[1].as_domain_session().unwrap();
        assert!((second.elapsed_domain_session_time() - 2.5).abs() < f64::EPSILON);
        assert!((second.write_time() - UNKNOWN_ELAPSED_TIME).abs() < f64::EPSILON);
    }

    #[test]
    fn extreme_timestamps_convert_without_overflow() {
        let log = parse_records(&[
            message_record(&message(MessageType::ModuleStatus, 1, i64::MAX), None),
            message_record(&message(MessageType::ModuleStatus, 2, i64::MIN), None),
        ])
        .unwrap();

        let mut out = Vec::new();
        assert_eq!(write_converted(&log, &StandardCodecs::default(), &mut out).unwrap(), 2);
        assert_eq!(log.duration_millis(), None);
    }
}
