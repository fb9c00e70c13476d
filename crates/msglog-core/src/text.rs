//! Line-oriented text message logs.
//!
//! Each line reads `<elapsed> <write> #ENCODING# <payload>` in a
//! domain-session log, or `<time> #ENCODING# <payload>` in a system log.
//! Whether a log is a domain-session log is decided once, from the first line
//! carrying the delimiter, and applied to every later line.

use std::io::{BufRead, BufReader, Read};
use std::sync::LazyLock;

use regex::Regex;

use crate::codec::CodecResolver;
use crate::error::{LogError, ParseError};
use crate::file::LogFile;
use crate::message::{DomainSessionMessageEntry, LogEntry, UNKNOWN_ELAPSED_TIME};

/// Character bracketing the encoding name on every line.
pub const CODEC_DELIMITER: char = '#';

/// A line containing a delimited encoding name.
static MESSAGE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^#]*#[A-Za-z0-9_\-]+#").unwrap());

/// Leading time annotation(s) of a log line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinePrefix {
    /// Session clock at send and write time, in seconds.
    DomainSession { elapsed: f64, write: f64 },
    /// Seconds relative to the start of a system log.
    System { time: f64 },
}

/// Builds one text log line.
#[must_use]
pub fn format_log_line(prefix: LinePrefix, encoding: &str, payload: &str) -> String {
    match prefix {
        LinePrefix::DomainSession { elapsed, write } => {
            format!("{elapsed} {write} {CODEC_DELIMITER}{encoding}{CODEC_DELIMITER} {payload}")
        }
        LinePrefix::System { time } => {
            format!("{time} {CODEC_DELIMITER}{encoding}{CODEC_DELIMITER} {payload}")
        }
    }
}

struct LineParts<'a> {
    prefix: &'a str,
    encoding: &'a str,
    payload: &'a str,
}

fn split_line(line: &str) -> Option<LineParts<'_>> {
    let start = line.find(CODEC_DELIMITER)?;
    let after_start = start + CODEC_DELIMITER.len_utf8();
    let end = after_start + line[after_start..].find(CODEC_DELIMITER)?;
    Some(LineParts {
        prefix: &line[..start],
        encoding: &line[after_start..end],
        payload: &line[end + CODEC_DELIMITER.len_utf8()..],
    })
}

fn is_domain_session_prefix(prefix: &str) -> bool {
    prefix.split_whitespace().count() == 2
}

fn parse_elapsed(token: Option<&str>) -> Result<f64, ParseError> {
    token.map_or(Ok(UNKNOWN_ELAPSED_TIME), |t| {
        t.parse()
            .map_err(|_| ParseError::InvalidElapsedTime(t.to_string()))
    })
}

/// Decodes lines of one log, remembering the log's domain-session status.
pub(crate) struct LineDecoder<'r> {
    resolver: &'r dyn CodecResolver,
    domain_session: Option<bool>,
}

impl<'r> LineDecoder<'r> {
    pub(crate) const fn new(resolver: &'r dyn CodecResolver) -> Self {
        Self {
            resolver,
            domain_session: None,
        }
    }

    pub(crate) const fn domain_session(&self) -> Option<bool> {
        self.domain_session
    }

    /// Classifies the log from this line if it is the first delimited one.
    fn classify(&mut self, parts: &LineParts<'_>) -> bool {
        *self
            .domain_session
            .get_or_insert_with(|| is_domain_session_prefix(parts.prefix))
    }

    /// Updates the classification without decoding the line.
    pub(crate) fn observe(&mut self, line: &str) {
        if self.domain_session.is_none() {
            if let Some(parts) = split_line(line) {
                self.classify(&parts);
            }
        }
    }

    pub(crate) fn decode(&mut self, line: &str) -> Result<LogEntry, ParseError> {
        let parts = split_line(line).ok_or(ParseError::MissingDelimiter)?;
        let domain_session = self.classify(&parts);

        let codec = self.resolver.resolve(parts.encoding)?;
        let message = codec.decode(parts.payload)?;

        if !domain_session {
            return Ok(LogEntry::System(message));
        }
        let mut tokens = parts.prefix.split_whitespace();
        let elapsed = parse_elapsed(tokens.next())?;
        let write = parse_elapsed(tokens.next())?;
        Ok(LogEntry::DomainSession(DomainSessionMessageEntry::new(
            message, elapsed, write,
        )?))
    }
}

/// Decodes a single log line on its own, classifying it by its own prefix.
pub fn parse_message_from_log_line(
    line: &str,
    resolver: &dyn CodecResolver,
) -> Result<LogEntry, ParseError> {
    LineDecoder::new(resolver).decode(line)
}

/// Lazily decoded entries of a text log over the line range `[from, until)`.
///
/// Lines that fail to decode are logged and skipped; only I/O failures are
/// yielded as errors, after which the stream ends.
pub(crate) struct TextStream<'r> {
    file_name: String,
    reader: BufReader<Box<dyn Read + Send>>,
    decoder: LineDecoder<'r>,
    line: usize,
    from: usize,
    until: usize,
    done: bool,
}

impl<'r> TextStream<'r> {
    pub(crate) fn open(
        file: &dyn LogFile,
        resolver: &'r dyn CodecResolver,
        from: usize,
        until: usize,
    ) -> Result<Self, LogError> {
        if !file.exists() {
            return Err(LogError::NotFound {
                file: file.name().to_string(),
            });
        }
        let stream = file.open().map_err(|e| LogError::io(file.name(), e))?;
        Ok(Self {
            file_name: file.name().to_string(),
            reader: BufReader::new(stream),
            decoder: LineDecoder::new(resolver),
            line: 0,
            from,
            until,
            done: false,
        })
    }

    pub(crate) const fn domain_session(&self) -> Option<bool> {
        self.decoder.domain_session()
    }

    fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }
}

impl Iterator for TextStream<'_> {
    type Item = Result<LogEntry, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done && self.line < self.until {
            let line = match self.read_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    self.done = true;
                    return Some(Err(LogError::io(&self.file_name, e)));
                }
            };
            let index = self.line;
            self.line += 1;

            if line.trim().is_empty() {
                continue;
            }
            if index < self.from {
                self.decoder.observe(&line);
                continue;
            }
            match self.decoder.decode(&line) {
                Ok(entry) => return Some(Ok(entry)),
                Err(ParseError::MissingDelimiter) => {
                    tracing::debug!(file = %self.file_name, line = index + 1, "skipping line without encoding delimiter");
                }
                Err(e) => {
                    tracing::warn!(file = %self.file_name, line = index + 1, error = %e, "skipping undecodable log line");
                }
            }
        }
        self.done = true;
        None
    }
}

/// Whether the text file contains at least one delimited message line.
pub(crate) fn is_message_log(file: &dyn LogFile) -> Result<bool, LogError> {
    if !file.exists() {
        return Ok(false);
    }
    let stream = file.open().map_err(|e| LogError::io(file.name(), e))?;
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| LogError::io(file.name(), e))?
            == 0
        {
            return Ok(false);
        }
        if MESSAGE_LINE_RE.is_match(&String::from_utf8_lossy(&buf)) {
            return Ok(true);
        }
    }
}
