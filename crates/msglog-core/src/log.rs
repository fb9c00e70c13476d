//! The parsed, read-only contents of a message log.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use crate::format::LogFormat;
use crate::message::LogEntry;
use crate::message_type::MessageType;
use crate::wire::LogRecord;

/// Messages of one parsed log, in file order, with a per-type index.
///
/// File order is assumed to be chronological but is never re-sorted. Each
/// per-type bucket holds the same entries as `messages`, in the same relative
/// order; a bucket exists only for types that occurred.
#[derive(Debug)]
pub struct MessageLog {
    file_name: String,
    format: LogFormat,
    messages: Vec<Arc<LogEntry>>,
    by_type: HashMap<MessageType, Vec<Arc<LogEntry>>>,
    domain_session: bool,
    records: Vec<LogRecord>,
    duration: OnceLock<Option<i64>>,
}

impl MessageLog {
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    /// All entries in file order.
    #[must_use]
    pub fn messages(&self) -> &[Arc<LogEntry>] {
        &self.messages
    }

    /// Entries of one type, or `None` if the type never appeared.
    #[must_use]
    pub fn messages_by_type(&self, message_type: MessageType) -> Option<&[Arc<LogEntry>]> {
        self.by_type.get(&message_type).map(Vec::as_slice)
    }

    /// The distinct message types present in the log.
    #[must_use]
    pub fn message_types(&self) -> BTreeSet<MessageType> {
        self.by_type.keys().copied().collect()
    }

    /// Position of the first entry equal to `entry`.
    ///
    /// This is a linear scan; look indices up once rather than in a loop.
    #[must_use]
    pub fn index_of_message(&self, entry: &LogEntry) -> Option<usize> {
        self.messages.iter().position(|m| **m == *entry)
    }

    /// Milliseconds between the first and last entry.
    ///
    /// `None` with fewer than two entries, or when the difference overflows.
    #[must_use]
    pub fn duration_millis(&self) -> Option<i64> {
        *self.duration.get_or_init(|| match self.messages.as_slice() {
            [first, .., last] => last.timestamp().checked_sub(first.timestamp()),
            _ => None,
        })
    }

    /// Whether the log was written during a domain session.
    #[must_use]
    pub const fn is_domain_session_log(&self) -> bool {
        self.domain_session
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Raw records of a binary log, in file order. Empty for text logs.
    #[must_use]
    pub fn original_records(&self) -> &[LogRecord] {
        &self.records
    }
}

/// Accumulates entries while a parser runs.
#[derive(Debug, Default)]
pub(crate) struct LogBuilder {
    messages: Vec<Arc<LogEntry>>,
    by_type: HashMap<MessageType, Vec<Arc<LogEntry>>>,
    domain_session: Option<bool>,
    records: Vec<LogRecord>,
}

impl LogBuilder {
    pub(crate) fn push(&mut self, entry: LogEntry) {
        let entry = Arc::new(entry);
        self.by_type
            .entry(entry.message_type())
            .or_default()
            .push(Arc::clone(&entry));
        self.messages.push(entry);
    }

    pub(crate) fn push_record(&mut self, record: LogRecord) {
        self.records.push(record);
    }

    pub(crate) fn set_domain_session(&mut self, domain_session: Option<bool>) {
        self.domain_session = domain_session;
    }

    pub(crate) fn finish(self, file_name: &str, format: LogFormat) -> MessageLog {
        MessageLog {
            file_name: file_name.to_string(),
            format,
            messages: self.messages,
            by_type: self.by_type,
            domain_session: self.domain_session.unwrap_or(false),
            records: self.records,
            duration: OnceLock::new(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::message::tests::message;

    pub(crate) fn log_of(messages: Vec<crate::message::Message>) -> MessageLog {
        let mut builder = LogBuilder::default();
        for m in messages {
            builder.push(LogEntry::System(m));
        }
        builder.finish("test.log", LogFormat::Text)
    }

    #[test]
    fn duration_unknown_below_two_messages() {
        assert_eq!(log_of(vec![]).duration_millis(), None);
        assert_eq!(
            log_of(vec![message(MessageType::LessonStarted, 1, 1000)]).duration_millis(),
            None
        );
    }

    #[test]
    fn duration_is_last_minus_first() {
        let log = log_of(vec![
            message(MessageType::LessonStarted, 1, 1000),
            message(MessageType::LearnerState, 2, 900),
            message(MessageType::LessonCompleted, 3, 4500),
        ]);
        assert_eq!(log.duration_millis(), Some(3500));
    }

    #[test]
    fn duration_overflow_is_unknown() {
        let log = log_of(vec![
            message(MessageType::LessonStarted, 1, i64::MIN),
            message(MessageType::LessonCompleted, 2, i64::MAX),
        ]);
        assert_eq!(log.duration_millis(), None);
    }

    #[test]
    fn type_index_matches_messages() {
        let log = log_of(vec![
            message(MessageType::LearnerState, 1, 1),
            message(MessageType::LessonStarted, 2, 2),
            message(MessageType::LearnerState, 3, 3),
            message(MessageType::Ack, 4, 4),
            message(MessageType::LearnerState, 5, 5),
        ]);

        let total: usize = log
            .message_types()
            .iter()
            .map(|t| log.messages_by_type(*t).map_or(0, <[_]>::len))
            .sum();
        assert_eq!(total, log.len());

        for message_type in log.message_types() {
            let bucket = log.messages_by_type(message_type).unwrap();
            let from_messages: Vec<_> = log
                .messages()
                .iter()
                .filter(|m| m.message_type() == message_type)
                .collect();
            assert_eq!(bucket.len(), from_messages.len());
            for (a, b) in bucket.iter().zip(from_messages) {
                assert!(Arc::ptr_eq(a, b));
            }
        }
    }

    #[test]
    fn unseen_type_is_absent() {
        let log = log_of(vec![message(MessageType::LearnerState, 1, 1)]);
        assert!(log.messages_by_type(MessageType::Ack).is_none());
    }

    #[test]
    fn index_of_message_by_value() {
        let log = log_of(vec![
            message(MessageType::LearnerState, 1, 1),
            message(MessageType::LessonStarted, 2, 2),
        ]);
        let probe = LogEntry::System(message(MessageType::LessonStarted, 2, 2));
        assert_eq!(log.index_of_message(&probe), Some(1));

        let missing = LogEntry::System(message(MessageType::LessonStarted, 9, 2));
        assert_eq!(log.index_of_message(&missing), None);
    }
}
