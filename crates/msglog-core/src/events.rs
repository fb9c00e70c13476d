//! Request/acknowledgment correlation over a parsed log.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::log::MessageLog;
use crate::message::LogEntry;
use crate::message_type::MessageType;

/// An interesting message and how long its acknowledgment took.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedEvent {
    /// Position of the message in the log.
    pub index: usize,
    pub entry: Arc<LogEntry>,
    /// Milliseconds until the matching reply; 0 when none was found.
    pub duration_millis: u64,
}

impl MessageLog {
    /// Finds interesting messages from `start_index` on, each timed to its reply.
    ///
    /// Scanning ends at the first `stop_scanning` message, which is not itself
    /// examined. For every message whose type is in `interesting`, the entries
    /// after it are searched for a `stop_timer` message replying to its
    /// sequence number; a `stop_scanning` message ends that search with no
    /// duration. Events may overlap: the scan resumes right after each
    /// interesting message, not after its reply.
    #[must_use]
    pub fn messages_after_index_until_type(
        &self,
        start_index: usize,
        stop_scanning: MessageType,
        stop_timer: MessageType,
        interesting: &HashSet<MessageType>,
    ) -> Vec<TimedEvent> {
        let messages = self.messages();
        let mut events = Vec::new();

        for (index, entry) in messages.iter().enumerate().skip(start_index) {
            let message_type = entry.message_type();
            if message_type == stop_scanning {
                break;
            }
            if !interesting.contains(&message_type) {
                continue;
            }

            let sequence_number = entry.sequence_number();
            let reply = messages[index + 1..]
                .iter()
                .take_while(|m| m.message_type() != stop_scanning)
                .find(|m| m.message_type() == stop_timer && m.message().is_reply_to(sequence_number));

            let duration_millis = reply
                .and_then(|reply| reply.timestamp().checked_sub(entry.timestamp()))
                .and_then(|diff| u64::try_from(diff).ok())
                .unwrap_or(0);
            events.push(TimedEvent {
                index,
                entry: Arc::clone(entry),
                duration_millis,
            });
        }
        events
    }
}
