//! Decoded protocol messages and their domain-session decoration.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::message_type::MessageType;

/// Elapsed time recorded when a domain-session record carries no annotation.
pub const UNKNOWN_ELAPSED_TIME: f64 = -1.0;

/// The learner identity a domain session runs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub user_id: i32,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub experiment_id: Option<String>,
}

/// Identity of the domain session a message was sent in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSession {
    pub domain_session_id: i32,
    pub user_session: UserSession,
    #[serde(default)]
    pub playback_id: Option<String>,
}

/// One protocol message as it was sent between modules.
///
/// `reply_to_sequence_number` links an acknowledgment to the message it
/// answers. Sequence numbers are assigned per sender, so they only identify
/// a message within one logical exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_type: MessageType,
    pub sequence_number: i32,
    #[serde(default)]
    pub source_event_id: i32,
    /// Wall-clock epoch milliseconds.
    pub timestamp: i64,
    pub sender_module_name: String,
    pub sender_address: String,
    pub sender_module_type: String,
    #[serde(default)]
    pub destination_queue_name: Option<String>,
    #[serde(default)]
    pub reply_to_sequence_number: Option<i32>,
    #[serde(default)]
    pub needs_handling_response: bool,
    /// Decoded payload; its shape depends on `message_type`.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Present when the message was sent within a domain session.
    #[serde(default)]
    pub domain_session: Option<DomainSession>,
}

impl Message {
    /// Whether this message acknowledges the message with the given sequence number.
    #[must_use]
    pub fn is_reply_to(&self, sequence_number: i32) -> bool {
        self.reply_to_sequence_number == Some(sequence_number)
    }
}

/// A message logged during a domain session, with the session clock at send and write time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSessionMessageEntry {
    /// Seconds since the session began, as recorded by the sender.
    elapsed_domain_session_time: f64,
    /// Seconds since the session began, as recorded when the log line was written.
    write_time: f64,
    #[serde(flatten)]
    message: Message,
}

impl DomainSessionMessageEntry {
    /// Wraps a message decoded from a domain-session log.
    ///
    /// Fails when the message does not carry a domain session identity.
    pub fn new(
        message: Message,
        elapsed_domain_session_time: f64,
        write_time: f64,
    ) -> Result<Self, ParseError> {
        if message.domain_session.is_none() {
            return Err(ParseError::MissingSessionIdentity {
                message_type: message.message_type,
                sequence_number: message.sequence_number,
            });
        }
        Ok(Self {
            elapsed_domain_session_time,
            write_time,
            message,
        })
    }

    #[must_use]
    pub const fn message(&self) -> &Message {
        &self.message
    }

    #[must_use]
    pub const fn elapsed_domain_session_time(&self) -> f64 {
        self.elapsed_domain_session_time
    }

    #[must_use]
    pub const fn write_time(&self) -> f64 {
        self.write_time
    }

    fn session(&self) -> &DomainSession {
        // Checked in the constructor.
        self.message
            .domain_session
            .as_ref()
            .unwrap_or_else(|| unreachable!("domain session entry without session identity"))
    }

    #[must_use]
    pub fn domain_session_id(&self) -> i32 {
        self.session().domain_session_id
    }

    #[must_use]
    pub fn user_session(&self) -> &UserSession {
        &self.session().user_session
    }

    #[must_use]
    pub fn playback_id(&self) -> Option<&str> {
        self.session().playback_id.as_deref()
    }

    /// Returns a copy of this entry with the user session's username replaced.
    ///
    /// Used when relabeling or anonymizing a log; every other field is kept.
    #[must_use]
    pub fn with_username(&self, username: Option<String>) -> Self {
        let mut copy = self.clone();
        if let Some(session) = copy.message.domain_session.as_mut() {
            session.user_session.username = username;
        }
        copy
    }
}

/// A message log entry: either a plain system message or a domain-session entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LogEntry {
    System(Message),
    DomainSession(DomainSessionMessageEntry),
}

impl LogEntry {
    #[must_use]
    pub const fn message(&self) -> &Message {
        match self {
            Self::System(message) => message,
            Self::DomainSession(entry) => entry.message(),
        }
    }

    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        self.message().message_type
    }

    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        self.message().timestamp
    }

    #[must_use]
    pub const fn sequence_number(&self) -> i32 {
        self.message().sequence_number
    }

    #[must_use]
    pub const fn as_domain_session(&self) -> Option<&DomainSessionMessageEntry> {
        match self {
            Self::System(_) => None,
            Self::DomainSession(entry) => Some(entry),
        }
    }
}
