//! Codec resolution for both log formats.
//!
//! Text logs name their encoding on every line (`#JSON#`); the resolver maps
//! that name to a [`TextCodec`]. Binary logs carry [`WireMessage`]s; the
//! resolver checks them against the [`MessageRegistry`] and converts them to
//! the common [`Message`] model.

use std::collections::HashMap;
use std::fmt;

use crate::error::CodecError;
use crate::message::{DomainSession, Message, UserSession};
use crate::message_type::MessageType;
use crate::wire::{WireDomainSession, WireMessage};

/// Encoding name of the JSON text codec.
pub const JSON_ENCODING: &str = "JSON";

/// Decodes and encodes messages in one named text encoding.
pub trait TextCodec: Send + Sync {
    /// Name written between the delimiters of a log line.
    fn name(&self) -> &str;

    fn decode(&self, text: &str) -> Result<Message, CodecError>;

    fn encode(&self, message: &Message) -> Result<String, CodecError>;
}

/// JSON codec: one compact JSON document per message.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl TextCodec for JsonCodec {
    fn name(&self) -> &str {
        JSON_ENCODING
    }

    fn decode(&self, text: &str) -> Result<Message, CodecError> {
        Ok(serde_json::from_str(text.trim())?)
    }

    fn encode(&self, message: &Message) -> Result<String, CodecError> {
        Ok(serde_json::to_string(message)?)
    }
}

/// Required payload keys for one message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PayloadSchema {
    pub required: &'static [&'static str],
}

/// Envelope fields every binary message must carry.
const REQUIRED_ENVELOPE_FIELDS: &[&str] = &[
    "message_type",
    "sequence_number",
    "timestamp",
    "sender_module_name",
    "sender_address",
    "sender_module_type",
];

/// Message type registry: the payload schema that applies to each type.
#[derive(Debug, Clone)]
pub struct MessageRegistry {
    schemas: HashMap<MessageType, PayloadSchema>,
}

impl Default for MessageRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(MessageType::SubmitSurveyResults, &["surveyResponse"])
            .register(MessageType::LessonCompleted, &["completionType"])
            .register(MessageType::PerformanceAssessment, &["tasks"])
            .register(MessageType::LearnerState, &["performance", "cognitive", "affective"])
            .register(MessageType::PedagogicalRequest, &["requests"])
            .register(MessageType::DisplayFeedbackTutorRequest, &["text"])
            .register(MessageType::DisplaySurveyTutorRequest, &["survey"])
            .register(MessageType::SensorData, &["sensorName", "elapsedTime", "values"])
            .register(MessageType::SensorFilterData, &["sensorName", "elapsedTime", "values"])
            .register(MessageType::CourseState, &["nextTransitionImplementation"])
            .register(MessageType::EntityState, &["entityId", "location"]);
        registry
    }
}

impl MessageRegistry {
    /// A registry where no type requires any payload field.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Sets the required payload keys for a type.
    pub fn register(&mut self, message_type: MessageType, required: &'static [&'static str]) -> &mut Self {
        self.schemas.insert(message_type, PayloadSchema { required });
        self
    }

    #[must_use]
    pub fn schema(&self, message_type: MessageType) -> PayloadSchema {
        self.schemas.get(&message_type).copied().unwrap_or_default()
    }
}

/// Resolves codecs for text lines and converts binary wire messages.
pub trait CodecResolver: Send + Sync {
    /// Looks up the text codec for an encoding name.
    fn resolve(&self, encoding: &str) -> Result<&dyn TextCodec, CodecError>;

    fn message_type_of(&self, wire: &WireMessage) -> Result<MessageType, CodecError>;

    /// Checks that every field the message's schema requires is present.
    fn check_required_fields(&self, wire: &WireMessage) -> Result<(), CodecError>;

    fn to_common_message(&self, wire: &WireMessage) -> Result<Message, CodecError>;
}

/// The default resolver: JSON text codec plus the standard message registry.
pub struct StandardCodecs {
    registry: MessageRegistry,
    text_codecs: HashMap<String, Box<dyn TextCodec>>,
}

impl fmt::Debug for StandardCodecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardCodecs")
            .field("registry", &self.registry)
            .field("text_codecs", &self.text_codecs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for StandardCodecs {
    fn default() -> Self {
        Self::new(MessageRegistry::default())
    }
}

impl StandardCodecs {
    #[must_use]
    pub fn new(registry: MessageRegistry) -> Self {
        let mut codecs = Self {
            registry,
            text_codecs: HashMap::new(),
        };
        codecs.register_text_codec(Box::new(JsonCodec));
        codecs
    }

    /// Adds (or replaces) a text codec under its own name.
    pub fn register_text_codec(&mut self, codec: Box<dyn TextCodec>) -> &mut Self {
        self.text_codecs.insert(codec.name().to_string(), codec);
        self
    }

    #[must_use]
    pub const fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    fn decode_payload(wire: &WireMessage) -> Result<serde_json::Value, CodecError> {
        match wire.payload.as_deref() {
            None | Some([]) => Ok(serde_json::Value::Null),
            Some(bytes) => Ok(serde_json::from_slice(bytes)?),
        }
    }
}

fn missing(wire: &WireMessage, field: &str) -> CodecError {
    CodecError::MissingField {
        message_type: wire
            .message_type
            .clone()
            .unwrap_or_else(|| "untyped".to_string()),
        field: field.to_string(),
    }
}

fn envelope_field_present(wire: &WireMessage, field: &str) -> bool {
    match field {
        "message_type" => wire.message_type.is_some(),
        "sequence_number" => wire.sequence_number.is_some(),
        "timestamp" => wire.timestamp.is_some(),
        "sender_module_name" => wire.sender_module_name.is_some(),
        "sender_address" => wire.sender_address.is_some(),
        "sender_module_type" => wire.sender_module_type.is_some(),
        _ => true,
    }
}

impl CodecResolver for StandardCodecs {
    fn resolve(&self, encoding: &str) -> Result<&dyn TextCodec, CodecError> {
        self.text_codecs
            .get(encoding)
            .map(|codec| codec.as_ref())
            .ok_or_else(|| CodecError::UnknownEncoding(encoding.to_string()))
    }

    fn message_type_of(&self, wire: &WireMessage) -> Result<MessageType, CodecError> {
        let name = wire
            .message_type
            .as_deref()
            .ok_or_else(|| missing(wire, "message_type"))?;
        Ok(name.parse()?)
    }

    fn check_required_fields(&self, wire: &WireMessage) -> Result<(), CodecError> {
        if let Some(field) = REQUIRED_ENVELOPE_FIELDS
            .iter()
            .find(|field| !envelope_field_present(wire, field))
        {
            return Err(missing(wire, field));
        }

        let schema = self.registry.schema(self.message_type_of(wire)?);
        if schema.required.is_empty() {
            return Ok(());
        }
        let payload = Self::decode_payload(wire)?;
        match schema.required.iter().find(|key| payload.get(**key).is_none()) {
            Some(key) => Err(missing(wire, &format!("payload.{key}"))),
            None => Ok(()),
        }
    }

    fn to_common_message(&self, wire: &WireMessage) -> Result<Message, CodecError> {
        let message_type = self.message_type_of(wire)?;
        let required = |value: Option<&String>, field: &str| {
            value.cloned().ok_or_else(|| missing(wire, field))
        };

        Ok(Message {
            message_type,
            sequence_number: wire
                .sequence_number
                .ok_or_else(|| missing(wire, "sequence_number"))?,
            source_event_id: wire.source_event_id.unwrap_or_default(),
            timestamp: wire.timestamp.ok_or_else(|| missing(wire, "timestamp"))?,
            sender_module_name: required(wire.sender_module_name.as_ref(), "sender_module_name")?,
            sender_address: required(wire.sender_address.as_ref(), "sender_address")?,
            sender_module_type: required(wire.sender_module_type.as_ref(), "sender_module_type")?,
            destination_queue_name: wire.destination_queue_name.clone(),
            reply_to_sequence_number: wire.reply_to_sequence_number,
            needs_handling_response: wire.needs_handling_response.unwrap_or_default(),
            payload: Self::decode_payload(wire)?,
            domain_session: wire.domain_session.as_ref().map(domain_session_from_wire),
        })
    }
}

fn domain_session_from_wire(wire: &WireDomainSession) -> DomainSession {
    DomainSession {
        domain_session_id: wire.domain_session_id,
        user_session: UserSession {
            user_id: wire.user_id,
            username: wire.username.clone(),
            experiment_id: wire.experiment_id.clone(),
        },
        playback_id: wire.playback_id.clone(),
    }
}

/// Builds the wire form of a message, the inverse of
/// [`CodecResolver::to_common_message`].
#[must_use]
pub fn to_wire_message(message: &Message) -> WireMessage {
    WireMessage {
        message_type: Some(message.message_type.to_string()),
        sequence_number: Some(message.sequence_number),
        source_event_id: Some(message.source_event_id),
        timestamp: Some(message.timestamp),
        sender_module_name: Some(message.sender_module_name.clone()),
        sender_address: Some(message.sender_address.clone()),
        sender_module_type: Some(message.sender_module_type.clone()),
        destination_queue_name: message.destination_queue_name.clone(),
        reply_to_sequence_number: message.reply_to_sequence_number,
        needs_handling_response: Some(message.needs_handling_response),
        payload: (!message.payload.is_null()).then(|| message.payload.to_string().into_bytes()),
        domain_session: message.domain_session.as_ref().map(|session| WireDomainSession {
            domain_session_id: session.domain_session_id,
            user_id: session.user_session.user_id,
            username: session.user_session.username.clone(),
            experiment_id: session.user_session.experiment_id.clone(),
            playback_id: session.playback_id.clone(),
        }),
    }
}
