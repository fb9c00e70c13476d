//! Message type enum as the single source of truth for protocol type names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generates the closed message type enumeration along with its wire and display names.
macro_rules! define_message_types {
    (
        $(
            $(#[$meta:meta])*
            $variant:ident => $wire:literal, $display:literal;
        )+
    ) => {
        /// Protocol message types that can appear in a message log.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum MessageType {
            $(
                $(#[$meta])*
                $variant,
            )+
        }

        impl MessageType {
            /// Every message type, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The name used for this type in log files and on the wire.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }

            /// Human readable name.
            #[must_use]
            pub const fn display_name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $display,)+
                }
            }
        }

        impl FromStr for MessageType {
            type Err = UnknownMessageType;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err(UnknownMessageType(s.to_string())),
                }
            }
        }
    };
}

define_message_types! {
    ModuleAllocationRequest => "ModuleAllocationRequest", "Module Allocation Request";
    ModuleAllocationReply => "ModuleAllocationReply", "Module Allocation Reply";
    /// Module heartbeat.
    ModuleStatus => "ModuleStatus", "Module Status";
    KillModule => "KillModule", "Kill Module";
    LoginRequest => "LoginRequest", "Login Request";
    LoginReply => "LoginReply", "Login Reply";
    LogoutRequest => "LogOutRequest", "Logout Request";
    SensorFilterData => "SensorFilterData", "Sensor Filter Data";
    SensorData => "SensorData", "Sensor Data";
    SensorStatus => "SensorStatus", "Sensor Status";
    InstantiateLearnerRequest => "InstantiateLearnerRequest", "Instantiate Learner Request";
    LearnerState => "LearnerState", "Learner State";
    DomainSelectionRequest => "DomainSelectionRequest", "Domain Selection Request";
    DomainSelectionReply => "DomainSelectionReply", "Domain Selection Reply";
    GetSurveyRequest => "GetSurveyRequest", "Get Survey Request";
    GetSurveyReply => "GetSurveyReply", "Get Survey Reply";
    SubmitSurveyResults => "SubmitSurveyResults", "Submit Survey Results";
    BranchPathHistoryUpdate => "BranchPathHistoryUpdate", "Branch Path History Update";
    KnowledgeAssessmentDetails => "KnowledgeAssessmentDetails", "Knowledge Assessment Details";
    InitializeDomainSessionRequest => "InitializeDomainSessionRequest", "Initialize Domain Session Request";
    InitializeLessonRequest => "InitializeLessonRequest", "Initialize Lesson Request";
    InitializePedagogicalModelRequest => "InitializePedagogicalModelRequest", "Initialize Pedagogical Model Request";
    /// Marks the start of a lesson (a real-time assessment phase).
    LessonStarted => "LessonStarted", "Lesson Started";
    LessonCompleted => "LessonCompleted", "Lesson Completed";
    CloseDomainSessionRequest => "CloseDomainSessionRequest", "Close Domain Session Request";
    StartDomainSession => "StartDomainSession", "Start Domain Session";
    PerformanceAssessment => "PerformanceAssessment", "Performance Assessment";
    LearnerTutorAction => "LearnerTutorAction", "Learner Tutor Action";
    ChatLog => "ChatLog", "Chat Log";
    DisplayAarTutorRequest => "DisplayAarTutorRequest", "Display AAR Tutor Request";
    DisplayFeedbackTutorRequest => "DisplayFeedbackTutorRequest", "Display Feedback Tutor Request";
    DisplayLessonMaterialTutorRequest => "DisplayLessonMaterialTutorRequest", "Display Lesson Material Tutor Request";
    DisplayMidLessonMediaTutorRequest => "DisplayMidLessonMediaTutorRequest", "Display Mid-Lesson Media Tutor Request";
    DisplaySurveyTutorRequest => "DisplaySurveyTutorRequest", "Display Survey Tutor Request";
    DisplayGuidanceTutorRequest => "DisplayGuidanceTutorRequest", "Display Guidance Tutor Request";
    PedagogicalRequest => "PedagogicalRequest", "Pedagogical Request";
    CourseState => "CourseState", "Course State";
    EvaluatorUpdateRequest => "EvaluatorUpdateRequest", "Evaluator Update Request";
    ApplyStrategies => "ApplyStrategies", "Apply Strategies";
    ExecuteOcStrategy => "ExecuteOcStrategy", "Execute OC Strategy";
    /// Positive acknowledgment; replies carry the acknowledged sequence number.
    Ack => "ACK", "ACK";
    ProcessedAck => "ProcessedACK", "Processed ACK";
    Nack => "NACK", "NACK";
    ProcessedNack => "ProcessedNACK", "Processed NACK";
    EntityState => "EntityState", "Entity State";
    PowerPointState => "PowerPointState", "PowerPoint State";
    SimpleExampleState => "SimpleExampleState", "Simple Example State";
    Geolocation => "Geolocation", "Geolocation";
    GenericJsonState => "GenericJSONState", "Generic JSON State";
    StartResume => "StartResume", "Start Resume";
    StopFreeze => "StopFreeze", "Stop Freeze";
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MessageType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown message type names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMessageType(pub String);

impl fmt::Display for UnknownMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown message type: {}", self.0)
    }
}

impl std::error::Error for UnknownMessageType {}
