//! ---
//! spc_section: "04-messaging"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Message envelope and raw request/status frames."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema version broadcast alongside every message payload.
pub const SCHEMA_VERSION: u16 = 1;

/// Payload carried by a [`Message`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MessagePayload {
    /// Controller-level request from the master.
    ControllerRequest(ControllerRequestFrame),
    /// Request targeting a single live activity.
    ActivityRequest(ActivityRequestFrame),
    /// Controller status published towards the master.
    ControllerStatus(ControllerStatusFrame),
    /// Live activity status published towards the master.
    ActivityStatus(ActivityStatusFrame),
}

/// Unified message structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for deduplication and tracing.
    pub id: Uuid,
    /// Version of the schema used by the payload.
    pub schema_version: u16,
    /// Timestamp when the message was created.
    pub timestamp: DateTime<Utc>,
    /// Actual payload carried by the message.
    pub payload: MessagePayload,
}

impl Message {
    /// Construct a new message envelope around the provided payload.
    pub fn new(payload: MessagePayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            schema_version: SCHEMA_VERSION,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Payload kind as a static string.
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

impl MessagePayload {
    /// Payload kind as a static string.
    pub fn kind(&self) -> &'static str {
        match self {
            MessagePayload::ControllerRequest(_) => "controller_request",
            MessagePayload::ActivityRequest(_) => "activity_request",
            MessagePayload::ControllerStatus(_) => "controller_status",
            MessagePayload::ActivityStatus(_) => "activity_status",
        }
    }
}

/// Raw controller-level request as received from the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerRequestFrame {
    /// Operation code.
    pub operation: i32,
    /// Optional JSON-encoded payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
}

/// Raw activity-level request as received from the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRequestFrame {
    /// Operation code.
    pub operation: i32,
    /// Target live activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Optional JSON-encoded payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
}

/// Kind of controller status being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerStatusKind {
    /// Periodic liveness announcement.
    Heartbeat,
    /// Full status of every installed activity.
    Full,
    /// Result of a live activity deployment.
    ActivityInstall,
    /// Result of a live activity deletion.
    ActivityDelete,
    /// Result of a controller data capture.
    DataCapture,
    /// Result of a controller data restore.
    DataRestore,
}

/// Controller status published towards the master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerStatusFrame {
    /// Uuid of the reporting controller.
    pub uuid: String,
    /// What is being reported.
    pub status: ControllerStatusKind,
    /// Optional JSON-encoded body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

/// Live activity status published towards the master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityStatusFrame {
    /// Uuid of the live activity.
    pub uuid: String,
    /// Wire status code, see [`crate::WireStatusCode`].
    pub status: i32,
    /// Description or fault detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
}
