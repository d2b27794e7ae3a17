//! ---
//! spc_section: "04-messaging"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Controller message schema, wire codes, and transports."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Logical request/status contract between a space controller and its master.

pub mod logging;
pub mod requests;
pub mod supervisor;
pub mod transport;
pub mod types;
pub mod wire;

/// Shared result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Errors raised while encoding, decoding, or delivering messages.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// A request that needs an embedded payload arrived without one.
    #[error("request {operation} is missing its payload")]
    MissingPayload {
        /// Operation name of the offending request.
        operation: &'static str,
    },
    /// An activity-level request arrived without an activity uuid.
    #[error("activity request {operation} is missing its uuid")]
    MissingUuid {
        /// Operation code of the offending request.
        operation: i32,
    },
    /// A transport refused a message.
    #[error("transport {transport} rejected message: {reason}")]
    Transport {
        /// Name of the transport.
        transport: &'static str,
        /// Reason reported by the transport.
        reason: String,
    },
    /// No registered transport accepted the message.
    #[error("{kind} message was not delivered to any transport")]
    Undelivered {
        /// Payload kind of the dropped message.
        kind: &'static str,
    },
    /// Wrapper for JSON serialization or deserialization problems.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub use logging::{log_message, MessageDirection};
pub use requests::{
    ActivityOperation, ActivityRuntimeRequest, ConfigurationOperation, ConfigurationParameter,
    ConfigurationRequest, ControllerRequest, DataTransferRequest, DataTransferResult,
    DataTransferStatus, DeletionRequest, DeletionResult, DeletionStatus, DeploymentRequest,
    DeploymentResult, DeploymentStatus, FullControllerStatus, LiveActivityStatusReport,
};
pub use supervisor::{MessagingMetrics, MessagingSupervisor};
pub use transport::{InMemoryTransport, Transport};
pub use types::{
    ActivityRequestFrame, ActivityStatusFrame, ControllerRequestFrame, ControllerStatusFrame,
    ControllerStatusKind, Message, MessagePayload, SCHEMA_VERSION,
};
pub use wire::WireStatusCode;
