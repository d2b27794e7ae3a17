//! ---
//! spc_section: "04-messaging"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Typed controller and activity requests with their payloads."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
//! Inbound frames carry an integer operation code and an optional JSON
//! payload. Decoding turns them into closed sum types; codes that are not in
//! the table decode to an `Unknown` arm instead of failing so newer masters
//! can talk to older controllers.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use spc_activity::ConfigurationUpdate;

use crate::types::{ActivityRequestFrame, ControllerRequestFrame};
use crate::{MessagingError, Result};

/// Encode a payload body as JSON bytes.
pub fn encode_payload<T: Serialize>(body: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(body)?)
}

/// Decode a JSON payload body, failing when it is absent.
pub fn decode_payload<T: DeserializeOwned>(
    payload: Option<&[u8]>,
    operation: &'static str,
) -> Result<T> {
    let bytes = payload.ok_or(MessagingError::MissingPayload { operation })?;
    Ok(serde_json::from_slice(bytes)?)
}

/// Controller-level request.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerRequest {
    /// Publish the full controller status.
    Status,
    /// Shut down every live activity.
    ShutdownActivities,
    /// Shut down the controller container.
    ShutdownController,
    /// Install a packed live activity.
    DeployLiveActivity(DeploymentRequest),
    /// Remove an installed live activity.
    DeleteLiveActivity(DeletionRequest),
    /// Clean the controller temporary data directory.
    CleanDataTmp,
    /// Clean the controller permanent data directory.
    CleanDataPermanent,
    /// Clean every activity's temporary data directory.
    CleanDataTmpActivities,
    /// Clean every activity's permanent data directory.
    CleanDataPermanentActivities,
    /// Copy the controller and activity data into a bundle.
    CaptureData(DataTransferRequest),
    /// Replace the controller and activity data from a bundle.
    RestoreData(DataTransferRequest),
    /// Operation code not known to this controller.
    Unknown(i32),
}

impl ControllerRequest {
    /// Operation code for [`ControllerRequest::Status`].
    pub const STATUS: i32 = 0;
    /// Operation code for [`ControllerRequest::ShutdownActivities`].
    pub const SHUTDOWN_ACTIVITIES: i32 = 1;
    /// Operation code for [`ControllerRequest::ShutdownController`].
    pub const SHUTDOWN_CONTROLLER: i32 = 2;
    /// Operation code for [`ControllerRequest::DeployLiveActivity`].
    pub const DEPLOY_LIVE_ACTIVITY: i32 = 3;
    /// Operation code for [`ControllerRequest::DeleteLiveActivity`].
    pub const DELETE_LIVE_ACTIVITY: i32 = 4;
    /// Operation code for [`ControllerRequest::CleanDataTmp`].
    pub const CLEAN_DATA_TMP: i32 = 5;
    /// Operation code for [`ControllerRequest::CleanDataPermanent`].
    pub const CLEAN_DATA_PERMANENT: i32 = 6;
    /// Operation code for [`ControllerRequest::CleanDataTmpActivities`].
    pub const CLEAN_DATA_TMP_ACTIVITIES: i32 = 7;
    /// Operation code for [`ControllerRequest::CleanDataPermanentActivities`].
    pub const CLEAN_DATA_PERMANENT_ACTIVITIES: i32 = 8;
    /// Operation code for [`ControllerRequest::CaptureData`].
    pub const CAPTURE_DATA: i32 = 9;
    /// Operation code for [`ControllerRequest::RestoreData`].
    pub const RESTORE_DATA: i32 = 10;

    /// Decode a raw frame. Fails only when a known operation has a bad payload.
    pub fn decode(frame: &ControllerRequestFrame) -> Result<Self> {
        let payload = frame.payload.as_deref();
        Ok(match frame.operation {
            Self::STATUS => ControllerRequest::Status,
            Self::SHUTDOWN_ACTIVITIES => ControllerRequest::ShutdownActivities,
            Self::SHUTDOWN_CONTROLLER => ControllerRequest::ShutdownController,
            Self::DEPLOY_LIVE_ACTIVITY => {
                ControllerRequest::DeployLiveActivity(decode_payload(payload, "deploy")?)
            }
            Self::DELETE_LIVE_ACTIVITY => {
                ControllerRequest::DeleteLiveActivity(decode_payload(payload, "delete")?)
            }
            Self::CLEAN_DATA_TMP => ControllerRequest::CleanDataTmp,
            Self::CLEAN_DATA_PERMANENT => ControllerRequest::CleanDataPermanent,
            Self::CLEAN_DATA_TMP_ACTIVITIES => ControllerRequest::CleanDataTmpActivities,
            Self::CLEAN_DATA_PERMANENT_ACTIVITIES => {
                ControllerRequest::CleanDataPermanentActivities
            }
            Self::CAPTURE_DATA => {
                ControllerRequest::CaptureData(decode_payload(payload, "capture_data")?)
            }
            Self::RESTORE_DATA => {
                ControllerRequest::RestoreData(decode_payload(payload, "restore_data")?)
            }
            other => ControllerRequest::Unknown(other),
        })
    }

    /// Encode into a raw frame.
    pub fn to_frame(&self) -> Result<ControllerRequestFrame> {
        let (operation, payload) = match self {
            ControllerRequest::Status => (Self::STATUS, None),
            ControllerRequest::ShutdownActivities => (Self::SHUTDOWN_ACTIVITIES, None),
            ControllerRequest::ShutdownController => (Self::SHUTDOWN_CONTROLLER, None),
            ControllerRequest::DeployLiveActivity(request) => {
                (Self::DEPLOY_LIVE_ACTIVITY, Some(encode_payload(request)?))
            }
            ControllerRequest::DeleteLiveActivity(request) => {
                (Self::DELETE_LIVE_ACTIVITY, Some(encode_payload(request)?))
            }
            ControllerRequest::CleanDataTmp => (Self::CLEAN_DATA_TMP, None),
            ControllerRequest::CleanDataPermanent => (Self::CLEAN_DATA_PERMANENT, None),
            ControllerRequest::CleanDataTmpActivities => (Self::CLEAN_DATA_TMP_ACTIVITIES, None),
            ControllerRequest::CleanDataPermanentActivities => {
                (Self::CLEAN_DATA_PERMANENT_ACTIVITIES, None)
            }
            ControllerRequest::CaptureData(request) => {
                (Self::CAPTURE_DATA, Some(encode_payload(request)?))
            }
            ControllerRequest::RestoreData(request) => {
                (Self::RESTORE_DATA, Some(encode_payload(request)?))
            }
            ControllerRequest::Unknown(code) => (*code, None),
        };
        Ok(ControllerRequestFrame { operation, payload })
    }
}

/// Operation requested on a single live activity.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityOperation {
    /// Start the activity.
    Startup,
    /// Activate the activity, starting it first when needed.
    Activate,
    /// Deactivate the activity.
    Deactivate,
    /// Shut the activity down.
    Shutdown,
    /// Publish the activity status.
    Status,
    /// Apply a configuration update.
    Configure(ConfigurationRequest),
    /// Clean the activity's permanent data directory.
    CleanDataPermanent,
    /// Clean the activity's temporary data directory.
    CleanDataTmp,
    /// Operation code not known to this controller.
    Unknown(i32),
}

impl ActivityOperation {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ActivityOperation::Startup => "startup",
            ActivityOperation::Activate => "activate",
            ActivityOperation::Deactivate => "deactivate",
            ActivityOperation::Shutdown => "shutdown",
            ActivityOperation::Status => "status",
            ActivityOperation::Configure(_) => "configure",
            ActivityOperation::CleanDataPermanent => "clean_data_permanent",
            ActivityOperation::CleanDataTmp => "clean_data_tmp",
            ActivityOperation::Unknown(_) => "unknown",
        }
    }
}

/// Request targeting one live activity.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRuntimeRequest {
    /// Target live activity.
    pub uuid: String,
    /// Requested operation.
    pub operation: ActivityOperation,
}

impl ActivityRuntimeRequest {
    /// Operation code for [`ActivityOperation::Startup`].
    pub const STARTUP: i32 = 0;
    /// Operation code for [`ActivityOperation::Activate`].
    pub const ACTIVATE: i32 = 1;
    /// Operation code for [`ActivityOperation::Deactivate`].
    pub const DEACTIVATE: i32 = 2;
    /// Operation code for [`ActivityOperation::Shutdown`].
    pub const SHUTDOWN: i32 = 3;
    /// Operation code for [`ActivityOperation::Status`].
    pub const STATUS: i32 = 4;
    /// Operation code for [`ActivityOperation::Configure`].
    pub const CONFIGURE: i32 = 5;
    /// Operation code for [`ActivityOperation::CleanDataPermanent`].
    pub const CLEAN_DATA_PERMANENT: i32 = 6;
    /// Operation code for [`ActivityOperation::CleanDataTmp`].
    pub const CLEAN_DATA_TMP: i32 = 7;

    /// Build a request.
    pub fn new(uuid: impl Into<String>, operation: ActivityOperation) -> Self {
        Self {
            uuid: uuid.into(),
            operation,
        }
    }

    /// Decode a raw frame.
    pub fn decode(frame: &ActivityRequestFrame) -> Result<Self> {
        let uuid = frame
            .uuid
            .clone()
            .filter(|uuid| !uuid.trim().is_empty())
            .ok_or(MessagingError::MissingUuid {
                operation: frame.operation,
            })?;
        let operation = match frame.operation {
            Self::STARTUP => ActivityOperation::Startup,
            Self::ACTIVATE => ActivityOperation::Activate,
            Self::DEACTIVATE => ActivityOperation::Deactivate,
            Self::SHUTDOWN => ActivityOperation::Shutdown,
            Self::STATUS => ActivityOperation::Status,
            Self::CONFIGURE => ActivityOperation::Configure(decode_payload(
                frame.payload.as_deref(),
                "configure",
            )?),
            Self::CLEAN_DATA_PERMANENT => ActivityOperation::CleanDataPermanent,
            Self::CLEAN_DATA_TMP => ActivityOperation::CleanDataTmp,
            other => ActivityOperation::Unknown(other),
        };
        Ok(Self { uuid, operation })
    }

    /// Encode into a raw frame.
    pub fn to_frame(&self) -> Result<ActivityRequestFrame> {
        let (operation, payload) = match &self.operation {
            ActivityOperation::Startup => (Self::STARTUP, None),
            ActivityOperation::Activate => (Self::ACTIVATE, None),
            ActivityOperation::Deactivate => (Self::DEACTIVATE, None),
            ActivityOperation::Shutdown => (Self::SHUTDOWN, None),
            ActivityOperation::Status => (Self::STATUS, None),
            ActivityOperation::Configure(request) => {
                (Self::CONFIGURE, Some(encode_payload(request)?))
            }
            ActivityOperation::CleanDataPermanent => (Self::CLEAN_DATA_PERMANENT, None),
            ActivityOperation::CleanDataTmp => (Self::CLEAN_DATA_TMP, None),
            ActivityOperation::Unknown(code) => (*code, None),
        };
        Ok(ActivityRequestFrame {
            operation,
            uuid: Some(self.uuid.clone()),
            payload,
        })
    }
}

/// Request to install a packed live activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    /// Uuid of the live activity.
    pub uuid: String,
    /// Where the packed activity can be copied from.
    pub source_uri: String,
    /// Identifying name of the activity.
    pub identifying_name: String,
    /// Activity version.
    pub version: String,
}

/// Outcome of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    /// Copied and installed.
    Success,
    /// The packed activity could not be copied.
    FailureCopy,
    /// The packed activity could not be installed.
    FailureUnpack,
}

/// Result published for every deployment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    /// Uuid of the live activity.
    pub uuid: String,
    /// Outcome.
    pub status: DeploymentStatus,
    /// Install time, present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,
}

/// Request to remove an installed live activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRequest {
    /// Uuid of the live activity.
    pub uuid: String,
    /// Identifying name, informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifying_name: Option<String>,
    /// Version, informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl DeletionRequest {
    /// Deletion request carrying only the uuid.
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            identifying_name: None,
            version: None,
        }
    }
}

/// Outcome of a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeletionStatus {
    /// Removed.
    Success,
    /// Not removed.
    Failure,
}

/// Result published for every deletion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionResult {
    /// Uuid of the live activity.
    pub uuid: String,
    /// When the deletion was attempted.
    pub deleted_at: DateTime<Utc>,
    /// Outcome.
    pub status: DeletionStatus,
    /// Why the deletion did not happen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
}

/// Where a controller data bundle is written to or read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTransferRequest {
    /// `file://` uri or bare local path of the bundle directory.
    pub transfer_uri: String,
}

impl DataTransferRequest {
    /// Request for the bundle at `transfer_uri`.
    pub fn new(transfer_uri: impl Into<String>) -> Self {
        Self {
            transfer_uri: transfer_uri.into(),
        }
    }
}

/// Outcome of a data capture or restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataTransferStatus {
    /// Every section was transferred.
    Success,
    /// The transfer stopped on a fault.
    Failure,
}

/// Result published for every data capture or restore request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTransferResult {
    /// Bundle location from the request.
    pub transfer_uri: String,
    /// Outcome.
    pub status: DataTransferStatus,
    /// Fault text on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
}

/// Kind of change carried by a configuration parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigurationOperation {
    /// Add or replace the parameter.
    Add,
    /// Remove the parameter.
    Delete,
    /// Any kind this controller does not understand.
    #[serde(other)]
    Other,
}

/// One entry of a configuration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationParameter {
    /// Change kind.
    pub operation: ConfigurationOperation,
    /// Parameter name.
    pub name: String,
    /// Parameter value.
    #[serde(default)]
    pub value: Option<String>,
}

/// Configuration update for a live activity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigurationRequest {
    /// Parameters in the order sent.
    #[serde(default)]
    pub parameters: Vec<ConfigurationParameter>,
}

impl ConfigurationRequest {
    /// Parameters marked ADD as a key/value update. Every other kind is skipped.
    pub fn additions(&self) -> ConfigurationUpdate {
        self.parameters
            .iter()
            .filter(|parameter| parameter.operation == ConfigurationOperation::Add)
            .map(|parameter| {
                (
                    parameter.name.clone(),
                    parameter.value.clone().unwrap_or_default(),
                )
            })
            .collect()
    }
}

/// One activity line of a full controller status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveActivityStatusReport {
    /// Uuid of the live activity.
    pub uuid: String,
    /// Wire status code.
    pub status: i32,
    /// Description or fault detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
}

/// Status of every installed activity on the controller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FullControllerStatus {
    /// One report per installed activity.
    pub activities: Vec<LiveActivityStatusReport>,
}
