//! ---
//! spc_section: "02-activity-model"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Live activity run-states and status snapshots."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run-state of a live activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityState {
    Unknown,
    Ready,
    Running,
    Active,
    Crashed,
    StartupAttempt,
    StartupFailure,
    ActivateAttempt,
    ActivateFailure,
    DeactivateAttempt,
    DeactivateFailure,
    ShutdownAttempt,
    ShutdownFailure,
    DeployAttempt,
    DeployFailure,
    DoesntExist,
}

impl ActivityState {
    pub const ALL: [ActivityState; 16] = [
        ActivityState::Unknown,
        ActivityState::Ready,
        ActivityState::Running,
        ActivityState::Active,
        ActivityState::Crashed,
        ActivityState::StartupAttempt,
        ActivityState::StartupFailure,
        ActivityState::ActivateAttempt,
        ActivityState::ActivateFailure,
        ActivityState::DeactivateAttempt,
        ActivityState::DeactivateFailure,
        ActivityState::ShutdownAttempt,
        ActivityState::ShutdownFailure,
        ActivityState::DeployAttempt,
        ActivityState::DeployFailure,
        ActivityState::DoesntExist,
    ];

    /// Whether the activity holds runtime resources in this state.
    ///
    /// A state that is neither running nor an error is quiescent and takes
    /// the activity out of the watcher's supervision.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            ActivityState::Running
                | ActivityState::Active
                | ActivityState::StartupAttempt
                | ActivityState::ActivateAttempt
                | ActivityState::ActivateFailure
                | ActivityState::DeactivateAttempt
                | ActivityState::DeactivateFailure
                | ActivityState::ShutdownAttempt
        )
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            ActivityState::Crashed
                | ActivityState::StartupFailure
                | ActivityState::ActivateFailure
                | ActivityState::DeactivateFailure
                | ActivityState::ShutdownFailure
                | ActivityState::DeployFailure
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityState::Unknown => "UNKNOWN",
            ActivityState::Ready => "READY",
            ActivityState::Running => "RUNNING",
            ActivityState::Active => "ACTIVE",
            ActivityState::Crashed => "CRASHED",
            ActivityState::StartupAttempt => "STARTUP_ATTEMPT",
            ActivityState::StartupFailure => "STARTUP_FAILURE",
            ActivityState::ActivateAttempt => "ACTIVATE_ATTEMPT",
            ActivityState::ActivateFailure => "ACTIVATE_FAILURE",
            ActivityState::DeactivateAttempt => "DEACTIVATE_ATTEMPT",
            ActivityState::DeactivateFailure => "DEACTIVATE_FAILURE",
            ActivityState::ShutdownAttempt => "SHUTDOWN_ATTEMPT",
            ActivityState::ShutdownFailure => "SHUTDOWN_FAILURE",
            ActivityState::DeployAttempt => "DEPLOY_ATTEMPT",
            ActivityState::DeployFailure => "DEPLOY_FAILURE",
            ActivityState::DoesntExist => "DOESNT_EXIST",
        }
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a live activity's state with optional diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityStatus {
    pub state: ActivityState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Rendered fault detail, usually an error chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActivityStatus {
    pub fn new(state: ActivityState) -> Self {
        Self {
            state,
            description: None,
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_description(state: ActivityState, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::new(state)
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Text reported as the status detail on the wire.
    ///
    /// The fault detail wins over the description.
    pub fn reported_detail(&self) -> Option<&str> {
        self.detail.as_deref().or(self.description.as_deref())
    }
}
