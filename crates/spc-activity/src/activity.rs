//! ---
//! spc_section: "02-activity-model"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Contract implemented by every live activity instance."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::registry::InstalledActivity;
use crate::state::{ActivityState, ActivityStatus};

/// Key/value configuration entries applied to a live activity.
pub type ConfigurationUpdate = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("activity {uuid} cannot {operation} while {state}")]
    IllegalTransition {
        uuid: String,
        operation: &'static str,
        state: ActivityState,
    },
    #[error("activity {uuid} failed: {message}")]
    Fault { uuid: String, message: String },
    #[error("activity {0} does not exist")]
    NotFound(String),
}

impl ActivityError {
    pub fn fault(uuid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fault {
            uuid: uuid.into(),
            message: message.into(),
        }
    }
}

/// A loaded activity instance supervised by the controller.
///
/// Implementations are observed concurrently by the status watcher and the
/// request dispatcher, so every method takes `&self`.
pub trait LiveActivity: Send + Sync {
    fn uuid(&self) -> &str;

    /// Current status as reported by the activity itself.
    fn activity_status(&self) -> Result<ActivityStatus, ActivityError>;

    fn startup(&self) -> Result<(), ActivityError>;

    fn activate(&self) -> Result<(), ActivityError>;

    fn deactivate(&self) -> Result<(), ActivityError>;

    fn shutdown(&self) -> Result<(), ActivityError>;

    fn update_configuration(&self, update: &ConfigurationUpdate) -> Result<(), ActivityError>;

    /// Release whatever a failed startup left behind.
    fn handle_startup_failure(&self) {}
}

/// Creates live instances for installed activities.
pub trait ActivityFactory: Send + Sync {
    fn create(&self, installed: &InstalledActivity) -> Result<Arc<dyn LiveActivity>, ActivityError>;
}
