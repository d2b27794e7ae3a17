//! ---
//! spc_section: "02-activity-model"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "In-process activity used by the daemon and the test suites."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::activity::{ActivityError, ActivityFactory, ConfigurationUpdate, LiveActivity};
use crate::registry::InstalledActivity;
use crate::state::{ActivityState, ActivityStatus};

#[derive(Debug)]
struct SimulatedState {
    status: ActivityStatus,
    configuration: ConfigurationUpdate,
    fail_startup: Option<String>,
    status_fault: Option<String>,
}

/// Activity with no business logic that follows the standard lifecycle.
///
/// Startup and activation complete synchronously. Failures and crashes can
/// be injected to drive the supervisory paths.
#[derive(Debug)]
pub struct SimulatedActivity {
    uuid: String,
    state: Mutex<SimulatedState>,
}

impl SimulatedActivity {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            state: Mutex::new(SimulatedState {
                status: ActivityStatus::new(ActivityState::Ready),
                configuration: ConfigurationUpdate::new(),
                fail_startup: None,
                status_fault: None,
            }),
        }
    }

    /// Force a status, as if the activity had changed on its own.
    pub fn set_status(&self, status: ActivityStatus) {
        self.state.lock().status = status;
    }

    pub fn crash(&self, reason: impl Into<String>) {
        self.set_status(ActivityStatus::with_description(ActivityState::Crashed, reason));
    }

    /// Make the next startup fail with `reason`.
    pub fn fail_next_startup(&self, reason: impl Into<String>) {
        self.state.lock().fail_startup = Some(reason.into());
    }

    /// Make status fetches fail until cleared with `None`.
    pub fn set_status_fault(&self, fault: Option<String>) {
        self.state.lock().status_fault = fault;
    }

    pub fn configuration(&self) -> ConfigurationUpdate {
        self.state.lock().configuration.clone()
    }

    fn transition<F>(
        &self,
        operation: &'static str,
        allowed: F,
        next: ActivityState,
    ) -> Result<(), ActivityError>
    where
        F: Fn(ActivityState) -> bool,
    {
        let mut guard = self.state.lock();
        let current = guard.status.state;
        if !allowed(current) {
            return Err(ActivityError::IllegalTransition {
                uuid: self.uuid.clone(),
                operation,
                state: current,
            });
        }
        debug!(uuid = %self.uuid, from = %current, to = %next, operation, "simulated transition");
        guard.status = ActivityStatus::new(next);
        Ok(())
    }
}

impl LiveActivity for SimulatedActivity {
    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn activity_status(&self) -> Result<ActivityStatus, ActivityError> {
        let guard = self.state.lock();
        match &guard.status_fault {
            Some(fault) => Err(ActivityError::fault(&self.uuid, fault.clone())),
            None => Ok(guard.status.clone()),
        }
    }

    fn startup(&self) -> Result<(), ActivityError> {
        let mut guard = self.state.lock();
        let current = guard.status.state;
        if current.is_running() {
            return Err(ActivityError::IllegalTransition {
                uuid: self.uuid.clone(),
                operation: "startup",
                state: current,
            });
        }
        if let Some(reason) = guard.fail_startup.take() {
            guard.status = ActivityStatus::with_description(ActivityState::StartupFailure, &reason);
            return Err(ActivityError::fault(&self.uuid, reason));
        }
        guard.status = ActivityStatus::new(ActivityState::Running);
        Ok(())
    }

    fn activate(&self) -> Result<(), ActivityError> {
        self.transition(
            "activate",
            |state| matches!(state, ActivityState::Running | ActivityState::ActivateFailure),
            ActivityState::Active,
        )
    }

    fn deactivate(&self) -> Result<(), ActivityError> {
        self.transition(
            "deactivate",
            |state| matches!(state, ActivityState::Active | ActivityState::DeactivateFailure),
            ActivityState::Running,
        )
    }

    fn shutdown(&self) -> Result<(), ActivityError> {
        self.transition("shutdown", |_| true, ActivityState::Ready)
    }

    fn update_configuration(&self, update: &ConfigurationUpdate) -> Result<(), ActivityError> {
        let mut guard = self.state.lock();
        guard
            .configuration
            .extend(update.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    fn handle_startup_failure(&self) {
        let mut guard = self.state.lock();
        if guard.status.state == ActivityState::StartupFailure {
            guard.status = ActivityStatus::new(ActivityState::Ready);
        }
    }
}

/// Factory producing a [`SimulatedActivity`] per installed record.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedActivityFactory;

impl ActivityFactory for SimulatedActivityFactory {
    fn create(&self, installed: &InstalledActivity) -> Result<Arc<dyn LiveActivity>, ActivityError> {
        Ok(Arc::new(SimulatedActivity::new(installed.uuid.clone())))
    }
}
