//! ---
//! spc_section: "04-messaging"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Wire status codes for live activity states."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use spc_activity::ActivityState;

/// Integer status codes used for live activity state on the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum WireStatusCode {
    /// Installed but not running.
    Ready = 0,
    /// Startup requested.
    StartupAttempt = 1,
    /// Startup failed.
    StartupFailure = 2,
    /// Running but not active.
    Running = 3,
    /// Activation requested.
    ActivateAttempt = 4,
    /// Activation failed.
    ActivateFailure = 5,
    /// Running and active.
    Active = 6,
    /// Deactivation requested.
    DeactivateAttempt = 7,
    /// Deactivation failed.
    DeactivateFailure = 8,
    /// Shutdown requested.
    ShutdownAttempt = 9,
    /// Shutdown failed.
    ShutdownFailure = 10,
    /// Crashed while running.
    Crashed = 11,
    /// State could not be determined.
    Unknown = 12,
    /// Deployment in progress.
    DeployAttempt = 13,
    /// Deployment failed.
    DeployFailure = 14,
    /// Not installed on this controller.
    DoesntExist = 15,
}

impl WireStatusCode {
    /// Integer carried on the wire.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Decode a wire integer. Values outside the table map to [`WireStatusCode::Unknown`].
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => WireStatusCode::Ready,
            1 => WireStatusCode::StartupAttempt,
            2 => WireStatusCode::StartupFailure,
            3 => WireStatusCode::Running,
            4 => WireStatusCode::ActivateAttempt,
            5 => WireStatusCode::ActivateFailure,
            6 => WireStatusCode::Active,
            7 => WireStatusCode::DeactivateAttempt,
            8 => WireStatusCode::DeactivateFailure,
            9 => WireStatusCode::ShutdownAttempt,
            10 => WireStatusCode::ShutdownFailure,
            11 => WireStatusCode::Crashed,
            13 => WireStatusCode::DeployAttempt,
            14 => WireStatusCode::DeployFailure,
            15 => WireStatusCode::DoesntExist,
            _ => WireStatusCode::Unknown,
        }
    }

    /// Translate an internal state into its wire code.
    pub fn translate(state: ActivityState) -> Self {
        match state {
            ActivityState::Unknown => WireStatusCode::Unknown,
            ActivityState::Ready => WireStatusCode::Ready,
            ActivityState::Running => WireStatusCode::Running,
            ActivityState::Active => WireStatusCode::Active,
            ActivityState::Crashed => WireStatusCode::Crashed,
            ActivityState::StartupAttempt => WireStatusCode::StartupAttempt,
            ActivityState::StartupFailure => WireStatusCode::StartupFailure,
            ActivityState::ActivateAttempt => WireStatusCode::ActivateAttempt,
            ActivityState::ActivateFailure => WireStatusCode::ActivateFailure,
            ActivityState::DeactivateAttempt => WireStatusCode::DeactivateAttempt,
            ActivityState::DeactivateFailure => WireStatusCode::DeactivateFailure,
            ActivityState::ShutdownAttempt => WireStatusCode::ShutdownAttempt,
            ActivityState::ShutdownFailure => WireStatusCode::ShutdownFailure,
            ActivityState::DeployAttempt => WireStatusCode::DeployAttempt,
            ActivityState::DeployFailure => WireStatusCode::DeployFailure,
            ActivityState::DoesntExist => WireStatusCode::DoesntExist,
        }
    }

    /// Internal state for this code.
    pub fn state(self) -> ActivityState {
        match self {
            WireStatusCode::Ready => ActivityState::Ready,
            WireStatusCode::StartupAttempt => ActivityState::StartupAttempt,
            WireStatusCode::StartupFailure => ActivityState::StartupFailure,
            WireStatusCode::Running => ActivityState::Running,
            WireStatusCode::ActivateAttempt => ActivityState::ActivateAttempt,
            WireStatusCode::ActivateFailure => ActivityState::ActivateFailure,
            WireStatusCode::Active => ActivityState::Active,
            WireStatusCode::DeactivateAttempt => ActivityState::DeactivateAttempt,
            WireStatusCode::DeactivateFailure => ActivityState::DeactivateFailure,
            WireStatusCode::ShutdownAttempt => ActivityState::ShutdownAttempt,
            WireStatusCode::ShutdownFailure => ActivityState::ShutdownFailure,
            WireStatusCode::Crashed => ActivityState::Crashed,
            WireStatusCode::Unknown => ActivityState::Unknown,
            WireStatusCode::DeployAttempt => ActivityState::DeployAttempt,
            WireStatusCode::DeployFailure => ActivityState::DeployFailure,
            WireStatusCode::DoesntExist => ActivityState::DoesntExist,
        }
    }
}

impl From<ActivityState> for WireStatusCode {
    fn from(state: ActivityState) -> Self {
        WireStatusCode::translate(state)
    }
}
