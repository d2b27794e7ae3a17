//! ---
//! spc_section: "01-core-functionality"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Supervisory core of the space controller."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
//! Status watching, deployment, lifecycle dispatch, and the controller
//! runtime that ties them to a message transport.

pub mod communicator;
pub mod controller;
pub mod data_bundle;
pub mod deployment;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod runtime;
pub mod watcher;

pub use communicator::{ControllerCommunicator, StatusPublisher};
pub use controller::StandardController;
pub use data_bundle::DataBundleManager;
pub use deployment::{
    ActivityInstaller, DeletionOutcome, DeletionReport, DeploymentExecutor, FsActivityInstaller,
};
pub use dispatcher::{ControllerControl, LifecycleDispatcher};
pub use error::{ControllerError, InstallError};
pub use identity::{ControllerIdentity, ControllerInfo};
pub use runtime::{RuntimeHandle, SpaceControllerRuntime};
pub use watcher::{ActivityStatusWatcher, ActivityWatcherListener};
