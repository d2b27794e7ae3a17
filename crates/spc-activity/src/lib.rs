//! ---
//! spc_section: "02-activity-model"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Live activity data model and registry."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
//! Live activity run-state model, the live activity contract, and the
//! registry of activities installed on a controller.

mod activity;
mod registry;
mod simulated;
mod state;

pub use activity::{ActivityError, ActivityFactory, ConfigurationUpdate, LiveActivity};
pub use registry::{ActivityRegistry, InstalledActivity, StartupType, ACTIVITY_METADATA_FILE};
pub use simulated::{SimulatedActivity, SimulatedActivityFactory};
pub use state::{ActivityState, ActivityStatus};
