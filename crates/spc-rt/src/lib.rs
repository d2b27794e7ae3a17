//! ---
//! spc_section: "05-runtime"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Runtime helpers supporting the controller."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
//! Fixed-period scheduling helpers for the SPC runtime.

pub mod scheduling;

pub use scheduling::{PeriodicTask, RateLimiter};
