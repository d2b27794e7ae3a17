//! ---
//! spc_section: "01-core-functionality"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Shared primitives and utilities for the core runtime."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
//! Shared primitives for the SPC controller workspace.
//! This crate exposes configuration loading and tracing bootstrap
//! utilities consumed across the workspace.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, ControllerConfig, HeartbeatConfig, LoadedAppConfig, LoggingConfig, StorageConfig,
    TransportSettings, WatcherConfig,
};
pub use logging::{init_tracing, LogFormat};
