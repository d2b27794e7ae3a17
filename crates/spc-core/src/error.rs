//! ---
//! spc_section: "01-core-functionality"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Error types for installation and controller operations."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::any::Any;
use std::path::PathBuf;

use spc_activity::ActivityError;
use spc_msg::MessagingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("invalid activity uuid '{0}'")]
    InvalidUuid(String),
    #[error("unsupported scheme '{scheme}' in source uri {uri}")]
    UnsupportedScheme { uri: String, scheme: String },
    #[error("invalid source uri {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error("packed activity source {} does not exist", .0.display())]
    MissingSource(PathBuf),
    #[error("activity {0} has no staged content")]
    NotStaged(String),
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("failed to encode activity metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl InstallError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Activity(#[from] ActivityError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("data bundle target {} already exists", .0.display())]
    BundleExists(PathBuf),
    #[error("data bundle {} not found", .0.display())]
    MissingBundle(PathBuf),
}

impl ControllerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
