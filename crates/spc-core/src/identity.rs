//! ---
//! spc_section: "01-core-functionality"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Controller identity shared by publishers and the heartbeat."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use spc_common::ControllerConfig;

/// Identity of this controller as reported to the master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerInfo {
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub host_id: String,
}

impl ControllerInfo {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            uuid: config.uuid.clone().unwrap_or_default(),
            name: config.name.clone(),
            description: config.description.clone(),
            host_id: config.host_id.clone(),
        }
    }
}

/// Shared, updatable handle on the controller identity.
///
/// Readers always see the latest uuid, so long-running tasks such as the
/// heartbeat must read it on every use rather than caching it.
#[derive(Debug, Clone)]
pub struct ControllerIdentity {
    inner: Arc<RwLock<ControllerInfo>>,
}

impl ControllerIdentity {
    pub fn new(info: ControllerInfo) -> Self {
        Self {
            inner: Arc::new(RwLock::new(info)),
        }
    }

    pub fn uuid(&self) -> String {
        self.inner.read().uuid.clone()
    }

    pub fn info(&self) -> ControllerInfo {
        self.inner.read().clone()
    }

    pub fn set_uuid(&self, uuid: impl Into<String>) {
        self.inner.write().uuid = uuid.into();
    }
}
