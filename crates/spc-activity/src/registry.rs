//! ---
//! spc_section: "02-activity-model"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Registry of installed activities and their live instances."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::activity::{ActivityError, LiveActivity};

/// Metadata file written into every activity install directory.
pub const ACTIVITY_METADATA_FILE: &str = "activity.json";

/// What the controller does with an installed activity when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StartupType {
    #[default]
    Ready,
    Startup,
    Activate,
}

/// Installed activity record, persisted as `activity.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledActivity {
    pub uuid: String,
    pub identifying_name: String,
    pub version: String,
    pub installed_at: DateTime<Utc>,
    #[serde(default)]
    pub startup_type: StartupType,
}

impl InstalledActivity {
    pub fn new(
        uuid: impl Into<String>,
        identifying_name: impl Into<String>,
        version: impl Into<String>,
        installed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            identifying_name: identifying_name.into(),
            version: version.into(),
            installed_at,
            startup_type: StartupType::Ready,
        }
    }
}

struct RegistryEntry {
    installed: InstalledActivity,
    live: Option<Arc<dyn LiveActivity>>,
}

/// Maps activity uuids to their installed record and, when loaded, the live instance.
///
/// Insertion order is preserved so full status reports list activities in
/// the order they were installed.
#[derive(Default)]
pub struct ActivityRegistry {
    entries: RwLock<IndexMap<String, RegistryEntry>>,
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an installed record. A live instance for the uuid is kept.
    pub fn register(&self, installed: InstalledActivity) {
        let mut entries = self.entries.write();
        match entries.get_mut(&installed.uuid) {
            Some(entry) => entry.installed = installed,
            None => {
                entries.insert(
                    installed.uuid.clone(),
                    RegistryEntry {
                        installed,
                        live: None,
                    },
                );
            }
        }
    }

    /// Remove the record and any live instance handle.
    pub fn unregister(&self, uuid: &str) -> Option<InstalledActivity> {
        self.entries
            .write()
            .shift_remove(uuid)
            .map(|entry| entry.installed)
    }

    pub fn installed(&self, uuid: &str) -> Option<InstalledActivity> {
        self.entries
            .read()
            .get(uuid)
            .map(|entry| entry.installed.clone())
    }

    pub fn all_installed(&self) -> Vec<InstalledActivity> {
        self.entries
            .read()
            .values()
            .map(|entry| entry.installed.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn live(&self, uuid: &str) -> Option<Arc<dyn LiveActivity>> {
        self.entries
            .read()
            .get(uuid)
            .and_then(|entry| entry.live.clone())
    }

    /// Attach a live instance to an installed record. Fails when the uuid is not installed.
    pub fn attach_live(&self, activity: Arc<dyn LiveActivity>) -> Result<(), ActivityError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(activity.uuid())
            .ok_or_else(|| ActivityError::NotFound(activity.uuid().to_owned()))?;
        entry.live = Some(activity);
        Ok(())
    }

    /// Return the live instance for `uuid`, creating and attaching one when absent.
    ///
    /// Creation happens under the write lock so concurrent requests for the
    /// same uuid never produce two instances.
    pub fn live_or_create<F>(
        &self,
        uuid: &str,
        create: F,
    ) -> Result<Arc<dyn LiveActivity>, ActivityError>
    where
        F: FnOnce(&InstalledActivity) -> Result<Arc<dyn LiveActivity>, ActivityError>,
    {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(uuid)
            .ok_or_else(|| ActivityError::NotFound(uuid.to_owned()))?;
        if let Some(live) = &entry.live {
            return Ok(Arc::clone(live));
        }
        let live = create(&entry.installed)?;
        entry.live = Some(Arc::clone(&live));
        Ok(live)
    }

    pub fn detach_live(&self, uuid: &str) -> Option<Arc<dyn LiveActivity>> {
        self.entries
            .write()
            .get_mut(uuid)
            .and_then(|entry| entry.live.take())
    }

    pub fn live_activities(&self) -> Vec<Arc<dyn LiveActivity>> {
        self.entries
            .read()
            .values()
            .filter_map(|entry| entry.live.clone())
            .collect()
    }

    /// Register every `activity.json` found one level below `dir`.
    ///
    /// Unreadable or malformed records are logged and skipped. Returns the
    /// number of records registered.
    pub fn load_from_dir(&self, dir: &Path) -> usize {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "no activity install directory; nothing to load");
            return 0;
        }

        let mut loaded = 0;
        for entry in WalkDir::new(dir)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry in activity directory");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.file_name() == ACTIVITY_METADATA_FILE)
        {
            let path = entry.path();
            let record = fs::read_to_string(path)
                .map_err(|err| err.to_string())
                .and_then(|raw| {
                    serde_json::from_str::<InstalledActivity>(&raw).map_err(|err| err.to_string())
                });
            match record {
                Ok(installed) => {
                    debug!(uuid = %installed.uuid, path = %path.display(), "loaded installed activity");
                    self.register(installed);
                    loaded += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "ignoring malformed activity record");
                }
            }
        }
        loaded
    }
}
