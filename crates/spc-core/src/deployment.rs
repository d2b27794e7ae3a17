//! ---
//! spc_section: "01-core-functionality"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Live activity deployment and deletion."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use spc_activity::{ActivityRegistry, InstalledActivity, ACTIVITY_METADATA_FILE};
use spc_common::StorageConfig;
use spc_logging::{log_lifecycle_event, spc_error, spc_info, spc_warn, LifecycleOutcome, LogContext};
use spc_msg::{
    DeletionRequest, DeletionResult, DeletionStatus, DeploymentRequest, DeploymentResult,
    DeploymentStatus,
};
use tracing::debug;
use url::Url;
use walkdir::WalkDir;

use crate::error::{panic_message, InstallError};

/// Installs packed activities on the controller.
///
/// Calls are synchronous and may block on I/O.
pub trait ActivityInstaller: Send + Sync {
    /// Copy the packed activity from `source_uri` into local staging.
    fn copy_activity(&self, uuid: &str, source_uri: &str) -> Result<(), InstallError>;

    /// Install the staged activity, returning the install time.
    fn install_activity(
        &self,
        uuid: &str,
        identifying_name: &str,
        version: &str,
    ) -> Result<DateTime<Utc>, InstallError>;

    /// Remove whatever `copy_activity` staged. Missing staging is not an error.
    fn remove_packed_activity(&self, uuid: &str) -> Result<(), InstallError>;

    /// Remove an installed activity. Returns `false` when nothing was installed.
    fn remove_activity(&self, uuid: &str) -> Result<bool, InstallError>;
}

/// Run one installer call, turning an error or a panic into its fault text.
fn guarded<T>(call: impl FnOnce() -> Result<T, InstallError>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result.map_err(|err| err.to_string()),
        Err(payload) => Err(format!(
            "installer panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

/// Removes the staged package when dropped, whatever the deploy outcome.
struct PackedActivityCleanup<'a> {
    installer: &'a dyn ActivityInstaller,
    uuid: &'a str,
}

impl Drop for PackedActivityCleanup<'_> {
    fn drop(&mut self) {
        let (installer, uuid) = (self.installer, self.uuid);
        if let Err(reason) = guarded(|| installer.remove_packed_activity(uuid)) {
            spc_warn!(
                context = LogContext::new().with_activity(uuid).with_operation("deploy"),
                "could not remove packed activity: {}",
                reason
            );
        }
    }
}

/// How a deletion ended, before it is reduced to SUCCESS or FAILURE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    NotInstalled,
    Failed,
}

/// A deletion result together with its outcome.
#[derive(Debug, Clone)]
pub struct DeletionReport {
    pub outcome: DeletionOutcome,
    pub result: DeletionResult,
}

impl DeletionReport {
    /// Failed deletion that never reached the installer.
    pub fn refused(uuid: &str, detail: impl Into<String>) -> Self {
        Self {
            outcome: DeletionOutcome::Failed,
            result: DeletionResult {
                uuid: uuid.to_owned(),
                deleted_at: Utc::now(),
                status: DeletionStatus::Failure,
                status_detail: Some(detail.into()),
            },
        }
    }
}

/// Drives deploy and delete requests through an [`ActivityInstaller`].
///
/// Every request yields exactly one result. Installer errors and panics are
/// logged and turned into failure statuses.
#[derive(Clone)]
pub struct DeploymentExecutor {
    installer: Arc<dyn ActivityInstaller>,
}

impl DeploymentExecutor {
    pub fn new(installer: Arc<dyn ActivityInstaller>) -> Self {
        Self { installer }
    }

    pub fn deploy(&self, request: &DeploymentRequest) -> DeploymentResult {
        let ctx = LogContext::new()
            .with_activity(&request.uuid)
            .with_operation("deploy");
        spc_info!(
            context = ctx,
            "deploying {} {} from {}",
            request.identifying_name,
            request.version,
            request.source_uri
        );

        let installer = self.installer.as_ref();
        let mut status = DeploymentStatus::FailureCopy;
        let mut installed_at = None;
        {
            let _cleanup = PackedActivityCleanup {
                installer,
                uuid: &request.uuid,
            };

            match guarded(|| installer.copy_activity(&request.uuid, &request.source_uri)) {
                Err(reason) => {
                    spc_error!(context = ctx, "copying packed activity failed: {}", reason);
                }
                Ok(()) => {
                    status = DeploymentStatus::FailureUnpack;
                    match guarded(|| {
                        installer.install_activity(
                            &request.uuid,
                            &request.identifying_name,
                            &request.version,
                        )
                    }) {
                        Ok(at) => {
                            status = DeploymentStatus::Success;
                            installed_at = Some(at);
                        }
                        Err(reason) => {
                            spc_error!(context = ctx, "installing packed activity failed: {}", reason);
                        }
                    }
                }
            }
        }

        let outcome = if status == DeploymentStatus::Success {
            LifecycleOutcome::Success
        } else {
            LifecycleOutcome::Fault
        };
        log_lifecycle_event(
            Some(&ctx),
            "activity.deploy",
            &format!("deployment finished with {status:?}"),
            outcome,
        );

        DeploymentResult {
            uuid: request.uuid.clone(),
            status,
            installed_at,
        }
    }

    pub fn delete(&self, request: &DeletionRequest) -> DeletionReport {
        let ctx = LogContext::new()
            .with_activity(&request.uuid)
            .with_operation("delete");

        let installer = self.installer.as_ref();
        let (outcome, status_detail) = match guarded(|| installer.remove_activity(&request.uuid)) {
            Ok(true) => (DeletionOutcome::Deleted, None),
            Ok(false) => {
                spc_warn!(context = ctx, "no installed activity to delete");
                (
                    DeletionOutcome::NotInstalled,
                    Some(format!("live activity {} is not installed", request.uuid)),
                )
            }
            Err(reason) => {
                spc_error!(context = ctx, "deleting activity failed: {}", reason);
                (DeletionOutcome::Failed, Some(reason))
            }
        };

        let (status, lifecycle) = if outcome == DeletionOutcome::Deleted {
            (DeletionStatus::Success, LifecycleOutcome::Success)
        } else {
            (DeletionStatus::Failure, LifecycleOutcome::Fault)
        };
        log_lifecycle_event(
            Some(&ctx),
            "activity.delete",
            &format!("deletion finished with {outcome:?}"),
            lifecycle,
        );

        // Stamped for every outcome: this records when the deletion was attempted.
        DeletionReport {
            outcome,
            result: DeletionResult {
                uuid: request.uuid.clone(),
                deleted_at: Utc::now(),
                status,
                status_detail,
            },
        }
    }
}

/// Installer working on the controller's storage tree.
///
/// Packed activities are staged under `staging/<uuid>` and installed into
/// `activities/<uuid>` next to an `activity.json` record. Packages are
/// copied as they are; archives are not extracted. A uuid must be a single
/// plain path component.
pub struct FsActivityInstaller {
    storage: StorageConfig,
    registry: Arc<ActivityRegistry>,
}

/// Accept only uuids that name exactly one entry inside a storage directory.
pub(crate) fn validate_uuid(uuid: &str) -> Result<(), InstallError> {
    let mut components = Path::new(uuid).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(InstallError::InvalidUuid(uuid.to_owned())),
    }
}

impl FsActivityInstaller {
    pub fn new(storage: StorageConfig, registry: Arc<ActivityRegistry>) -> Self {
        Self { storage, registry }
    }

    fn staging_path(&self, uuid: &str) -> Result<PathBuf, InstallError> {
        validate_uuid(uuid)?;
        Ok(self.storage.staging_dir().join(uuid))
    }

    fn install_path(&self, uuid: &str) -> Result<PathBuf, InstallError> {
        validate_uuid(uuid)?;
        Ok(self.storage.activities_dir().join(uuid))
    }
}

/// Resolve a source uri to a local path. Bare paths are accepted as they are.
pub(crate) fn resolve_source(source_uri: &str) -> Result<PathBuf, InstallError> {
    match Url::parse(source_uri) {
        Ok(url) if url.scheme() == "file" => {
            url.to_file_path().map_err(|()| InstallError::InvalidUri {
                uri: source_uri.to_owned(),
                reason: "not a local file path".to_owned(),
            })
        }
        Ok(url) => Err(InstallError::UnsupportedScheme {
            uri: source_uri.to_owned(),
            scheme: url.scheme().to_owned(),
        }),
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(PathBuf::from(source_uri)),
        Err(err) => Err(InstallError::InvalidUri {
            uri: source_uri.to_owned(),
            reason: err.to_string(),
        }),
    }
}

pub(crate) fn remove_dir_if_present(path: &Path) -> Result<bool, InstallError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(InstallError::io(path, err)),
    }
}

/// Copy a file or directory tree to `target`, creating `target` as a directory.
pub(crate) fn copy_tree(source: &Path, target: &Path) -> Result<(), InstallError> {
    fs::create_dir_all(target).map_err(|err| InstallError::io(target, err))?;

    if source.is_file() {
        let name = source
            .file_name()
            .ok_or_else(|| InstallError::MissingSource(source.to_path_buf()))?;
        let destination = target.join(name);
        fs::copy(source, &destination).map_err(|err| InstallError::io(&destination, err))?;
        return Ok(());
    }

    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| InstallError::MissingSource(entry.path().to_path_buf()))?;
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination).map_err(|err| InstallError::io(&destination, err))?;
        } else {
            fs::copy(entry.path(), &destination)
                .map_err(|err| InstallError::io(&destination, err))?;
        }
    }
    Ok(())
}

impl ActivityInstaller for FsActivityInstaller {
    fn copy_activity(&self, uuid: &str, source_uri: &str) -> Result<(), InstallError> {
        let staging = self.staging_path(uuid)?;
        let source = resolve_source(source_uri)?;
        if !source.exists() {
            return Err(InstallError::MissingSource(source));
        }
        remove_dir_if_present(&staging)?;
        copy_tree(&source, &staging)?;
        debug!(uuid, source = %source.display(), staging = %staging.display(), "packed activity staged");
        Ok(())
    }

    fn install_activity(
        &self,
        uuid: &str,
        identifying_name: &str,
        version: &str,
    ) -> Result<DateTime<Utc>, InstallError> {
        let staging = self.staging_path(uuid)?;
        if !staging.is_dir() {
            return Err(InstallError::NotStaged(uuid.to_owned()));
        }
        let target = self.install_path(uuid)?;
        remove_dir_if_present(&target)?;
        copy_tree(&staging, &target)?;

        let installed_at = Utc::now();
        let mut record = InstalledActivity::new(uuid, identifying_name, version, installed_at);
        if let Some(previous) = self.registry.installed(uuid) {
            record.startup_type = previous.startup_type;
        }
        let metadata = target.join(ACTIVITY_METADATA_FILE);
        let encoded = serde_json::to_vec_pretty(&record)?;
        fs::write(&metadata, encoded).map_err(|err| InstallError::io(&metadata, err))?;

        self.registry.register(record);
        debug!(uuid, target = %target.display(), "activity installed");
        Ok(installed_at)
    }

    fn remove_packed_activity(&self, uuid: &str) -> Result<(), InstallError> {
        remove_dir_if_present(&self.staging_path(uuid)?).map(|_| ())
    }

    fn remove_activity(&self, uuid: &str) -> Result<bool, InstallError> {
        let target = self.install_path(uuid)?;
        if self.registry.installed(uuid).is_none() {
            debug!(uuid, "delete requested for an activity that is not installed");
            return Ok(false);
        }
        remove_dir_if_present(&target)?;
        self.registry.unregister(uuid);
        debug!(uuid, target = %target.display(), "activity removed");
        Ok(true)
    }
}
