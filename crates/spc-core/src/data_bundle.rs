//! ---
//! spc_section: "01-core-functionality"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Capture and restore of controller and activity permanent data."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
//! A data bundle is a directory with one section per data area:
//! `controller/` for the controller's permanent data and `activity/<uuid>/`
//! for each installed activity. Sections missing on either side are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use spc_common::StorageConfig;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::deployment::{copy_tree, remove_dir_if_present, resolve_source, validate_uuid};
use crate::error::ControllerError;

pub const CONTROLLER_SECTION: &str = "controller";
pub const ACTIVITY_SECTIONS: &str = "activity";

/// Moves permanent data between the storage tree and data bundles.
pub struct DataBundleManager {
    storage: StorageConfig,
}

impl DataBundleManager {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    /// Write a bundle to `transfer_uri`, which must not exist yet.
    ///
    /// Returns the number of sections written. A failed capture leaves no
    /// bundle behind.
    pub fn capture(&self, transfer_uri: &str, activities: &[String]) -> Result<usize, ControllerError> {
        let bundle = resolve_source(transfer_uri)?;
        if bundle.exists() {
            return Err(ControllerError::BundleExists(bundle));
        }
        fs::create_dir_all(&bundle).map_err(|err| ControllerError::io(&bundle, err))?;

        match self.capture_sections(&bundle, activities) {
            Ok(sections) => {
                info!(bundle = %bundle.display(), sections, "controller data captured");
                Ok(sections)
            }
            Err(err) => {
                if let Err(cleanup) = remove_dir_if_present(&bundle) {
                    warn!(bundle = %bundle.display(), error = %cleanup, "could not remove partial data bundle");
                }
                Err(err)
            }
        }
    }

    fn capture_sections(&self, bundle: &Path, activities: &[String]) -> Result<usize, ControllerError> {
        let mut sections = 0;
        if capture_section(
            &self.storage.controller_data_dir(),
            &bundle.join(CONTROLLER_SECTION),
        )? {
            sections += 1;
        }
        for uuid in valid_uuids(activities) {
            let section = bundle.join(ACTIVITY_SECTIONS).join(uuid);
            if capture_section(&self.storage.activity_data_dir(uuid), &section)? {
                sections += 1;
            }
        }
        Ok(sections)
    }

    /// Replace data areas with the matching sections of the bundle at `transfer_uri`.
    ///
    /// Each area is swapped in whole; a failed swap puts the previous content
    /// back. Returns the number of sections restored.
    pub fn restore(&self, transfer_uri: &str, activities: &[String]) -> Result<usize, ControllerError> {
        let bundle = resolve_source(transfer_uri)?;
        if !bundle.is_dir() {
            return Err(ControllerError::MissingBundle(bundle));
        }

        let mut sections = 0;
        if self.restore_section(
            &bundle.join(CONTROLLER_SECTION),
            &self.storage.controller_data_dir(),
        )? {
            sections += 1;
        }
        for uuid in valid_uuids(activities) {
            let section = bundle.join(ACTIVITY_SECTIONS).join(uuid);
            if self.restore_section(&section, &self.storage.activity_data_dir(uuid))? {
                sections += 1;
            }
        }
        info!(bundle = %bundle.display(), sections, "controller data restored");
        Ok(sections)
    }

    fn scratch_dir(&self) -> PathBuf {
        self.storage
            .tmp_dir()
            .join("data-bundle")
            .join(Uuid::new_v4().to_string())
    }

    fn restore_section(&self, section: &Path, target: &Path) -> Result<bool, ControllerError> {
        if !section.is_dir() {
            debug!(section = %section.display(), "bundle has no such section; skipping");
            return Ok(false);
        }
        let scratch = self.scratch_dir();
        let swapped = swap_in(section, target, &scratch.join("incoming"), &scratch.join("backup"));
        if let Err(err) = remove_dir_if_present(&scratch) {
            warn!(scratch = %scratch.display(), error = %err, "could not remove restore scratch directory");
        }
        swapped.map(|()| true)
    }
}

fn valid_uuids(activities: &[String]) -> impl Iterator<Item = &str> + '_ {
    activities.iter().map(String::as_str).filter(|uuid| {
        let valid = validate_uuid(uuid).is_ok();
        if !valid {
            warn!(uuid, "skipping activity with an unusable uuid");
        }
        valid
    })
}

fn capture_section(source: &Path, section: &Path) -> Result<bool, ControllerError> {
    if !source.is_dir() {
        debug!(source = %source.display(), "no data directory; section skipped");
        return Ok(false);
    }
    copy_tree(source, section)?;
    Ok(true)
}

/// Copy `section` next to `target`, then rename it into place.
fn swap_in(section: &Path, target: &Path, incoming: &Path, backup: &Path) -> Result<(), ControllerError> {
    copy_tree(section, incoming)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|err| ControllerError::io(parent, err))?;
    }

    let had_previous = target.exists();
    if had_previous {
        fs::rename(target, backup).map_err(|err| ControllerError::io(target, err))?;
    }
    if let Err(err) = fs::rename(incoming, target) {
        if had_previous {
            if let Err(undo) = fs::rename(backup, target) {
                error!(target = %target.display(), error = %undo, "could not put previous data back");
            }
        }
        return Err(ControllerError::io(target, err));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    fn seeded() -> (tempfile::TempDir, StorageConfig) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = StorageConfig::with_root(dir.path().join("spc"));
        fs::create_dir_all(storage.controller_data_dir().join("state")).expect("mkdir");
        fs::write(storage.controller_data_dir().join("state/clock.json"), b"{}").expect("write");
        fs::create_dir_all(storage.activity_data_dir("abc")).expect("mkdir");
        fs::write(storage.activity_data_dir("abc").join("scores.txt"), b"42").expect("write");
        (dir, storage)
    }

    #[test]
    fn capture_writes_controller_and_activity_sections() {
        let (dir, storage) = seeded();
        let bundle = dir.path().join("bundle");
        let uri = Url::from_file_path(&bundle).expect("uri").to_string();

        let sections = DataBundleManager::new(storage)
            .capture(&uri, &["abc".into(), "idle".into()])
            .expect("capture");

        assert_eq!(sections, 2);
        assert!(bundle.join("controller/state/clock.json").is_file());
        assert!(bundle.join("activity/abc/scores.txt").is_file());
        assert!(!bundle.join("activity/idle").exists());
    }

    #[test]
    fn capture_refuses_existing_target() {
        let (dir, storage) = seeded();
        let bundle = dir.path().join("bundle");
        fs::create_dir_all(&bundle).expect("mkdir");
        fs::write(bundle.join("other.txt"), b"keep").expect("write");

        let err = DataBundleManager::new(storage)
            .capture(bundle.to_str().expect("utf8 path"), &[])
            .expect_err("existing target");
        assert!(matches!(err, ControllerError::BundleExists(_)));
        assert!(bundle.join("other.txt").is_file());
    }

    #[test]
    fn capture_rejects_remote_schemes() {
        let (_dir, storage) = seeded();
        let err = DataBundleManager::new(storage)
            .capture("http://master/bundles/ctrl-1", &[])
            .expect_err("remote target");
        assert!(matches!(err, ControllerError::Install(_)));
    }

    #[test]
    fn restore_replaces_data_areas_from_bundle() {
        let (dir, storage) = seeded();
        let bundle = dir.path().join("bundle");
        let manager = DataBundleManager::new(storage.clone());
        manager
            .capture(bundle.to_str().expect("utf8 path"), &["abc".into()])
            .expect("capture");

        fs::write(storage.controller_data_dir().join("state/clock.json"), b"{\"drift\":1}")
            .expect("write");
        fs::write(storage.controller_data_dir().join("stale.txt"), b"x").expect("write");
        fs::remove_dir_all(storage.activity_data_dir("abc")).expect("rm");

        let sections = manager
            .restore(bundle.to_str().expect("utf8 path"), &["abc".into()])
            .expect("restore");

        assert_eq!(sections, 2);
        assert_eq!(
            fs::read(storage.controller_data_dir().join("state/clock.json")).expect("read"),
            b"{}"
        );
        assert!(!storage.controller_data_dir().join("stale.txt").exists());
        assert_eq!(
            fs::read(storage.activity_data_dir("abc").join("scores.txt")).expect("read"),
            b"42"
        );
        assert!(bundle.join("controller/state/clock.json").is_file());
        let scratch = storage.tmp_dir().join("data-bundle");
        assert_eq!(fs::read_dir(&scratch).expect("scratch").count(), 0);
    }

    #[test]
    fn restore_skips_missing_sections_and_listed_outsiders() {
        let (dir, storage) = seeded();
        let bundle = dir.path().join("bundle");
        fs::create_dir_all(bundle.join("activity/..")).expect("mkdir");

        let sections = DataBundleManager::new(storage.clone())
            .restore(bundle.to_str().expect("utf8 path"), &["abc".into(), "..".into()])
            .expect("restore");

        assert_eq!(sections, 0);
        assert!(storage.controller_data_dir().join("state/clock.json").is_file());
        assert!(storage.activity_data_dir("abc").join("scores.txt").is_file());
    }

    #[test]
    fn restore_requires_bundle_directory() {
        let (dir, storage) = seeded();
        let err = DataBundleManager::new(storage)
            .restore(dir.path().join("missing").to_str().expect("utf8 path"), &[])
            .expect_err("missing bundle");
        assert!(matches!(err, ControllerError::MissingBundle(_)));
    }
}
