//! ---
//! spc_section: "01-core-functionality"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Standard controller: lifecycle operations over the activity registry."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;
use std::sync::Arc;

use spc_activity::{
    ActivityError, ActivityFactory, ActivityRegistry, ActivityState, ActivityStatus,
    ConfigurationUpdate, InstalledActivity, LiveActivity, StartupType,
};
use spc_common::StorageConfig;
use spc_logging::{spc_debug, spc_error, spc_info, spc_warn, LogContext};
use spc_msg::{ControllerStatusKind, DataTransferResult, DataTransferStatus};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::communicator::StatusPublisher;
use crate::data_bundle::DataBundleManager;
use crate::dispatcher::ControllerControl;
use crate::error::ControllerError;
use crate::identity::{ControllerIdentity, ControllerInfo};
use crate::watcher::{ActivityStatusWatcher, ActivityWatcherListener};

/// Remove everything inside `dir`, keeping the directory itself.
///
/// A missing directory counts as clean. Returns the number of entries removed.
fn clean_directory(dir: &Path) -> Result<usize, ControllerError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(ControllerError::io(dir, err)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|err| ControllerError::io(dir, err))?;
        let path = entry.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|err| ControllerError::io(&path, err))?;
        removed += 1;
    }
    Ok(removed)
}

/// Data area touched by a clean request.
#[derive(Debug, Clone, Copy)]
enum DataKind {
    Tmp,
    Permanent,
}

impl DataKind {
    fn as_str(self) -> &'static str {
        match self {
            DataKind::Tmp => "tmp",
            DataKind::Permanent => "permanent",
        }
    }
}

/// Controller operating on installed activities held in an [`ActivityRegistry`].
///
/// Live instances are created on demand through the [`ActivityFactory`] and
/// handed to the [`ActivityStatusWatcher`] when started. Outcomes are reported
/// through the [`StatusPublisher`].
pub struct StandardController {
    identity: ControllerIdentity,
    registry: Arc<ActivityRegistry>,
    factory: Arc<dyn ActivityFactory>,
    watcher: Arc<ActivityStatusWatcher>,
    publisher: StatusPublisher,
    storage: StorageConfig,
    data_bundles: DataBundleManager,
    shutdown_requested: Arc<Notify>,
}

impl StandardController {
    pub fn new(
        registry: Arc<ActivityRegistry>,
        factory: Arc<dyn ActivityFactory>,
        watcher: Arc<ActivityStatusWatcher>,
        publisher: StatusPublisher,
        storage: StorageConfig,
    ) -> Self {
        Self {
            identity: publisher.identity().clone(),
            registry,
            factory,
            watcher,
            publisher,
            data_bundles: DataBundleManager::new(storage.clone()),
            storage,
            shutdown_requested: Arc::new(Notify::new()),
        }
    }

    pub fn controller_info(&self) -> ControllerInfo {
        self.identity.info()
    }

    /// Signalled once a controller shutdown has been requested.
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown_requested)
    }

    /// Start or activate every installed activity that asks for it.
    pub fn autostart(&self) {
        for installed in self.registry.all_installed() {
            match installed.startup_type {
                StartupType::Ready => {}
                StartupType::Startup => self.startup_activity(&installed.uuid),
                StartupType::Activate => self.activate_activity(&installed.uuid),
            }
        }
    }

    fn publish_state(&self, uuid: &str, state: ActivityState) {
        self.publisher
            .publish_activity_status(uuid, &ActivityStatus::new(state));
    }

    fn publish_failure(&self, uuid: &str, state: ActivityState, err: &ActivityError) {
        let controller = self.identity.uuid();
        spc_warn!(
            context = LogContext::new()
                .with_controller(&controller)
                .with_activity(uuid),
            "activity reported {}: {}",
            state,
            err
        );
        self.publisher.publish_activity_status(
            uuid,
            &ActivityStatus::with_description(state, err.to_string()),
        );
    }

    fn publish_unreadable(&self, activity: &Arc<dyn LiveActivity>, err: &ActivityError) {
        warn!(uuid = activity.uuid(), error = %err, "could not read activity status");
        self.publisher.publish_activity_status(
            activity.uuid(),
            &ActivityStatus::new(ActivityState::Unknown).with_detail(err.to_string()),
        );
    }

    /// Read and publish the current status. A failed read is published as UNKNOWN.
    fn publish_current(&self, activity: &Arc<dyn LiveActivity>) {
        match activity.activity_status() {
            Ok(status) => self.publisher.publish_activity_status(activity.uuid(), &status),
            Err(err) => self.publish_unreadable(activity, &err),
        }
    }

    fn current_state(&self, activity: &Arc<dyn LiveActivity>) -> Option<ActivityState> {
        match activity.activity_status() {
            Ok(status) => Some(status.state),
            Err(err) => {
                self.publish_unreadable(activity, &err);
                None
            }
        }
    }

    /// Live instance for `uuid`, created through the factory when needed.
    fn obtain_live(&self, uuid: &str) -> Option<Arc<dyn LiveActivity>> {
        let factory = Arc::clone(&self.factory);
        match self
            .registry
            .live_or_create(uuid, |installed| factory.create(installed))
        {
            Ok(activity) => Some(activity),
            Err(ActivityError::NotFound(_)) => {
                spc_debug!(
                    context = LogContext::new().with_activity(uuid),
                    "request for an activity that is not installed"
                );
                self.publish_state(uuid, ActivityState::DoesntExist);
                None
            }
            Err(err) => {
                self.publish_failure(uuid, ActivityState::StartupFailure, &err);
                None
            }
        }
    }

    /// Live instance for `uuid` without creating one.
    ///
    /// When there is none, READY is published for an installed activity and
    /// DOESNT_EXIST otherwise.
    fn existing_live(&self, uuid: &str) -> Option<Arc<dyn LiveActivity>> {
        if let Some(activity) = self.registry.live(uuid) {
            return Some(activity);
        }
        if self.registry.installed(uuid).is_some() {
            self.publish_state(uuid, ActivityState::Ready);
        } else {
            self.publish_state(uuid, ActivityState::DoesntExist);
        }
        None
    }

    fn start(&self, activity: &Arc<dyn LiveActivity>) -> bool {
        let uuid = activity.uuid();
        self.watcher.watch_activity(Arc::clone(activity));
        match activity.startup() {
            Ok(()) => {
                let controller = self.identity.uuid();
                spc_info!(
                    context = LogContext::new()
                        .with_controller(&controller)
                        .with_activity(uuid)
                        .with_operation("startup"),
                    "activity started"
                );
                self.publish_current(activity);
                true
            }
            Err(err) => {
                self.publish_failure(uuid, ActivityState::StartupFailure, &err);
                activity.handle_startup_failure();
                false
            }
        }
    }

    fn activate(&self, activity: &Arc<dyn LiveActivity>) {
        match activity.activate() {
            Ok(()) => self.publish_current(activity),
            Err(err) => self.publish_failure(activity.uuid(), ActivityState::ActivateFailure, &err),
        }
    }

    fn activity_is_running(&self, uuid: &str) -> bool {
        self.registry
            .live(uuid)
            .and_then(|activity| activity.activity_status().ok())
            .map(|status| status.state.is_running())
            .unwrap_or(false)
    }

    fn clean_activity_data(&self, uuid: &str, kind: DataKind) {
        if self.registry.installed(uuid).is_none() {
            self.publish_state(uuid, ActivityState::DoesntExist);
            return;
        }
        if self.activity_is_running(uuid) {
            warn!(uuid, kind = kind.as_str(), "refusing to clean data of a running activity");
            return;
        }
        let dir = match kind {
            DataKind::Tmp => self.storage.activity_tmp_dir(uuid),
            DataKind::Permanent => self.storage.activity_data_dir(uuid),
        };
        self.clean_logged(&dir, kind);
    }

    fn clean_logged(&self, dir: &Path, kind: DataKind) {
        match clean_directory(dir) {
            Ok(removed) => {
                debug!(dir = %dir.display(), kind = kind.as_str(), removed, "data cleaned")
            }
            Err(err) => error!(kind = kind.as_str(), error = %err, "data clean failed"),
        }
    }

    fn clean_all_activities_data(&self, kind: DataKind) {
        for installed in self.registry.all_installed() {
            self.clean_activity_data(&installed.uuid, kind);
        }
    }

    fn publish_data_transfer(
        &self,
        kind: ControllerStatusKind,
        transfer_uri: &str,
        outcome: Result<usize, ControllerError>,
    ) {
        let controller = self.identity.uuid();
        let operation = match kind {
            ControllerStatusKind::DataCapture => "capture_data",
            _ => "restore_data",
        };
        let ctx = LogContext::new()
            .with_controller(&controller)
            .with_operation(operation);
        let (status, status_detail) = match outcome {
            Ok(sections) => {
                spc_info!(context = ctx, "{} sections transferred via {}", sections, transfer_uri);
                (DataTransferStatus::Success, None)
            }
            Err(err) => {
                spc_error!(context = ctx, "data transfer via {} failed: {}", transfer_uri, err);
                (DataTransferStatus::Failure, Some(err.to_string()))
            }
        };
        self.publisher.publish_data_transfer_result(
            kind,
            &DataTransferResult {
                transfer_uri: transfer_uri.to_owned(),
                status,
                status_detail,
            },
        );
    }
}

impl ControllerControl for StandardController {
    fn startup_activity(&self, uuid: &str) {
        let Some(activity) = self.obtain_live(uuid) else {
            return;
        };
        match self.current_state(&activity) {
            Some(state) if state.is_running() => {
                spc_debug!(
                    context = LogContext::new()
                        .with_activity(uuid)
                        .with_operation("startup"),
                    "startup requested while {}",
                    state
                );
                self.publish_current(&activity);
            }
            Some(_) => {
                self.start(&activity);
            }
            None => {}
        }
    }

    fn activate_activity(&self, uuid: &str) {
        let Some(activity) = self.obtain_live(uuid) else {
            return;
        };
        match self.current_state(&activity) {
            Some(ActivityState::Ready) => {
                if self.start(&activity) {
                    self.activate(&activity);
                }
            }
            Some(ActivityState::Running | ActivityState::ActivateFailure) => {
                self.activate(&activity)
            }
            Some(ActivityState::Active) => self.publish_state(uuid, ActivityState::Active),
            Some(state) => warn!(uuid, %state, "cannot activate from the current state"),
            None => {}
        }
    }

    fn deactivate_activity(&self, uuid: &str) {
        let Some(activity) = self.existing_live(uuid) else {
            return;
        };
        match self.current_state(&activity) {
            Some(ActivityState::Active | ActivityState::DeactivateFailure) => {
                match activity.deactivate() {
                    Ok(()) => self.publish_current(&activity),
                    Err(err) => {
                        self.publish_failure(uuid, ActivityState::DeactivateFailure, &err)
                    }
                }
            }
            Some(state) => warn!(uuid, %state, "cannot deactivate from the current state"),
            None => {}
        }
    }

    fn shutdown_activity(&self, uuid: &str) {
        let Some(activity) = self.existing_live(uuid) else {
            return;
        };
        match activity.shutdown() {
            Ok(()) => {
                self.publish_current(&activity);
                self.watcher.unwatch_activity(&activity);
                self.registry.detach_live(uuid);
                let controller = self.identity.uuid();
                spc_info!(
                    context = LogContext::new()
                        .with_controller(&controller)
                        .with_activity(uuid)
                        .with_operation("shutdown"),
                    "activity shut down"
                );
            }
            Err(err) => self.publish_failure(uuid, ActivityState::ShutdownFailure, &err),
        }
    }

    fn status_activity(&self, uuid: &str) {
        if let Some(activity) = self.existing_live(uuid) {
            self.publish_current(&activity);
        }
    }

    fn configure_activity(&self, uuid: &str, update: &ConfigurationUpdate) {
        let Some(activity) = self.obtain_live(uuid) else {
            return;
        };
        match activity.update_configuration(update) {
            Ok(()) => debug!(uuid, entries = update.len(), "configuration applied"),
            Err(err) => error!(uuid, error = %err, "configuration update failed"),
        }
    }

    fn clean_activity_tmp_data(&self, uuid: &str) {
        self.clean_activity_data(uuid, DataKind::Tmp);
    }

    fn clean_activity_permanent_data(&self, uuid: &str) {
        self.clean_activity_data(uuid, DataKind::Permanent);
    }

    fn shutdown_all_activities(&self) {
        for activity in self.registry.live_activities() {
            self.shutdown_activity(activity.uuid());
        }
    }

    fn shutdown_controller_container(&self) {
        let controller = self.identity.uuid();
        spc_info!(
            context = LogContext::new().with_controller(&controller),
            "controller shutdown requested"
        );
        self.shutdown_requested.notify_one();
    }

    fn clean_controller_tmp_data(&self) {
        self.clean_logged(&self.storage.controller_tmp_dir(), DataKind::Tmp);
    }

    fn clean_controller_permanent_data(&self) {
        self.clean_logged(&self.storage.controller_data_dir(), DataKind::Permanent);
    }

    fn clean_activities_tmp_data(&self) {
        self.clean_all_activities_data(DataKind::Tmp);
    }

    fn clean_activities_permanent_data(&self) {
        self.clean_all_activities_data(DataKind::Permanent);
    }

    fn capture_controller_data(&self, transfer_uri: &str) {
        let activities: Vec<String> = self
            .registry
            .all_installed()
            .into_iter()
            .map(|installed| installed.uuid)
            .collect();
        let outcome = self.data_bundles.capture(transfer_uri, &activities);
        self.publish_data_transfer(ControllerStatusKind::DataCapture, transfer_uri, outcome);
    }

    fn restore_controller_data(&self, transfer_uri: &str) {
        let (running, idle): (Vec<String>, Vec<String>) = self
            .registry
            .all_installed()
            .into_iter()
            .map(|installed| installed.uuid)
            .partition(|uuid| self.activity_is_running(uuid));
        for uuid in &running {
            warn!(uuid = %uuid, "not restoring data of a running activity");
        }
        let outcome = self.data_bundles.restore(transfer_uri, &idle);
        self.publish_data_transfer(ControllerStatusKind::DataRestore, transfer_uri, outcome);
    }

    fn installed_activities(&self) -> Vec<InstalledActivity> {
        self.registry.all_installed()
    }

    fn live_activity(&self, uuid: &str) -> Option<Arc<dyn LiveActivity>> {
        self.registry.live(uuid)
    }
}

impl ActivityWatcherListener for StandardController {
    fn on_activity_status_change(
        &self,
        activity: &Arc<dyn LiveActivity>,
        _old_status: &ActivityStatus,
        new_status: &ActivityStatus,
    ) {
        self.publisher
            .publish_activity_status(activity.uuid(), new_status);
    }

    fn on_activity_error(
        &self,
        activity: &Arc<dyn LiveActivity>,
        old_status: &ActivityStatus,
        new_status: &ActivityStatus,
    ) {
        let controller = self.identity.uuid();
        spc_warn!(
            context = LogContext::new()
                .with_controller(&controller)
                .with_activity(activity.uuid()),
            "activity moved from {} to {}",
            old_status.state,
            new_status.state
        );
        self.publisher
            .publish_activity_status(activity.uuid(), new_status);
        if old_status.state == ActivityState::StartupAttempt
            && new_status.state == ActivityState::StartupFailure
        {
            activity.handle_startup_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use spc_activity::{SimulatedActivity, SimulatedActivityFactory};
    use spc_msg::{InMemoryTransport, MessagePayload, MessagingSupervisor, Transport, WireStatusCode};

    use super::*;

    struct Fixture {
        controller: StandardController,
        registry: Arc<ActivityRegistry>,
        watcher: Arc<ActivityStatusWatcher>,
        transport: Arc<InMemoryTransport>,
        root: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempfile::tempdir().expect("tempdir");
            let transport = Arc::new(InMemoryTransport::new());
            let mut messaging = MessagingSupervisor::new();
            messaging.register_transport(transport.clone());
            let identity = ControllerIdentity::new(ControllerInfo {
                uuid: "ctrl-1".into(),
                name: "lobby".into(),
                description: String::new(),
                host_id: "lobby-01".into(),
            });
            let publisher = StatusPublisher::new(Arc::new(messaging), identity);
            let registry = Arc::new(ActivityRegistry::new());
            let watcher = Arc::new(ActivityStatusWatcher::new());
            let controller = StandardController::new(
                registry.clone(),
                Arc::new(SimulatedActivityFactory),
                watcher.clone(),
                publisher,
                StorageConfig::with_root(root.path()),
            );
            Self {
                controller,
                registry,
                watcher,
                transport,
                root,
            }
        }

        fn install(&self, uuid: &str) {
            self.registry
                .register(InstalledActivity::new(uuid, "demo", "1.0.0", Utc::now()));
        }

        fn statuses(&self) -> Vec<(String, i32)> {
            self.transport
                .drain()
                .into_iter()
                .filter_map(|message| match message.payload {
                    MessagePayload::ActivityStatus(frame) => Some((frame.uuid, frame.status)),
                    _ => None,
                })
                .collect()
        }

        fn state_of(&self, uuid: &str) -> ActivityState {
            self.registry
                .live(uuid)
                .expect("live instance")
                .activity_status()
                .expect("status")
                .state
        }
    }

    fn code(state: ActivityState) -> i32 {
        WireStatusCode::translate(state).code()
    }

    #[test]
    fn startup_creates_watches_and_reports_running() {
        let fixture = Fixture::new();
        fixture.install("abc");
        fixture.controller.startup_activity("abc");

        assert_eq!(fixture.state_of("abc"), ActivityState::Running);
        assert_eq!(fixture.watcher.watched_count(), 1);
        assert_eq!(
            fixture.statuses(),
            vec![("abc".to_owned(), code(ActivityState::Running))]
        );

        fixture.controller.startup_activity("abc");
        assert_eq!(fixture.watcher.watched_count(), 1);
        assert_eq!(
            fixture.statuses(),
            vec![("abc".to_owned(), code(ActivityState::Running))]
        );
    }

    #[test]
    fn requests_for_unknown_activities_report_doesnt_exist() {
        let fixture = Fixture::new();
        fixture.controller.startup_activity("nope");
        fixture.controller.status_activity("nope");
        fixture.controller.shutdown_activity("nope");
        let statuses = fixture.statuses();
        assert_eq!(statuses.len(), 3);
        assert!(statuses
            .iter()
            .all(|(uuid, status)| uuid == "nope" && *status == code(ActivityState::DoesntExist)));
    }

    #[test]
    fn installed_without_instance_reports_ready() {
        let fixture = Fixture::new();
        fixture.install("xyz");
        fixture.controller.status_activity("xyz");
        fixture.controller.shutdown_activity("xyz");
        assert_eq!(
            fixture.statuses(),
            vec![
                ("xyz".to_owned(), code(ActivityState::Ready)),
                ("xyz".to_owned(), code(ActivityState::Ready)),
            ]
        );
        assert!(fixture.registry.live("xyz").is_none());
    }

    #[test]
    fn activate_from_ready_starts_first() {
        let fixture = Fixture::new();
        fixture.install("abc");
        fixture.controller.activate_activity("abc");
        assert_eq!(fixture.state_of("abc"), ActivityState::Active);
        assert_eq!(
            fixture.statuses(),
            vec![
                ("abc".to_owned(), code(ActivityState::Running)),
                ("abc".to_owned(), code(ActivityState::Active)),
            ]
        );

        fixture.controller.activate_activity("abc");
        assert_eq!(
            fixture.statuses(),
            vec![("abc".to_owned(), code(ActivityState::Active))]
        );
    }

    #[test]
    fn deactivate_requires_active() {
        let fixture = Fixture::new();
        fixture.install("abc");
        fixture.controller.startup_activity("abc");
        fixture.statuses();

        fixture.controller.deactivate_activity("abc");
        assert!(fixture.statuses().is_empty());
        assert_eq!(fixture.state_of("abc"), ActivityState::Running);

        fixture.controller.activate_activity("abc");
        fixture.controller.deactivate_activity("abc");
        assert_eq!(fixture.state_of("abc"), ActivityState::Running);
    }

    #[test]
    fn shutdown_detaches_the_instance() {
        let fixture = Fixture::new();
        fixture.install("abc");
        fixture.controller.startup_activity("abc");
        fixture.statuses();

        fixture.controller.shutdown_activity("abc");
        assert_eq!(
            fixture.statuses(),
            vec![("abc".to_owned(), code(ActivityState::Ready))]
        );
        assert!(fixture.registry.live("abc").is_none());
        assert!(fixture.registry.installed("abc").is_some());
        assert_eq!(fixture.watcher.watched_count(), 0);
    }

    #[test]
    fn failed_startup_publishes_failure_and_recovers() {
        let fixture = Fixture::new();
        fixture.install("abc");
        let activity = Arc::new(SimulatedActivity::new("abc"));
        activity.fail_next_startup("missing asset");
        fixture
            .registry
            .attach_live(activity.clone())
            .expect("installed");

        fixture.controller.startup_activity("abc");
        let messages = fixture.transport.drain();
        let detail = messages.iter().find_map(|message| match &message.payload {
            MessagePayload::ActivityStatus(frame)
                if frame.status == code(ActivityState::StartupFailure) =>
            {
                frame.status_detail.clone()
            }
            _ => None,
        });
        assert!(detail.expect("failure detail").contains("missing asset"));
        assert_eq!(fixture.state_of("abc"), ActivityState::Ready);
    }

    #[test]
    fn configure_creates_instance_and_applies_update() {
        let fixture = Fixture::new();
        fixture.install("abc");
        let activity = Arc::new(SimulatedActivity::new("abc"));
        fixture
            .registry
            .attach_live(activity.clone())
            .expect("installed");
        let mut update = ConfigurationUpdate::new();
        update.insert("volume".into(), "7".into());
        fixture.controller.configure_activity("abc", &update);
        assert_eq!(activity.configuration(), update);
    }

    #[test]
    fn shutdown_all_stops_every_live_activity() {
        let fixture = Fixture::new();
        fixture.install("abc");
        fixture.install("def");
        fixture.controller.startup_activity("abc");
        fixture.controller.activate_activity("def");
        fixture.controller.shutdown_all_activities();
        assert!(fixture.registry.live_activities().is_empty());
    }

    #[test]
    fn autostart_honours_startup_type() {
        let fixture = Fixture::new();
        for (uuid, startup_type) in [
            ("idle", StartupType::Ready),
            ("run", StartupType::Startup),
            ("show", StartupType::Activate),
        ] {
            let mut installed = InstalledActivity::new(uuid, "demo", "1.0.0", Utc::now());
            installed.startup_type = startup_type;
            fixture.registry.register(installed);
        }
        fixture.controller.autostart();
        assert!(fixture.registry.live("idle").is_none());
        assert_eq!(fixture.state_of("run"), ActivityState::Running);
        assert_eq!(fixture.state_of("show"), ActivityState::Active);
    }

    #[test]
    fn clean_refuses_running_activity() {
        let fixture = Fixture::new();
        fixture.install("abc");
        let storage = StorageConfig::with_root(fixture.root.path());
        let tmp = storage.activity_tmp_dir("abc");
        fs::create_dir_all(tmp.join("cache")).expect("mkdir");
        fs::write(tmp.join("scratch.bin"), b"x").expect("write");

        fixture.controller.startup_activity("abc");
        fixture.controller.clean_activity_tmp_data("abc");
        assert!(tmp.join("scratch.bin").exists());

        fixture.controller.shutdown_activity("abc");
        fixture.controller.clean_activity_tmp_data("abc");
        assert!(tmp.is_dir());
        assert_eq!(fs::read_dir(&tmp).expect("read").count(), 0);
    }

    #[test]
    fn controller_clean_keeps_directory() {
        let fixture = Fixture::new();
        let storage = StorageConfig::with_root(fixture.root.path());
        let data = storage.controller_data_dir();
        fs::create_dir_all(&data).expect("mkdir");
        fs::write(data.join("state.json"), b"{}").expect("write");
        fixture.controller.clean_controller_permanent_data();
        assert!(data.is_dir());
        assert!(!data.join("state.json").exists());

        fixture.controller.clean_controller_tmp_data();
    }

    #[test]
    fn startup_failure_transition_triggers_cleanup() {
        let fixture = Fixture::new();
        let activity = Arc::new(SimulatedActivity::new("abc"));
        activity.set_status(ActivityStatus::new(ActivityState::StartupFailure));
        let live: Arc<dyn LiveActivity> = activity.clone();
        fixture.controller.on_activity_error(
            &live,
            &ActivityStatus::new(ActivityState::StartupAttempt),
            &ActivityStatus::new(ActivityState::StartupFailure),
        );
        assert_eq!(
            activity.activity_status().expect("status").state,
            ActivityState::Ready
        );
        assert_eq!(
            fixture.statuses(),
            vec![("abc".to_owned(), code(ActivityState::StartupFailure))]
        );
    }

    fn data_transfer(fixture: &Fixture) -> DataTransferResult {
        match fixture.transport.recv().map(|message| message.payload) {
            Some(MessagePayload::ControllerStatus(frame)) => {
                serde_json::from_slice(&frame.data.expect("body")).expect("decode")
            }
            other => panic!("expected data status, got {other:?}"),
        }
    }

    #[test]
    fn capture_publishes_result_with_fault_detail() {
        let fixture = Fixture::new();
        fixture.install("abc");
        let storage = StorageConfig::with_root(fixture.root.path());
        fs::create_dir_all(storage.controller_data_dir()).expect("mkdir");
        fs::write(storage.controller_data_dir().join("state.json"), b"{}").expect("write");
        let bundle = fixture.root.path().join("bundle");
        let target = bundle.to_str().expect("utf8 path");

        fixture.controller.capture_controller_data(target);
        let captured = data_transfer(&fixture);
        assert_eq!(captured.status, DataTransferStatus::Success);
        assert!(captured.status_detail.is_none());
        assert!(bundle.join("controller/state.json").is_file());

        fixture.controller.capture_controller_data("ftp://master/bundle");
        let failed = data_transfer(&fixture);
        assert_eq!(failed.status, DataTransferStatus::Failure);
        assert!(failed.status_detail.expect("detail").contains("ftp"));
    }

    #[test]
    fn restore_leaves_running_activity_data_alone() {
        let fixture = Fixture::new();
        fixture.install("abc");
        fixture.install("def");
        let storage = StorageConfig::with_root(fixture.root.path());
        let bundle = fixture.root.path().join("bundle");
        for uuid in ["abc", "def"] {
            let section = bundle.join("activity").join(uuid);
            fs::create_dir_all(&section).expect("mkdir");
            fs::write(section.join("scores.txt"), b"restored").expect("write");
            fs::create_dir_all(storage.activity_data_dir(uuid)).expect("mkdir");
            fs::write(storage.activity_data_dir(uuid).join("scores.txt"), b"live").expect("write");
        }
        fixture.controller.startup_activity("abc");
        fixture.transport.drain();

        fixture
            .controller
            .restore_controller_data(bundle.to_str().expect("utf8 path"));
        assert_eq!(data_transfer(&fixture).status, DataTransferStatus::Success);
        assert_eq!(
            fs::read(storage.activity_data_dir("abc").join("scores.txt")).expect("read"),
            b"live"
        );
        assert_eq!(
            fs::read(storage.activity_data_dir("def").join("scores.txt")).expect("read"),
            b"restored"
        );
    }

    #[tokio::test]
    async fn container_shutdown_notifies_waiter() {
        let fixture = Fixture::new();
        let signal = fixture.controller.shutdown_signal();
        fixture.controller.shutdown_controller_container();
        tokio::time::timeout(std::time::Duration::from_secs(1), signal.notified())
            .await
            .expect("shutdown signalled");
    }
}
