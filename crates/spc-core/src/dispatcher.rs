//! ---
//! spc_section: "01-core-functionality"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Routes decoded requests to controller operations."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::sync::Arc;

use spc_activity::{
    ActivityState, ActivityStatus, ConfigurationUpdate, InstalledActivity, LiveActivity,
};
use spc_msg::{
    ActivityOperation, ActivityRuntimeRequest, ControllerRequest, DeletionRequest,
    DeploymentRequest, DeploymentResult, DeploymentStatus, FullControllerStatus,
    LiveActivityStatusReport, WireStatusCode,
};
use tracing::{debug, warn};

use crate::communicator::StatusPublisher;
use crate::deployment::{DeletionOutcome, DeletionReport, DeploymentExecutor};

/// Lifecycle operations a space controller exposes to remote requests.
///
/// Operations report their outcome by publishing statuses rather than by
/// returning them.
pub trait ControllerControl: Send + Sync {
    fn startup_activity(&self, uuid: &str);
    fn activate_activity(&self, uuid: &str);
    fn deactivate_activity(&self, uuid: &str);
    fn shutdown_activity(&self, uuid: &str);
    fn status_activity(&self, uuid: &str);
    fn configure_activity(&self, uuid: &str, update: &ConfigurationUpdate);
    fn clean_activity_tmp_data(&self, uuid: &str);
    fn clean_activity_permanent_data(&self, uuid: &str);

    fn shutdown_all_activities(&self);
    fn shutdown_controller_container(&self);
    fn clean_controller_tmp_data(&self);
    fn clean_controller_permanent_data(&self);
    fn clean_activities_tmp_data(&self);
    fn clean_activities_permanent_data(&self);
    fn capture_controller_data(&self, transfer_uri: &str);
    fn restore_controller_data(&self, transfer_uri: &str);

    fn installed_activities(&self) -> Vec<InstalledActivity>;
    fn live_activity(&self, uuid: &str) -> Option<Arc<dyn LiveActivity>>;
}

/// Single entry point for decoded controller and activity requests.
pub struct LifecycleDispatcher {
    control: Arc<dyn ControllerControl>,
    executor: DeploymentExecutor,
    publisher: StatusPublisher,
}

impl LifecycleDispatcher {
    pub fn new(
        control: Arc<dyn ControllerControl>,
        executor: DeploymentExecutor,
        publisher: StatusPublisher,
    ) -> Self {
        Self {
            control,
            executor,
            publisher,
        }
    }

    pub fn dispatch_controller_request(&self, request: ControllerRequest) {
        match request {
            ControllerRequest::Status => {
                self.publisher.publish_full_status(&self.full_status());
            }
            ControllerRequest::ShutdownActivities => self.control.shutdown_all_activities(),
            ControllerRequest::ShutdownController => self.control.shutdown_controller_container(),
            ControllerRequest::DeployLiveActivity(deploy) => self.deploy(&deploy),
            ControllerRequest::DeleteLiveActivity(delete) => self.delete(&delete),
            ControllerRequest::CleanDataTmp => self.control.clean_controller_tmp_data(),
            ControllerRequest::CleanDataPermanent => self.control.clean_controller_permanent_data(),
            ControllerRequest::CleanDataTmpActivities => self.control.clean_activities_tmp_data(),
            ControllerRequest::CleanDataPermanentActivities => {
                self.control.clean_activities_permanent_data()
            }
            ControllerRequest::CaptureData(request) => {
                self.control.capture_controller_data(&request.transfer_uri)
            }
            ControllerRequest::RestoreData(request) => {
                self.control.restore_controller_data(&request.transfer_uri)
            }
            ControllerRequest::Unknown(operation) => {
                warn!(operation, "unknown controller request; ignoring");
            }
        }
    }

    /// Shut down the live instance of `uuid`, if there is one.
    ///
    /// Returns `false` when an instance is still live afterwards.
    fn stop_live_instance(&self, uuid: &str) -> bool {
        if self.control.live_activity(uuid).is_none() {
            return true;
        }
        debug!(uuid, "shutting down live instance before changing its install");
        self.control.shutdown_activity(uuid);
        self.control.live_activity(uuid).is_none()
    }

    fn deploy(&self, request: &DeploymentRequest) {
        let result = if self.stop_live_instance(&request.uuid) {
            self.executor.deploy(request)
        } else {
            warn!(uuid = %request.uuid, "live activity did not shut down; deployment refused");
            DeploymentResult {
                uuid: request.uuid.clone(),
                status: DeploymentStatus::FailureCopy,
                installed_at: None,
            }
        };
        self.publisher.publish_deployment_result(&result);
    }

    fn delete(&self, request: &DeletionRequest) {
        let report = if self.stop_live_instance(&request.uuid) {
            self.executor.delete(request)
        } else {
            warn!(uuid = %request.uuid, "live activity did not shut down; deletion refused");
            DeletionReport::refused(
                &request.uuid,
                format!("live activity {} is still running", request.uuid),
            )
        };
        self.publisher.publish_deletion_result(&report.result);
        if report.outcome == DeletionOutcome::NotInstalled {
            self.publisher.publish_activity_status(
                &request.uuid,
                &ActivityStatus::new(ActivityState::DoesntExist),
            );
        }
    }

    pub fn dispatch_activity_request(&self, request: ActivityRuntimeRequest) {
        let uuid = request.uuid.as_str();
        match request.operation {
            ActivityOperation::Startup => self.control.startup_activity(uuid),
            ActivityOperation::Activate => self.control.activate_activity(uuid),
            ActivityOperation::Deactivate => self.control.deactivate_activity(uuid),
            ActivityOperation::Shutdown => self.control.shutdown_activity(uuid),
            ActivityOperation::Status => self.control.status_activity(uuid),
            ActivityOperation::Configure(configuration) => {
                let update = configuration.additions();
                let skipped = configuration.parameters.len() - update.len();
                if skipped > 0 {
                    debug!(uuid, skipped, "configuration entries other than ADD ignored");
                }
                self.control.configure_activity(uuid, &update);
            }
            ActivityOperation::CleanDataPermanent => self.control.clean_activity_permanent_data(uuid),
            ActivityOperation::CleanDataTmp => self.control.clean_activity_tmp_data(uuid),
            ActivityOperation::Unknown(operation) => {
                warn!(uuid, operation, "unknown activity request; ignoring");
            }
        }
    }

    /// Status of every installed activity.
    ///
    /// An installed activity without a live instance is reported as READY.
    pub fn full_status(&self) -> FullControllerStatus {
        let activities = self
            .control
            .installed_activities()
            .into_iter()
            .map(|installed| {
                let (code, status_detail) = match self.control.live_activity(&installed.uuid) {
                    None => {
                        debug!(uuid = %installed.uuid, "no live instance; reporting READY");
                        (WireStatusCode::Ready, None)
                    }
                    Some(activity) => match activity.activity_status() {
                        Ok(status) => (
                            WireStatusCode::translate(status.state),
                            status.reported_detail().map(str::to_owned),
                        ),
                        Err(err) => {
                            warn!(uuid = %installed.uuid, error = %err, "could not read live activity status");
                            (WireStatusCode::Unknown, Some(err.to_string()))
                        }
                    },
                };
                LiveActivityStatusReport {
                    uuid: installed.uuid,
                    status: code.code(),
                    status_detail,
                }
            })
            .collect();
        FullControllerStatus { activities }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use spc_activity::SimulatedActivity;
    use spc_msg::{
        ConfigurationOperation, ConfigurationParameter, ConfigurationRequest, ControllerStatusKind,
        DataTransferRequest, DeletionResult, DeletionStatus, InMemoryTransport, MessagePayload,
        MessagingSupervisor, Transport,
    };

    use super::*;
    use crate::deployment::ActivityInstaller;
    use crate::error::InstallError;
    use crate::identity::{ControllerIdentity, ControllerInfo};

    #[derive(Default)]
    pub(crate) struct RecordingControl {
        calls: Mutex<Vec<String>>,
        configurations: Mutex<Vec<ConfigurationUpdate>>,
        installed: Mutex<Vec<InstalledActivity>>,
        live: Mutex<HashMap<String, Arc<dyn LiveActivity>>>,
        stuck_on_shutdown: AtomicBool,
        pub(crate) panic_on_status: AtomicBool,
    }

    impl RecordingControl {
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().push(call.into());
        }
    }

    impl ControllerControl for RecordingControl {
        fn startup_activity(&self, uuid: &str) {
            self.record(format!("startup:{uuid}"));
        }
        fn activate_activity(&self, uuid: &str) {
            self.record(format!("activate:{uuid}"));
        }
        fn deactivate_activity(&self, uuid: &str) {
            self.record(format!("deactivate:{uuid}"));
        }
        fn shutdown_activity(&self, uuid: &str) {
            self.record(format!("shutdown:{uuid}"));
            if !self.stuck_on_shutdown.load(Ordering::SeqCst) {
                self.live.lock().remove(uuid);
            }
        }
        fn status_activity(&self, uuid: &str) {
            self.record(format!("status:{uuid}"));
            if self.panic_on_status.load(Ordering::SeqCst) {
                panic!("status handler exploded");
            }
        }
        fn configure_activity(&self, uuid: &str, update: &ConfigurationUpdate) {
            self.record(format!("configure:{uuid}"));
            self.configurations.lock().push(update.clone());
        }
        fn clean_activity_tmp_data(&self, uuid: &str) {
            self.record(format!("clean_tmp:{uuid}"));
        }
        fn clean_activity_permanent_data(&self, uuid: &str) {
            self.record(format!("clean_permanent:{uuid}"));
        }
        fn shutdown_all_activities(&self) {
            self.record("shutdown_all");
        }
        fn shutdown_controller_container(&self) {
            self.record("shutdown_controller");
        }
        fn clean_controller_tmp_data(&self) {
            self.record("clean_controller_tmp");
        }
        fn clean_controller_permanent_data(&self) {
            self.record("clean_controller_permanent");
        }
        fn clean_activities_tmp_data(&self) {
            self.record("clean_activities_tmp");
        }
        fn clean_activities_permanent_data(&self) {
            self.record("clean_activities_permanent");
        }
        fn capture_controller_data(&self, transfer_uri: &str) {
            self.record(format!("capture:{transfer_uri}"));
        }
        fn restore_controller_data(&self, transfer_uri: &str) {
            self.record(format!("restore:{transfer_uri}"));
        }
        fn installed_activities(&self) -> Vec<InstalledActivity> {
            self.installed.lock().clone()
        }
        fn live_activity(&self, uuid: &str) -> Option<Arc<dyn LiveActivity>> {
            self.live.lock().get(uuid).cloned()
        }
    }

    struct FixedInstaller {
        installed_at: DateTime<Utc>,
        installed: bool,
    }

    impl ActivityInstaller for FixedInstaller {
        fn copy_activity(&self, _uuid: &str, _source_uri: &str) -> Result<(), InstallError> {
            Ok(())
        }
        fn install_activity(
            &self,
            _uuid: &str,
            _identifying_name: &str,
            _version: &str,
        ) -> Result<DateTime<Utc>, InstallError> {
            Ok(self.installed_at)
        }
        fn remove_packed_activity(&self, _uuid: &str) -> Result<(), InstallError> {
            Ok(())
        }
        fn remove_activity(&self, _uuid: &str) -> Result<bool, InstallError> {
            Ok(self.installed)
        }
    }

    pub(crate) fn dispatcher_with_recorder(
        publisher: StatusPublisher,
    ) -> (Arc<LifecycleDispatcher>, Arc<RecordingControl>) {
        dispatcher_with_installer(publisher, true)
    }

    fn dispatcher_with_installer(
        publisher: StatusPublisher,
        installed: bool,
    ) -> (Arc<LifecycleDispatcher>, Arc<RecordingControl>) {
        let control = Arc::new(RecordingControl::default());
        let executor = DeploymentExecutor::new(Arc::new(FixedInstaller {
            installed_at: Utc::now(),
            installed,
        }));
        let dispatcher = Arc::new(LifecycleDispatcher::new(
            control.clone(),
            executor,
            publisher,
        ));
        (dispatcher, control)
    }

    fn setup() -> (
        Arc<LifecycleDispatcher>,
        Arc<RecordingControl>,
        Arc<InMemoryTransport>,
    ) {
        setup_with_installer(true)
    }

    fn setup_with_installer(
        installed: bool,
    ) -> (
        Arc<LifecycleDispatcher>,
        Arc<RecordingControl>,
        Arc<InMemoryTransport>,
    ) {
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
        let (dispatcher, control) = dispatcher_with_installer(publisher, installed);
        (dispatcher, control, transport)
    }

    fn controller_status(transport: &InMemoryTransport) -> (ControllerStatusKind, Vec<u8>) {
        match transport.recv().map(|message| message.payload) {
            Some(MessagePayload::ControllerStatus(frame)) => {
                (frame.status, frame.data.unwrap_or_default())
            }
            other => panic!("expected controller status, got {other:?}"),
        }
    }

    #[test]
    fn activity_operations_route_to_matching_control_calls() {
        let (dispatcher, control, _transport) = setup();
        for operation in [
            ActivityOperation::Startup,
            ActivityOperation::Activate,
            ActivityOperation::Deactivate,
            ActivityOperation::Shutdown,
            ActivityOperation::Status,
            ActivityOperation::CleanDataTmp,
            ActivityOperation::CleanDataPermanent,
        ] {
            dispatcher.dispatch_activity_request(ActivityRuntimeRequest::new("abc", operation));
        }
        assert_eq!(
            control.calls(),
            vec![
                "startup:abc",
                "activate:abc",
                "deactivate:abc",
                "shutdown:abc",
                "status:abc",
                "clean_tmp:abc",
                "clean_permanent:abc",
            ]
        );
    }

    #[test]
    fn controller_operations_route_to_matching_control_calls() {
        let (dispatcher, control, _transport) = setup();
        for request in [
            ControllerRequest::ShutdownActivities,
            ControllerRequest::ShutdownController,
            ControllerRequest::CleanDataTmp,
            ControllerRequest::CleanDataPermanent,
            ControllerRequest::CleanDataTmpActivities,
            ControllerRequest::CleanDataPermanentActivities,
            ControllerRequest::CaptureData(DataTransferRequest::new("file:///srv/b1")),
            ControllerRequest::RestoreData(DataTransferRequest::new("file:///srv/b1")),
        ] {
            dispatcher.dispatch_controller_request(request);
        }
        assert_eq!(
            control.calls(),
            vec![
                "shutdown_all",
                "shutdown_controller",
                "clean_controller_tmp",
                "clean_controller_permanent",
                "clean_activities_tmp",
                "clean_activities_permanent",
                "capture:file:///srv/b1",
                "restore:file:///srv/b1",
            ]
        );
    }

    #[test]
    fn unknown_requests_touch_nothing() {
        let (dispatcher, control, transport) = setup();
        dispatcher.dispatch_activity_request(ActivityRuntimeRequest::new(
            "abc",
            ActivityOperation::Unknown(99),
        ));
        dispatcher.dispatch_controller_request(ControllerRequest::Unknown(99));
        assert!(control.calls().is_empty());
        assert_eq!(transport.pending(), 0);
    }

    #[test]
    fn configure_applies_only_additions() {
        let (dispatcher, control, _transport) = setup();
        let configuration = ConfigurationRequest {
            parameters: vec![
                ConfigurationParameter {
                    operation: ConfigurationOperation::Add,
                    name: "volume".into(),
                    value: Some("7".into()),
                },
                ConfigurationParameter {
                    operation: ConfigurationOperation::Delete,
                    name: "brightness".into(),
                    value: None,
                },
            ],
        };
        dispatcher.dispatch_activity_request(ActivityRuntimeRequest::new(
            "abc",
            ActivityOperation::Configure(configuration),
        ));
        let configurations = control.configurations.lock().clone();
        assert_eq!(configurations.len(), 1);
        assert_eq!(configurations[0].len(), 1);
        assert_eq!(configurations[0].get("volume").map(String::as_str), Some("7"));
    }

    #[test]
    fn deploy_publishes_install_result() {
        let (dispatcher, _control, transport) = setup();
        dispatcher.dispatch_controller_request(ControllerRequest::DeployLiveActivity(
            DeploymentRequest {
                uuid: "abc".into(),
                source_uri: "file:///pkg.zip".into(),
                identifying_name: "demo".into(),
                version: "1.0.0".into(),
            },
        ));
        let (kind, data) = controller_status(&transport);
        assert_eq!(kind, ControllerStatusKind::ActivityInstall);
        let result: DeploymentResult = serde_json::from_slice(&data).expect("decode");
        assert_eq!(result.status, DeploymentStatus::Success);
        assert!(result.installed_at.is_some());
    }

    #[test]
    fn full_status_reports_missing_instance_as_ready() {
        let (dispatcher, control, transport) = setup();
        control
            .installed
            .lock()
            .push(InstalledActivity::new("xyz", "demo", "1.0.0", Utc::now()));
        control
            .installed
            .lock()
            .push(InstalledActivity::new("abc", "demo", "1.0.0", Utc::now()));
        let live = Arc::new(SimulatedActivity::new("abc"));
        live.set_status(ActivityStatus::with_description(ActivityState::Active, "showing"));
        control.live.lock().insert("abc".into(), live);

        dispatcher.dispatch_controller_request(ControllerRequest::Status);
        let (kind, data) = controller_status(&transport);
        assert_eq!(kind, ControllerStatusKind::Full);
        let status: FullControllerStatus = serde_json::from_slice(&data).expect("decode");
        assert_eq!(status.activities.len(), 2);
        assert_eq!(status.activities[0].uuid, "xyz");
        assert_eq!(status.activities[0].status, WireStatusCode::Ready.code());
        assert_eq!(status.activities[1].status, WireStatusCode::Active.code());
        assert_eq!(status.activities[1].status_detail.as_deref(), Some("showing"));
    }

    fn live(control: &RecordingControl, uuid: &str) {
        let activity = Arc::new(SimulatedActivity::new(uuid));
        activity.startup().expect("startup");
        control.live.lock().insert(uuid.into(), activity);
    }

    fn deletion_result(transport: &InMemoryTransport) -> DeletionResult {
        let (kind, data) = controller_status(transport);
        assert_eq!(kind, ControllerStatusKind::ActivityDelete);
        serde_json::from_slice(&data).expect("decode")
    }

    #[test]
    fn delete_of_missing_activity_also_reports_doesnt_exist() {
        let (dispatcher, _control, transport) = setup_with_installer(false);
        dispatcher.dispatch_controller_request(ControllerRequest::DeleteLiveActivity(
            DeletionRequest::new("ghost"),
        ));
        let result = deletion_result(&transport);
        assert_eq!(result.status, DeletionStatus::Failure);
        assert_eq!(
            result.status_detail.as_deref(),
            Some("live activity ghost is not installed")
        );
        match transport.recv().map(|message| message.payload) {
            Some(MessagePayload::ActivityStatus(frame)) => {
                assert_eq!(frame.uuid, "ghost");
                assert_eq!(frame.status, WireStatusCode::DoesntExist.code());
            }
            other => panic!("expected activity status, got {other:?}"),
        }
    }

    #[test]
    fn delete_shuts_down_live_instance_first() {
        let (dispatcher, control, transport) = setup();
        live(&control, "abc");
        dispatcher.dispatch_controller_request(ControllerRequest::DeleteLiveActivity(
            DeletionRequest::new("abc"),
        ));
        assert_eq!(control.calls(), vec!["shutdown:abc"]);
        let result = deletion_result(&transport);
        assert_eq!(result.status, DeletionStatus::Success);
        assert_eq!(transport.pending(), 0);
    }

    #[test]
    fn delete_is_refused_while_instance_stays_live() {
        let (dispatcher, control, transport) = setup();
        live(&control, "abc");
        control.stuck_on_shutdown.store(true, Ordering::SeqCst);
        dispatcher.dispatch_controller_request(ControllerRequest::DeleteLiveActivity(
            DeletionRequest::new("abc"),
        ));
        let result = deletion_result(&transport);
        assert_eq!(result.status, DeletionStatus::Failure);
        assert_eq!(
            result.status_detail.as_deref(),
            Some("live activity abc is still running")
        );
        assert!(control.live_activity("abc").is_some());
    }

    #[test]
    fn redeploy_shuts_down_live_instance_first() {
        let (dispatcher, control, transport) = setup();
        live(&control, "abc");
        let request = DeploymentRequest {
            uuid: "abc".into(),
            source_uri: "file:///pkg.zip".into(),
            identifying_name: "demo".into(),
            version: "1.0.1".into(),
        };
        dispatcher.dispatch_controller_request(ControllerRequest::DeployLiveActivity(
            request.clone(),
        ));
        assert_eq!(control.calls(), vec!["shutdown:abc"]);
        let (_, data) = controller_status(&transport);
        let result: DeploymentResult = serde_json::from_slice(&data).expect("decode");
        assert_eq!(result.status, DeploymentStatus::Success);

        live(&control, "abc");
        control.stuck_on_shutdown.store(true, Ordering::SeqCst);
        dispatcher.dispatch_controller_request(ControllerRequest::DeployLiveActivity(request));
        let (_, data) = controller_status(&transport);
        let result: DeploymentResult = serde_json::from_slice(&data).expect("decode");
        assert_eq!(result.status, DeploymentStatus::FailureCopy);
    }
}
