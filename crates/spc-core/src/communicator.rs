//! ---
//! spc_section: "01-core-functionality"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Transport-facing side of the controller."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use spc_activity::ActivityStatus;
use spc_msg::requests::encode_payload;
use spc_msg::{
    ActivityRuntimeRequest, ActivityStatusFrame, ControllerRequest, ControllerStatusFrame,
    ControllerStatusKind, DataTransferResult, DeletionResult, DeploymentResult, FullControllerStatus, Message,
    MessagePayload, MessagingMetrics, MessagingSupervisor, WireStatusCode,
};
use spc_rt::PeriodicTask;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::dispatcher::LifecycleDispatcher;
use crate::error::panic_message;
use crate::identity::ControllerIdentity;

/// Publishes controller and activity statuses on behalf of this controller.
///
/// Publish faults are logged and swallowed so one failed report never holds
/// up the request that produced it.
#[derive(Clone)]
pub struct StatusPublisher {
    messaging: Arc<MessagingSupervisor>,
    identity: ControllerIdentity,
}

impl StatusPublisher {
    pub fn new(messaging: Arc<MessagingSupervisor>, identity: ControllerIdentity) -> Self {
        Self {
            messaging,
            identity,
        }
    }

    pub fn identity(&self) -> &ControllerIdentity {
        &self.identity
    }

    fn publish(&self, payload: MessagePayload) {
        let kind = payload.kind();
        if let Err(err) = self.messaging.publish(payload) {
            warn!(kind, error = %err, "status publish failed");
        }
    }

    pub fn publish_activity_status(&self, uuid: &str, status: &ActivityStatus) {
        let code = WireStatusCode::translate(status.state);
        debug!(uuid, state = %status.state, code = code.code(), "publishing activity status");
        self.publish(MessagePayload::ActivityStatus(ActivityStatusFrame {
            uuid: uuid.to_owned(),
            status: code.code(),
            status_detail: status.reported_detail().map(str::to_owned),
        }));
    }

    pub fn publish_controller_status(&self, kind: ControllerStatusKind, data: Option<Vec<u8>>) {
        self.publish(MessagePayload::ControllerStatus(ControllerStatusFrame {
            uuid: self.identity.uuid(),
            status: kind,
            data,
        }));
    }

    fn publish_controller_body<T: Serialize>(&self, kind: ControllerStatusKind, body: &T) {
        match encode_payload(body) {
            Ok(data) => self.publish_controller_status(kind, Some(data)),
            Err(err) => warn!(kind = ?kind, error = %err, "could not encode controller status"),
        }
    }

    pub fn publish_heartbeat(&self) {
        self.publish_controller_status(ControllerStatusKind::Heartbeat, None);
    }

    pub fn publish_full_status(&self, status: &FullControllerStatus) {
        self.publish_controller_body(ControllerStatusKind::Full, status);
    }

    pub fn publish_deployment_result(&self, result: &DeploymentResult) {
        self.publish_controller_body(ControllerStatusKind::ActivityInstall, result);
    }

    pub fn publish_deletion_result(&self, result: &DeletionResult) {
        self.publish_controller_body(ControllerStatusKind::ActivityDelete, result);
    }

    /// `kind` is [`ControllerStatusKind::DataCapture`] or [`ControllerStatusKind::DataRestore`].
    pub fn publish_data_transfer_result(
        &self,
        kind: ControllerStatusKind,
        result: &DataTransferResult,
    ) {
        self.publish_controller_body(kind, result);
    }
}

/// Run one dispatch, logging a panic instead of losing it in a dropped task handle.
fn dispatch_isolated(kind: &'static str, dispatch: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(dispatch)) {
        error!(kind, panic = %panic_message(payload.as_ref()), "request handling panicked");
    }
}

/// Bridges the message transport and the lifecycle dispatcher.
pub struct ControllerCommunicator {
    messaging: Arc<MessagingSupervisor>,
    publisher: StatusPublisher,
    dispatcher: Arc<LifecycleDispatcher>,
}

impl ControllerCommunicator {
    pub fn new(
        messaging: Arc<MessagingSupervisor>,
        publisher: StatusPublisher,
        dispatcher: Arc<LifecycleDispatcher>,
    ) -> Self {
        Self {
            messaging,
            publisher,
            dispatcher,
        }
    }

    pub fn publisher(&self) -> &StatusPublisher {
        &self.publisher
    }

    pub fn metrics(&self) -> MessagingMetrics {
        self.messaging.metrics()
    }

    pub fn publish_activity_status(&self, uuid: &str, status: &ActivityStatus) {
        self.publisher.publish_activity_status(uuid, status);
    }

    pub fn publish_controller_status(&self, kind: ControllerStatusKind, data: Option<Vec<u8>>) {
        self.publisher.publish_controller_status(kind, data);
    }

    /// Decode one inbound message and dispatch it on a blocking task.
    ///
    /// Malformed requests are logged and dropped. Must be called from within
    /// a tokio runtime.
    pub fn handle_message(&self, message: Message) -> Option<JoinHandle<()>> {
        let kind = message.kind();
        match message.payload {
            MessagePayload::ControllerRequest(frame) => match ControllerRequest::decode(&frame) {
                Ok(request) => {
                    trace!(message_id = %message.id, request = ?request, "controller request");
                    let dispatcher = Arc::clone(&self.dispatcher);
                    Some(tokio::task::spawn_blocking(move || {
                        dispatch_isolated(kind, || dispatcher.dispatch_controller_request(request))
                    }))
                }
                Err(err) => {
                    warn!(message_id = %message.id, operation = frame.operation, error = %err, "dropping malformed controller request");
                    None
                }
            },
            MessagePayload::ActivityRequest(frame) => {
                match ActivityRuntimeRequest::decode(&frame) {
                    Ok(request) => {
                        trace!(message_id = %message.id, uuid = %request.uuid, operation = request.operation.name(), "activity request");
                        let dispatcher = Arc::clone(&self.dispatcher);
                        Some(tokio::task::spawn_blocking(move || {
                            dispatch_isolated(kind, || dispatcher.dispatch_activity_request(request))
                        }))
                    }
                    Err(err) => {
                        warn!(message_id = %message.id, operation = frame.operation, error = %err, "dropping malformed activity request");
                        None
                    }
                }
            }
            MessagePayload::ControllerStatus(_) | MessagePayload::ActivityStatus(_) => {
                debug!(message_id = %message.id, kind, "ignoring status message on the request channel");
                None
            }
        }
    }

    /// Drain the transports and dispatch every request found.
    pub fn poll_inbound(&self) -> Vec<JoinHandle<()>> {
        self.messaging
            .poll()
            .into_iter()
            .filter_map(|message| self.handle_message(message))
            .collect()
    }

    /// Publish a heartbeat every `period` until shutdown.
    ///
    /// The controller uuid is read on every tick.
    pub fn spawn_heartbeat(
        &self,
        period: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> PeriodicTask {
        let publisher = self.publisher.clone();
        PeriodicTask::spawn("heartbeat", period, shutdown, move || {
            let publisher = publisher.clone();
            async move {
                publisher.publish_heartbeat();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use spc_activity::ActivityState;
    use spc_msg::{ControllerRequestFrame, InMemoryTransport, Transport};

    use super::*;
    use crate::identity::ControllerInfo;

    fn publisher_with_transport() -> (StatusPublisher, Arc<InMemoryTransport>) {
        let transport = Arc::new(InMemoryTransport::new());
        let mut messaging = MessagingSupervisor::new();
        messaging.register_transport(transport.clone());
        let identity = ControllerIdentity::new(ControllerInfo {
            uuid: "ctrl-1".into(),
            name: "lobby".into(),
            description: String::new(),
            host_id: "lobby-01".into(),
        });
        (StatusPublisher::new(Arc::new(messaging), identity), transport)
    }

    #[test]
    fn activity_status_uses_wire_code_and_detail() {
        let (publisher, transport) = publisher_with_transport();
        let status = ActivityStatus::with_description(ActivityState::Crashed, "gone")
            .with_detail("stack trace");
        publisher.publish_activity_status("abc", &status);
        match transport.recv().map(|message| message.payload) {
            Some(MessagePayload::ActivityStatus(frame)) => {
                assert_eq!(frame.uuid, "abc");
                assert_eq!(frame.status, WireStatusCode::Crashed.code());
                assert_eq!(frame.status_detail.as_deref(), Some("stack trace"));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn deployment_result_is_wrapped_in_install_status() {
        let (publisher, transport) = publisher_with_transport();
        publisher.publish_deployment_result(&DeploymentResult {
            uuid: "abc".into(),
            status: spc_msg::DeploymentStatus::Success,
            installed_at: Some(chrono::Utc::now()),
        });
        match transport.recv().map(|message| message.payload) {
            Some(MessagePayload::ControllerStatus(frame)) => {
                assert_eq!(frame.uuid, "ctrl-1");
                assert_eq!(frame.status, ControllerStatusKind::ActivityInstall);
                let body: DeploymentResult =
                    serde_json::from_slice(&frame.data.expect("data")).expect("decode");
                assert_eq!(body.uuid, "abc");
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn heartbeat_rereads_uuid_each_tick() {
        let (publisher, transport) = publisher_with_transport();
        let identity = publisher.identity().clone();
        let (dispatcher, _recorder) =
            crate::dispatcher::tests::dispatcher_with_recorder(publisher.clone());
        let communicator =
            ControllerCommunicator::new(Arc::new(MessagingSupervisor::new()), publisher, dispatcher);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let heartbeat = communicator.spawn_heartbeat(Duration::from_millis(20), shutdown_rx);
        tokio::time::sleep(Duration::from_millis(30)).await;
        identity.set_uuid("ctrl-2");
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).expect("heartbeat subscribed");
        heartbeat.join().await;

        let uuids: Vec<String> = transport
            .drain()
            .into_iter()
            .filter_map(|message| match message.payload {
                MessagePayload::ControllerStatus(frame)
                    if frame.status == ControllerStatusKind::Heartbeat =>
                {
                    Some(frame.uuid)
                }
                _ => None,
            })
            .collect();
        assert!(uuids.len() >= 3, "expected several heartbeats, saw {uuids:?}");
        assert_eq!(uuids.first().map(String::as_str), Some("ctrl-1"));
        assert_eq!(uuids.last().map(String::as_str), Some("ctrl-2"));
    }

    #[tokio::test]
    async fn panicking_dispatch_still_completes_its_task() {
        let (publisher, _transport) = publisher_with_transport();
        let (dispatcher, recorder) =
            crate::dispatcher::tests::dispatcher_with_recorder(publisher.clone());
        recorder
            .panic_on_status
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let communicator =
            ControllerCommunicator::new(Arc::new(MessagingSupervisor::new()), publisher, dispatcher);

        let frame = ActivityRuntimeRequest::new("abc", spc_msg::ActivityOperation::Status)
            .to_frame()
            .expect("encode");
        let task = communicator
            .handle_message(Message::new(MessagePayload::ActivityRequest(frame)))
            .expect("dispatched");
        task.await.expect("panic contained in the task");
        assert_eq!(recorder.calls(), vec!["status:abc"]);
    }

    #[tokio::test]
    async fn malformed_and_status_messages_are_dropped() {
        let (publisher, _transport) = publisher_with_transport();
        let (dispatcher, recorder) =
            crate::dispatcher::tests::dispatcher_with_recorder(publisher.clone());
        let communicator =
            ControllerCommunicator::new(Arc::new(MessagingSupervisor::new()), publisher, dispatcher);

        let malformed = Message::new(MessagePayload::ControllerRequest(ControllerRequestFrame {
            operation: ControllerRequest::DEPLOY_LIVE_ACTIVITY,
            payload: Some(b"{\"uuid\":".to_vec()),
        }));
        assert!(communicator.handle_message(malformed).is_none());

        let echo = Message::new(MessagePayload::ActivityStatus(ActivityStatusFrame {
            uuid: "abc".into(),
            status: 3,
            status_detail: None,
        }));
        assert!(communicator.handle_message(echo).is_none());
        assert!(recorder.calls().is_empty());
    }
}
