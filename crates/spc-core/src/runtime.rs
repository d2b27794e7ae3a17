//! ---
//! spc_section: "01-core-functionality"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Runtime wiring for the space controller."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::fs;
use std::sync::Arc;

use spc_activity::{ActivityFactory, ActivityRegistry, SimulatedActivityFactory};
use spc_common::AppConfig;
use spc_msg::{InMemoryTransport, MessagingSupervisor, Transport};
use spc_rt::PeriodicTask;
use tokio::sync::{broadcast, Notify};
use tracing::{error, info, warn};

use crate::communicator::{ControllerCommunicator, StatusPublisher};
use crate::controller::StandardController;
use crate::deployment::{DeploymentExecutor, FsActivityInstaller};
use crate::dispatcher::{ControllerControl, LifecycleDispatcher};
use crate::error::ControllerError;
use crate::identity::{ControllerIdentity, ControllerInfo};
use crate::watcher::ActivityStatusWatcher;

/// Builder for a running space controller.
pub struct SpaceControllerRuntime {
    config: AppConfig,
    factory: Arc<dyn ActivityFactory>,
    transports: Vec<Arc<dyn Transport>>,
}

impl SpaceControllerRuntime {
    /// Runtime over `config`, creating simulated live activities until a
    /// factory is supplied.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            factory: Arc::new(SimulatedActivityFactory),
            transports: Vec::new(),
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn ActivityFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Register an extra transport next to the in-memory one.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transports.push(transport);
        self
    }

    /// Wire the controller components and start the periodic tasks.
    pub async fn start(self) -> Result<RuntimeHandle, ControllerError> {
        let mut config = self.config;
        if let Some(generated) = config.ensure_controller_uuid() {
            info!(uuid = %generated, "no controller uuid configured; generated one");
        }
        config
            .validate()
            .map_err(|err| ControllerError::Config(format!("{err:#}")))?;

        let storage = config.storage.clone();
        for dir in [
            storage.activities_dir(),
            storage.staging_dir(),
            storage.controller_data_dir(),
            storage.controller_tmp_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|err| ControllerError::io(&dir, err))?;
        }

        let registry = Arc::new(ActivityRegistry::new());
        let loaded = registry.load_from_dir(&storage.activities_dir());
        info!(loaded, dir = %storage.activities_dir().display(), "installed activities loaded");

        let mut messaging = MessagingSupervisor::new();
        let master_endpoint = if config.transport.in_memory_enabled {
            let (controller_side, master_side) = InMemoryTransport::pair();
            messaging.register_transport(Arc::new(controller_side));
            Some(master_side)
        } else {
            None
        };
        for transport in self.transports {
            messaging.register_transport(transport);
        }
        if messaging.transport_count() == 0 {
            warn!("no transport registered; statuses will not leave this process");
        }
        let messaging = Arc::new(messaging);

        let identity = ControllerIdentity::new(ControllerInfo::from_config(&config.controller));
        let publisher = StatusPublisher::new(Arc::clone(&messaging), identity.clone());
        let watcher = Arc::new(ActivityStatusWatcher::new());
        let installer = Arc::new(FsActivityInstaller::new(storage.clone(), Arc::clone(&registry)));
        let executor = DeploymentExecutor::new(installer);
        let controller = Arc::new(StandardController::new(
            Arc::clone(&registry),
            self.factory,
            Arc::clone(&watcher),
            publisher.clone(),
            storage,
        ));
        watcher.add_listener(controller.clone());
        let dispatcher = Arc::new(LifecycleDispatcher::new(
            controller.clone(),
            executor,
            publisher.clone(),
        ));
        let communicator = Arc::new(ControllerCommunicator::new(
            messaging,
            publisher,
            dispatcher,
        ));

        {
            let controller = Arc::clone(&controller);
            if let Err(err) = tokio::task::spawn_blocking(move || controller.autostart()).await {
                error!(error = %err, "activity autostart panicked");
            }
        }

        let (shutdown_tx, _) = broadcast::channel(4);
        let mut tasks = Vec::new();

        let scan_watcher = Arc::clone(&watcher);
        tasks.push(PeriodicTask::spawn(
            "activity-watcher",
            config.watcher.scan_interval,
            shutdown_tx.subscribe(),
            move || {
                let watcher = Arc::clone(&scan_watcher);
                async move {
                    if let Err(err) = tokio::task::spawn_blocking(move || watcher.scan()).await {
                        error!(error = %err, "watcher scan task failed");
                    }
                }
            },
        ));

        tasks.push(communicator.spawn_heartbeat(config.heartbeat.interval, shutdown_tx.subscribe()));

        let poll_communicator = Arc::clone(&communicator);
        tasks.push(PeriodicTask::spawn(
            "inbound-poll",
            config.transport.poll_interval,
            shutdown_tx.subscribe(),
            move || {
                let communicator = Arc::clone(&poll_communicator);
                async move {
                    // Requests run detached; a slow deploy never stalls polling.
                    drop(communicator.poll_inbound());
                }
            },
        ));

        info!(
            uuid = %identity.uuid(),
            name = %identity.info().name,
            installed = registry.len(),
            "space controller started"
        );

        Ok(RuntimeHandle {
            shutdown: shutdown_tx,
            tasks,
            shutdown_requested: controller.shutdown_signal(),
            config: Arc::new(config),
            identity,
            registry,
            watcher,
            controller,
            communicator,
            master_endpoint,
        })
    }
}

/// Handle on a started controller.
pub struct RuntimeHandle {
    shutdown: broadcast::Sender<()>,
    tasks: Vec<PeriodicTask>,
    shutdown_requested: Arc<Notify>,
    config: Arc<AppConfig>,
    identity: ControllerIdentity,
    registry: Arc<ActivityRegistry>,
    watcher: Arc<ActivityStatusWatcher>,
    controller: Arc<StandardController>,
    communicator: Arc<ControllerCommunicator>,
    master_endpoint: Option<InMemoryTransport>,
}

impl RuntimeHandle {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn identity(&self) -> &ControllerIdentity {
        &self.identity
    }

    pub fn registry(&self) -> &Arc<ActivityRegistry> {
        &self.registry
    }

    pub fn watcher(&self) -> &Arc<ActivityStatusWatcher> {
        &self.watcher
    }

    pub fn controller(&self) -> &Arc<StandardController> {
        &self.controller
    }

    pub fn communicator(&self) -> &Arc<ControllerCommunicator> {
        &self.communicator
    }

    /// Master side of the in-memory transport, when it is enabled.
    pub fn master_endpoint(&self) -> Option<&InMemoryTransport> {
        self.master_endpoint.as_ref()
    }

    /// Resolves once a SHUTDOWN_CONTROLLER request has been handled.
    pub async fn shutdown_requested(&self) {
        self.shutdown_requested.notified().await;
    }

    /// Stop the periodic tasks, then shut down every live activity.
    ///
    /// A scan in progress is allowed to finish.
    pub async fn shutdown(self) -> Result<(), ControllerError> {
        let _ = self.shutdown.send(());
        for task in self.tasks {
            task.join().await;
        }
        let controller = Arc::clone(&self.controller);
        if let Err(err) =
            tokio::task::spawn_blocking(move || controller.shutdown_all_activities()).await
        {
            error!(error = %err, "activity shutdown panicked");
        }
        info!(uuid = %self.identity.uuid(), "space controller shutdown complete");
        Ok(())
    }
}
