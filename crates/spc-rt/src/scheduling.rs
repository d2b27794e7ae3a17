//! ---
//! spc_section: "05-runtime"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Runtime helpers supporting the controller."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error};

/// Simple async rate limiter that ensures deterministic loop intervals.
#[derive(Debug)]
pub struct RateLimiter {
    interval: tokio::time::Interval,
}

impl RateLimiter {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

/// Background task that runs a job once per period until shutdown.
///
/// The shutdown signal is only observed between runs: a job that is in
/// progress when shutdown arrives completes, and no further run starts.
#[derive(Debug)]
pub struct PeriodicTask {
    name: String,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn `job` on the current tokio runtime. The first run happens immediately.
    pub fn spawn<F, Fut>(
        name: impl Into<String>,
        period: Duration,
        mut shutdown: broadcast::Receiver<()>,
        mut job: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let mut limiter = RateLimiter::new(period);
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        debug!(task = %task_name, "periodic task shutdown signal received");
                        break;
                    }
                    _ = limiter.tick() => {
                        job().await;
                    }
                }
            }
        });
        Self { name, handle }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to stop. Join errors are logged.
    pub async fn join(self) {
        if let Err(err) = self.handle.await {
            error!(task = %self.name, error = %err, "periodic task join error");
        }
    }
}
