//! ---
//! spc_section: "01-core-functionality"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Polling change detector over the watched live activities."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use spc_activity::{ActivityError, ActivityStatus, LiveActivity};
use tracing::{debug, error, warn};

use crate::error::panic_message;

/// Receives status transitions detected by the [`ActivityStatusWatcher`].
pub trait ActivityWatcherListener: Send + Sync {
    /// The activity moved to a state that is not an error.
    fn on_activity_status_change(
        &self,
        activity: &Arc<dyn LiveActivity>,
        old_status: &ActivityStatus,
        new_status: &ActivityStatus,
    );

    /// The activity moved to an error state.
    fn on_activity_error(
        &self,
        activity: &Arc<dyn LiveActivity>,
        old_status: &ActivityStatus,
        new_status: &ActivityStatus,
    );
}

/// Identity of a watched instance: the address of its shared allocation.
type ActivityKey = usize;

fn activity_key(activity: &Arc<dyn LiveActivity>) -> ActivityKey {
    Arc::as_ptr(activity) as *const () as usize
}

fn same_listener(a: &Arc<dyn ActivityWatcherListener>, b: &Arc<dyn ActivityWatcherListener>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[derive(Clone, Copy)]
enum Notification {
    StatusChange,
    Error,
}

struct WatchedActivityEntry {
    // Holding the instance keeps its address, and therefore its key, unique.
    _activity: Arc<dyn LiveActivity>,
    last_known_status: ActivityStatus,
}

/// Polls watched live activities and reports state transitions to listeners.
///
/// `scan` is meant to be driven by a single periodic task. Watching
/// activities and changing listeners is safe from any thread at any time;
/// such changes are picked up by the next scan.
#[derive(Default)]
pub struct ActivityStatusWatcher {
    activities: RwLock<Vec<Arc<dyn LiveActivity>>>,
    states: Mutex<HashMap<ActivityKey, WatchedActivityEntry>>,
    listeners: RwLock<Vec<Arc<dyn ActivityWatcherListener>>>,
}

impl ActivityStatusWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching an instance. Returns `false` if it was already watched.
    pub fn watch_activity(&self, activity: Arc<dyn LiveActivity>) -> bool {
        let mut activities = self.activities.write();
        let key = activity_key(&activity);
        if activities.iter().any(|watched| activity_key(watched) == key) {
            debug!(uuid = activity.uuid(), "live activity already watched");
            return false;
        }
        debug!(uuid = activity.uuid(), "watching live activity");
        activities.push(activity);
        true
    }

    pub fn is_watching(&self, activity: &Arc<dyn LiveActivity>) -> bool {
        let key = activity_key(activity);
        self.activities
            .read()
            .iter()
            .any(|watched| activity_key(watched) == key)
    }

    /// Stop watching an instance and forget its last known status.
    /// Returns `false` if it was not watched.
    pub fn unwatch_activity(&self, activity: &Arc<dyn LiveActivity>) -> bool {
        let key = activity_key(activity);
        let mut activities = self.activities.write();
        let before = activities.len();
        activities.retain(|watched| activity_key(watched) != key);
        self.states.lock().remove(&key);
        activities.len() != before
    }

    pub fn watched_count(&self) -> usize {
        self.activities.read().len()
    }

    pub fn add_listener(&self, listener: Arc<dyn ActivityWatcherListener>) {
        self.listeners.write().push(listener);
    }

    /// Remove a listener previously added. Returns `false` if it was not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn ActivityWatcherListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|registered| !same_listener(registered, listener));
        listeners.len() != before
    }

    /// Run one scan cycle over every watched activity.
    ///
    /// A fault while handling one activity is logged and does not affect the
    /// others.
    pub fn scan(&self) {
        let activities = self.activities.read().clone();
        if activities.is_empty() {
            return;
        }
        let listeners = self.listeners.read().clone();

        for activity in &activities {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.handle_activity(activity, &listeners)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(uuid = activity.uuid(), error = %err, "unable to read live activity status");
                }
                Err(payload) => {
                    error!(
                        uuid = activity.uuid(),
                        panic = %panic_message(payload.as_ref()),
                        "fault while checking live activity status"
                    );
                }
            }
        }
    }

    fn handle_activity(
        &self,
        activity: &Arc<dyn LiveActivity>,
        listeners: &[Arc<dyn ActivityWatcherListener>],
    ) -> Result<(), ActivityError> {
        let new_status = activity.activity_status()?;
        let key = activity_key(activity);

        let old_status = {
            let mut states = self.states.lock();
            let Some(entry) = states.get_mut(&key) else {
                debug!(uuid = activity.uuid(), state = %new_status.state, "first observation of live activity");
                states.insert(
                    key,
                    WatchedActivityEntry {
                        _activity: Arc::clone(activity),
                        last_known_status: new_status,
                    },
                );
                return Ok(());
            };
            if entry.last_known_status.state == new_status.state {
                return Ok(());
            }
            let old_status = std::mem::replace(&mut entry.last_known_status, new_status.clone());
            if !new_status.state.is_running() {
                states.remove(&key);
            }
            old_status
        };

        if !new_status.state.is_running() {
            debug!(uuid = activity.uuid(), state = %new_status.state, "live activity stopped running; no longer watched");
            self.activities
                .write()
                .retain(|watched| activity_key(watched) != key);
        }

        let notification = if new_status.state.is_error() {
            Notification::Error
        } else {
            Notification::StatusChange
        };
        debug!(
            uuid = activity.uuid(),
            from = %old_status.state,
            to = %new_status.state,
            "live activity status changed"
        );
        self.notify(listeners, activity, &old_status, &new_status, notification);
        Ok(())
    }

    fn notify(
        &self,
        listeners: &[Arc<dyn ActivityWatcherListener>],
        activity: &Arc<dyn LiveActivity>,
        old_status: &ActivityStatus,
        new_status: &ActivityStatus,
        notification: Notification,
    ) {
        for listener in listeners {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match notification {
                Notification::StatusChange => {
                    listener.on_activity_status_change(activity, old_status, new_status)
                }
                Notification::Error => listener.on_activity_error(activity, old_status, new_status),
            }));
            if let Err(payload) = outcome {
                error!(
                    uuid = activity.uuid(),
                    panic = %panic_message(payload.as_ref()),
                    "watcher listener failed"
                );
            }
        }
    }
}
