//! ---
//! spc_section: "04-messaging"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Fan-out publishing and polling across registered transports."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::logging::{log_message, MessageDirection};
use crate::{Message, MessagePayload, MessagingError, Result, Transport};

/// Snapshot of messaging counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MessagingMetrics {
    /// Number of messages successfully handed to transports.
    pub sent: u64,
    /// Number of messages received from transports.
    pub received: u64,
    /// Number of messages dropped due to transport errors.
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    received: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> MessagingMetrics {
        MessagingMetrics {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Coordinates transports and delivery counters.
#[derive(Default)]
pub struct MessagingSupervisor {
    transports: Vec<Arc<dyn Transport>>,
    counters: Counters,
}

impl MessagingSupervisor {
    /// Construct a supervisor without transports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport for publish/receive operations.
    pub fn register_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transports.push(transport);
    }

    /// Number of registered transports.
    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    /// Publish a payload to all registered transports.
    ///
    /// Succeeds when at least one transport accepted the message and returns
    /// the message id.
    pub fn publish(&self, payload: MessagePayload) -> Result<Uuid> {
        let message = Message::new(payload);
        log_message(MessageDirection::Outbound, &message);

        let mut delivered = false;
        for transport in &self.transports {
            if let Err(err) = transport.send(message.clone()) {
                tracing::warn!(transport = transport.name(), error = %err, "transport send failed");
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            } else {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
                delivered = true;
            }
        }

        if delivered {
            Ok(message.id)
        } else {
            Err(MessagingError::Undelivered {
                kind: message.kind(),
            })
        }
    }

    /// Poll transports for any available messages.
    pub fn poll(&self) -> Vec<Message> {
        let mut collected = Vec::new();
        for transport in &self.transports {
            while let Some(message) = transport.recv() {
                self.counters.received.fetch_add(1, Ordering::Relaxed);
                log_message(MessageDirection::Inbound, &message);
                collected.push(message);
            }
        }
        collected
    }

    /// Return the current metrics snapshot.
    pub fn metrics(&self) -> MessagingMetrics {
        self.counters.snapshot()
    }
}
