//! ---
//! spc_section: "04-messaging"
//! spc_subsection: "module"
//! spc_type: "source"
//! spc_scope: "code"
//! spc_description: "Transport abstraction and the in-memory channel."
//! spc_version: "v0.0.0-prealpha"
//! spc_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Message, Result};

/// Transport abstraction used by all messaging backends.
pub trait Transport: Send + Sync {
    /// Send a message into the transport.
    fn send(&self, msg: Message) -> Result<()>;
    /// Receive the next message from the transport, if available.
    fn recv(&self) -> Option<Message>;
    /// Human-readable transport name for logging.
    fn name(&self) -> &'static str;
}

type Queue = Arc<Mutex<VecDeque<Message>>>;

/// In-memory transport backed by mutex protected queues.
///
/// A transport built with [`InMemoryTransport::new`] is a loopback: what is
/// sent is received by the same endpoint. [`InMemoryTransport::pair`] builds
/// two crossed endpoints, one for the controller and one for its master.
#[derive(Clone)]
pub struct InMemoryTransport {
    inbound: Queue,
    outbound: Queue,
    loopback: bool,
}

impl InMemoryTransport {
    /// Create a loopback channel.
    pub fn new() -> Self {
        Self {
            inbound: Queue::default(),
            outbound: Queue::default(),
            loopback: true,
        }
    }

    /// Create two connected endpoints.
    pub fn pair() -> (Self, Self) {
        let a_to_b: Queue = Arc::default();
        let b_to_a: Queue = Arc::default();
        let a = Self {
            inbound: Arc::clone(&b_to_a),
            outbound: Arc::clone(&a_to_b),
            loopback: false,
        };
        let b = Self {
            inbound: a_to_b,
            outbound: b_to_a,
            loopback: false,
        };
        (a, b)
    }

    fn send_queue(&self) -> &Queue {
        if self.loopback {
            &self.inbound
        } else {
            &self.outbound
        }
    }

    /// Number of messages waiting to be received on this endpoint.
    pub fn pending(&self) -> usize {
        self.inbound.lock().len()
    }

    /// Receive everything currently queued.
    pub fn drain(&self) -> Vec<Message> {
        self.inbound.lock().drain(..).collect()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for InMemoryTransport {
    fn send(&self, msg: Message) -> Result<()> {
        self.send_queue().lock().push_back(msg);
        Ok(())
    }

    fn recv(&self) -> Option<Message> {
        self.inbound.lock().pop_front()
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
