//! Fan-out of outbound messages to connected participants
//!
//! Each connection owns a bounded queue drained by its writer task. The
//! dispatcher only ever `try_send`s into those queues, so a slow or dead
//! socket never stalls the tick loop. Dropping a connection's sender closes it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::ws::protocol::{encode, ServerMsg};

/// An encoded message, shared by every recipient of one broadcast
pub type Payload = Arc<str>;

/// Sending half of a connection's outbound queue
pub type OutboundTx = mpsc::Sender<Payload>;

/// Outbound queue depth per connection. Roughly one second of snapshots.
pub const OUTBOUND_QUEUE: usize = 64;

pub fn outbound_channel() -> (OutboundTx, mpsc::Receiver<Payload>) {
    mpsc::channel(OUTBOUND_QUEUE)
}

/// Open connections known to the match
#[derive(Default)]
pub struct Broadcaster {
    connections: HashMap<Uuid, OutboundTx>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, conn_id: Uuid, tx: OutboundTx) {
        self.connections.insert(conn_id, tx);
    }

    /// Forget a connection. Its writer task drains what is queued, then closes the socket.
    pub fn close(&mut self, conn_id: Uuid) {
        self.connections.remove(&conn_id);
    }

    pub fn close_all(&mut self) {
        self.connections.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Encode once and deliver to every connection. Returns the encoded size.
    pub fn broadcast(&self, msg: &ServerMsg) -> Option<usize> {
        let payload = encode_payload(msg)?;
        for (conn_id, tx) in &self.connections {
            deliver(*conn_id, tx, payload.clone());
        }
        Some(payload.len())
    }

    /// Deliver to a single connection
    pub fn send(&self, conn_id: Uuid, msg: &ServerMsg) {
        let Some(tx) = self.connections.get(&conn_id) else {
            return;
        };
        if let Some(payload) = encode_payload(msg) {
            deliver(conn_id, tx, payload);
        }
    }
}

fn encode_payload(msg: &ServerMsg) -> Option<Payload> {
    match encode(msg) {
        Ok(json) => Some(Payload::from(json)),
        Err(e) => {
            error!(error = %e, "Failed to encode outbound message");
            None
        }
    }
}

/// Best-effort send to one connection; failures are logged and swallowed
pub fn deliver(conn_id: Uuid, tx: &OutboundTx, payload: Payload) -> bool {
    match tx.try_send(payload) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(conn_id = %conn_id, "Outbound queue full, dropping message");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(conn_id = %conn_id, "Outbound queue closed");
            false
        }
    }
}
