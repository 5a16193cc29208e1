//! Registry of connected live-reload clients.
//!
//! Each client owns a small bounded queue drained by its connection task.
//! Broadcasting only enqueues, so it never waits on a socket: a client whose
//! queue is full or closed is evicted on the spot, and the connection task
//! enforces [`WRITE_DEADLINE`] on the actual socket write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};

/// Message sent to clients after a successful rebuild.
pub const RELOAD_MESSAGE: &str = "reload";

/// Longest a single client write may take before the client is dropped.
pub const WRITE_DEADLINE: Duration = Duration::from_secs(2);

const CLIENT_QUEUE: usize = 4;

pub type ClientId = u64;

#[derive(Default)]
pub struct ClientHub {
    clients: Mutex<HashMap<ClientId, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl ClientHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client and return its id with the receiving end of its queue.
    pub fn register(&self) -> (ClientId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, tx);
        tracing::debug!(client = id, "Live reload client connected");
        (id, rx)
    }

    pub fn remove(&self, id: ClientId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(client = id, "Live reload client disconnected");
        }
        removed
    }

    /// Queue `message` for every client. Returns how many clients accepted it;
    /// the rest are evicted.
    pub fn broadcast(&self, message: &str) -> usize {
        let mut delivered = 0;
        self.lock().retain(|id, tx| match tx.try_send(message.to_string()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(client = id, "Live reload client is not keeping up, dropping it");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });
        delivered
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every client; their connection tasks see a closed queue and exit.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClientId, mpsc::Sender<String>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
