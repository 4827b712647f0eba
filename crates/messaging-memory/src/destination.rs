use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use courier_messaging::transport::DeliveryHandler;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use tokio_util::task::TaskTracker;
use tracing::trace;

/// A queue or topic and everything registered on it.
pub(crate) struct Destination {
    name: String,
    is_topic: bool,
    listeners: Mutex<Vec<(u64, Arc<dyn DeliveryHandler>)>>,
    pending: Mutex<VecDeque<Bytes>>,
    sent: Mutex<Vec<Bytes>>,
}

impl Destination {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_topic: courier_channels::is_topic(name),
            listeners: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add_listener(&self, consumer_id: u64, handler: Arc<dyn DeliveryHandler>) {
        self.listeners.lock().push((consumer_id, handler));
    }

    pub(crate) fn remove_listener(&self, consumer_id: u64) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != consumer_id);

        listeners.len() != before
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Copy of the sent log. It is never trimmed; `MemoryBroker::clear`
    /// drops it along with the destination.
    pub(crate) fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }

    pub(crate) fn drain(&self) -> Vec<Bytes> {
        if self.is_topic {
            return Vec::new();
        }

        self.pending.lock().drain(..).collect()
    }

    /// Hands `payload` to every listener of a topic, to one random listener
    /// of a queue, or to the pending buffer of a queue nobody listens on.
    pub(crate) fn dispatch(&self, payload: Bytes, tasks: &TaskTracker) {
        self.sent.lock().push(payload.clone());

        let targets: Vec<Arc<dyn DeliveryHandler>> = {
            let listeners = self.listeners.lock();

            if self.is_topic {
                listeners.iter().map(|(_, handler)| Arc::clone(handler)).collect()
            } else {
                listeners
                    .choose(&mut rand::thread_rng())
                    .map(|(_, handler)| Arc::clone(handler))
                    .into_iter()
                    .collect()
            }
        };

        if targets.is_empty() {
            if self.is_topic {
                trace!(destination = %self.name, "no subscribers, message dropped");
            } else {
                trace!(destination = %self.name, "no listeners, message queued");
                self.pending.lock().push_back(payload);
            }
            return;
        }

        trace!(destination = %self.name, listeners = targets.len(), "dispatching");
        for handler in targets {
            let payload = payload.clone();
            tasks.spawn(async move {
                handler.deliver(payload).await;
            });
        }
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("name", &self.name)
            .field("is_topic", &self.is_topic)
            .field("listeners", &self.listener_count())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}
