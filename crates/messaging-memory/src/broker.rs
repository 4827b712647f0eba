use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use courier_channels::ChannelId;
use courier_messaging::Message;
use courier_messaging::transport::{ExceptionSink, Session, TransportError};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::destination::Destination;
use crate::session::MemorySession;

/// Shared state of the in-memory broker.
#[derive(Debug, Default)]
pub struct MemoryBroker {
    destinations: DashMap<String, Arc<Destination>>,
    tasks: TaskTracker,
    next_id: AtomicU64,
    sinks: Mutex<HashMap<u64, ExceptionSink>>,
    failing_connects: AtomicU32,
    connects: AtomicU64,
}

impl MemoryBroker {
    /// Number of listeners currently registered on `channel`.
    #[must_use]
    pub fn listeners(&self, channel: &ChannelId) -> usize {
        self.destinations
            .get(channel.name())
            .map_or(0, |destination| destination.listener_count())
    }

    /// Number of messages waiting on queue `channel` for lack of listeners.
    #[must_use]
    pub fn pending(&self, channel: &ChannelId) -> usize {
        self.destinations
            .get(channel.name())
            .map_or(0, |destination| destination.pending_count())
    }

    /// Every message sent to `channel` since the broker was created or last
    /// cleared, oldest first. The log is unbounded.
    #[must_use]
    pub fn sent(&self, channel: &ChannelId) -> Vec<Message> {
        let payloads = self
            .destinations
            .get(channel.name())
            .map(|destination| destination.sent())
            .unwrap_or_default();

        payloads
            .iter()
            .filter_map(|payload| Message::unpack(payload).ok())
            .collect()
    }

    /// Waits until every delivery dispatched so far, and every delivery
    /// those spawn in turn, has completed.
    pub async fn wait_for_concurrent_tasks_to_finish(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Forgets every destination, along with its listeners and buffers.
    pub fn clear(&self) {
        info!(destinations = self.destinations.len(), "clearing memory broker");
        self.destinations.clear();
    }

    /// Reports `exception` to every open session as if the broker had
    /// raised it. Returns how many sessions were notified.
    pub fn raise(&self, exception: &TransportError) -> usize {
        let sinks: Vec<ExceptionSink> = self.sinks.lock().values().cloned().collect();

        sinks
            .iter()
            .filter(|sink| sink.send(exception.clone()).is_ok())
            .count()
    }

    /// Number of sessions opened so far.
    #[must_use]
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Makes the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    pub(crate) fn open_session(
        self: Arc<Self>,
        exceptions: ExceptionSink,
    ) -> Result<Arc<dyn Session>, TransportError> {
        let failing = self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::ConnectionFailed(
                "memory broker refused the connection".to_string(),
            ));
        }

        let id = self.next_id();
        self.sinks.lock().insert(id, exceptions);
        self.connects.fetch_add(1, Ordering::SeqCst);
        debug!(session = id, "memory session opened");

        Ok(Arc::new(MemorySession::new(id, self)))
    }

    pub(crate) fn close_session(&self, session_id: u64) {
        self.sinks.lock().remove(&session_id);
        debug!(session = session_id, "memory session closed");
    }

    pub(crate) fn destination(&self, channel: &ChannelId) -> Result<Arc<Destination>, TransportError> {
        let name = channel.name();

        if name.is_empty() || name.contains(|c: char| c == '.' || c.is_whitespace()) {
            return Err(TransportError::InvalidDestination(name.to_string()));
        }

        Ok(Arc::clone(
            self.destinations
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Destination::new(name)))
                .value(),
        ))
    }

    pub(crate) const fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}
