//! In-memory implementation of the messaging transport.
//!
//! Destinations live in a [`MemoryBroker`] shared by every session opened
//! from the same [`MemoryTransport`]. Each delivery runs on its own task and
//! [`MemoryBroker::wait_for_concurrent_tasks_to_finish`] waits for all of
//! them, which makes delivery assertions deterministic.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod broker;
mod destination;
mod session;

pub use broker::MemoryBroker;

use std::sync::Arc;

use async_trait::async_trait;
use courier_messaging::transport::{ExceptionSink, Session, Transport, TransportError};

/// A transport whose broker lives in process memory.
///
/// Clones share one broker, so connections built from them can talk to each
/// other.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransport {
    broker: Arc<MemoryBroker>,
}

impl MemoryTransport {
    /// Creates a transport with a fresh, empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The broker behind this transport, for inspection in tests.
    #[must_use]
    pub const fn broker(&self) -> &Arc<MemoryBroker> {
        &self.broker
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn connect(
        &self,
        exceptions: ExceptionSink,
    ) -> Result<Arc<dyn Session>, TransportError> {
        Arc::clone(&self.broker).open_session(exceptions)
    }
}
