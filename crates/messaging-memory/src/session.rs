use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use courier_channels::ChannelId;
use courier_messaging::transport::{
    Consumer, DeliveryHandler, Sender, Session, TransportError,
};
use parking_lot::Mutex;
use tracing::debug;

use crate::MemoryBroker;
use crate::destination::Destination;

#[derive(Debug)]
pub(crate) struct MemorySession {
    id: u64,
    broker: Arc<MemoryBroker>,
    consumers: Mutex<Vec<(Arc<Destination>, u64)>>,
    closed: AtomicBool,
}

impl MemorySession {
    pub(crate) const fn new(id: u64, broker: Arc<MemoryBroker>) -> Self {
        Self {
            id,
            broker,
            consumers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::SessionClosed);
        }

        Ok(())
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn create_sender(
        &self,
        channel: &ChannelId,
    ) -> Result<Arc<dyn Sender>, TransportError> {
        self.ensure_open()?;

        self.broker.destination(channel)?;

        Ok(Arc::new(MemorySender {
            channel: channel.clone(),
            broker: Arc::clone(&self.broker),
        }))
    }

    async fn create_consumer(
        &self,
        channel: &ChannelId,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Result<Box<dyn Consumer>, TransportError> {
        self.ensure_open()?;

        let destination = self.broker.destination(channel)?;
        let id = self.broker.next_id();

        destination.add_listener(id, handler);
        self.consumers.lock().push((Arc::clone(&destination), id));

        Ok(Box::new(MemoryConsumer { destination, id }))
    }

    async fn drain(&self, channel: &ChannelId) -> Result<Vec<Bytes>, TransportError> {
        self.ensure_open()?;

        Ok(self.broker.destination(channel)?.drain())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let consumers = std::mem::take(&mut *self.consumers.lock());
        for (destination, id) in consumers {
            destination.remove_listener(id);
        }

        self.broker.close_session(self.id);

        Ok(())
    }
}

// Looks the destination up on every send so that it outlives `MemoryBroker::clear`.
#[derive(Debug)]
struct MemorySender {
    channel: ChannelId,
    broker: Arc<MemoryBroker>,
}

#[async_trait]
impl Sender for MemorySender {
    async fn send(&self, payload: Bytes) -> Result<(), TransportError> {
        self.broker
            .destination(&self.channel)?
            .dispatch(payload, self.broker.tasks());

        Ok(())
    }
}

#[derive(Debug)]
struct MemoryConsumer {
    destination: Arc<Destination>,
    id: u64,
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        if !self.destination.remove_listener(self.id) {
            debug!(consumer = self.id, "consumer already removed");
        }

        Ok(())
    }
}
