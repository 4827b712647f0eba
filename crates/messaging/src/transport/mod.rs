mod error;

pub use error::TransportError;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use courier_channels::ChannelId;
use tokio::sync::mpsc;

/// Channel on which a transport reports errors nobody is awaiting.
pub type ExceptionSink = mpsc::UnboundedSender<TransportError>;

/// Receives raw payloads delivered to a consumer.
#[async_trait]
pub trait DeliveryHandler: Send + Sync + 'static {
    /// Handles one delivered payload.
    async fn deliver(&self, payload: Bytes);
}

/// A broker client able to open sessions.
#[async_trait]
pub trait Transport: Debug + Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Opens a session. Unsolicited failures of the session are pushed to
    /// `exceptions`.
    async fn connect(&self, exceptions: ExceptionSink)
    -> Result<Arc<dyn Session>, TransportError>;
}

/// An open connection to the broker.
#[async_trait]
pub trait Session: Debug + Send + Sync + 'static {
    /// Creates a sender publishing to `channel`.
    async fn create_sender(&self, channel: &ChannelId)
    -> Result<Arc<dyn Sender>, TransportError>;

    /// Creates a consumer handing every message for `channel` to `handler`.
    ///
    /// On a queue each message reaches one consumer; on a topic it reaches all.
    async fn create_consumer(
        &self,
        channel: &ChannelId,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Result<Box<dyn Consumer>, TransportError>;

    /// Takes every message buffered on `channel` without waiting.
    async fn drain(&self, channel: &ChannelId) -> Result<Vec<Bytes>, TransportError>;

    /// Closes the session and every consumer created from it.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Publishes payloads to one destination.
#[async_trait]
pub trait Sender: Debug + Send + Sync + 'static {
    /// Dispatches `payload` without waiting for delivery.
    async fn send(&self, payload: Bytes) -> Result<(), TransportError>;
}

/// A registered consumer.
#[async_trait]
pub trait Consumer: Debug + Send + Sync + 'static {
    /// Stops delivery to this consumer.
    async fn close(self: Box<Self>) -> Result<(), TransportError>;
}
