use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{trace, warn};

use crate::Message;
use crate::transport::DeliveryHandler;

/// Receives messages delivered to a channel it was registered on.
///
/// Registrations are keyed by the identity of the shared allocation, so the
/// same `Arc` must be passed to remove a listener again.
#[async_trait]
pub trait MessageListener: Debug + Send + Sync + 'static {
    /// Handles one delivered message.
    async fn on_message(&self, message: Message);
}

/// Identity of a listener allocation.
pub(crate) fn listener_identity<L>(listener: &Arc<L>) -> usize
where
    L: MessageListener + ?Sized,
{
    Arc::as_ptr(listener).cast::<()>().addr()
}

/// Unpacks raw deliveries before handing them to a listener.
pub(crate) struct ListenerDelivery<L: ?Sized> {
    channel: String,
    listener: Arc<L>,
}

impl<L> ListenerDelivery<L>
where
    L: MessageListener + ?Sized,
{
    pub(crate) const fn new(channel: String, listener: Arc<L>) -> Self {
        Self { channel, listener }
    }
}

#[async_trait]
impl<L> DeliveryHandler for ListenerDelivery<L>
where
    L: MessageListener + ?Sized,
{
    async fn deliver(&self, payload: Bytes) {
        match Message::unpack(&payload) {
            Ok(message) => {
                trace!(channel = %self.channel, %message, "delivering message");
                self.listener.on_message(message).await;
            }
            Err(error) => {
                warn!(channel = %self.channel, %error, "dropping undecodable delivery");
            }
        }
    }
}
