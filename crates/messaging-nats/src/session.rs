use std::sync::Arc;

use async_nats::{Client, Subscriber};
use async_trait::async_trait;
use bytes::Bytes;
use courier_channels::ChannelId;
use courier_messaging::transport::{
    Consumer, DeliveryHandler, Sender, Session, TransportError,
};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug)]
pub(crate) struct NatsSession {
    client: Client,
    shutdown_token: CancellationToken,
}

impl NatsSession {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            shutdown_token: CancellationToken::new(),
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.shutdown_token.is_cancelled() {
            return Err(TransportError::SessionClosed);
        }

        Ok(())
    }
}

async fn forward(
    subject: String,
    mut subscriber: Subscriber,
    handler: Arc<dyn DeliveryHandler>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                if let Err(error) = subscriber.unsubscribe().await {
                    debug!(%subject, %error, "unsubscribe failed");
                }
                break;
            }
            next = subscriber.next() => match next {
                Some(message) => handler.deliver(message.payload).await,
                None => {
                    warn!(%subject, "subscription ended");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl Session for NatsSession {
    async fn create_sender(
        &self,
        channel: &ChannelId,
    ) -> Result<Arc<dyn Sender>, TransportError> {
        self.ensure_open()?;

        Ok(Arc::new(NatsSender {
            client: self.client.clone(),
            subject: channel.name().to_string(),
        }))
    }

    async fn create_consumer(
        &self,
        channel: &ChannelId,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Result<Box<dyn Consumer>, TransportError> {
        self.ensure_open()?;

        let subject = channel.name().to_string();
        let subscriber = if channel.is_topic() {
            self.client.subscribe(subject.clone()).await
        } else {
            self.client
                .queue_subscribe(subject.clone(), subject.clone())
                .await
        }
        .map_err(|e| TransportError::Subscribe(e.to_string()))?;

        let token = self.shutdown_token.child_token();
        tokio::spawn(forward(subject.clone(), subscriber, handler, token.clone()));

        debug!(%subject, topic = channel.is_topic(), "nats consumer created");

        Ok(Box::new(NatsConsumer { subject, token }))
    }

    async fn drain(&self, _channel: &ChannelId) -> Result<Vec<Bytes>, TransportError> {
        self.ensure_open()?;

        // Core NATS keeps nothing for absent subscribers.
        Ok(Vec::new())
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Consumer tasks unsubscribe on their own once cancelled.
        self.shutdown_token.cancel();

        self.client
            .flush()
            .await
            .map_err(|e| TransportError::Other(e.to_string()))
    }
}

#[derive(Debug)]
struct NatsSender {
    client: Client,
    subject: String,
}

#[async_trait]
impl Sender for NatsSender {
    async fn send(&self, payload: Bytes) -> Result<(), TransportError> {
        self.client
            .publish(self.subject.clone(), payload)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

#[derive(Debug)]
struct NatsConsumer {
    subject: String,
    token: CancellationToken,
}

#[async_trait]
impl Consumer for NatsConsumer {
    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        debug!(subject = %self.subject, "closing nats consumer");
        self.token.cancel();

        Ok(())
    }
}
