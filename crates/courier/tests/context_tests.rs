use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use clap::Parser;
use courier::{BrokerKind, Connection, Error, Message, MessageListener, MessagingContext, Settings};
use courier_channels::ChannelId;
use courier_messaging::transport::{
    Consumer, DeliveryHandler, ExceptionSink, Sender, Session, Transport, TransportError,
};
use courier_messaging_memory::MemoryTransport;

#[derive(Debug)]
struct Echo {
    connection: Connection,
}

#[async_trait]
impl MessageListener for Echo {
    async fn on_message(&self, mut message: Message) {
        self.connection.reply(&mut message).await.unwrap();
    }
}

/// Memory transport whose consumers report an error when closed.
#[derive(Debug)]
struct FailingUnsubscribe {
    inner: MemoryTransport,
}

#[derive(Debug)]
struct FailingUnsubscribeSession {
    inner: Arc<dyn Session>,
}

#[derive(Debug)]
struct FailingConsumer {
    inner: Box<dyn Consumer>,
}

#[async_trait]
impl Transport for FailingUnsubscribe {
    fn name(&self) -> &'static str {
        "failing-unsubscribe"
    }

    async fn connect(
        &self,
        exceptions: ExceptionSink,
    ) -> Result<Arc<dyn Session>, TransportError> {
        Ok(Arc::new(FailingUnsubscribeSession {
            inner: self.inner.connect(exceptions).await?,
        }))
    }
}

#[async_trait]
impl Session for FailingUnsubscribeSession {
    async fn create_sender(
        &self,
        channel: &ChannelId,
    ) -> Result<Arc<dyn Sender>, TransportError> {
        self.inner.create_sender(channel).await
    }

    async fn create_consumer(
        &self,
        channel: &ChannelId,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Result<Box<dyn Consumer>, TransportError> {
        Ok(Box::new(FailingConsumer {
            inner: self.inner.create_consumer(channel, handler).await?,
        }))
    }

    async fn drain(&self, channel: &ChannelId) -> Result<Vec<Bytes>, TransportError> {
        self.inner.drain(channel).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.close().await
    }
}

#[async_trait]
impl Consumer for FailingConsumer {
    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        self.inner.close().await?;

        Err(TransportError::Other("unsubscribe rejected".to_string()))
    }
}

fn settings(extra: &[&str]) -> Settings {
    let mut args = vec![
        "courier",
        "--environment-name",
        "TEST",
        "--replicas",
        "ONE=bitarchive,CS=checksum",
        "--timeout-ms",
        "1000",
        "--failure-policy",
        "log-only",
    ];
    args.extend_from_slice(extra);

    Settings::try_parse_from(args).unwrap()
}

#[tokio::test]
async fn test_request_reply_through_context() {
    let _ = tracing_subscriber::fmt::try_init();

    let context = MessagingContext::new(settings(&[])).unwrap();
    let channels = context.channels().unwrap();

    let echo = Arc::new(Echo {
        connection: context.connection().clone(),
    });
    context
        .connection()
        .set_listener(channels.the_repos(), &echo)
        .await
        .unwrap();

    let mut request = Message::new(
        channels.the_repos().clone(),
        channels.this_repos_client().clone(),
        "GetFileMessage",
    )
    .with_payload("file.warc");

    let reply = context.send_and_wait(&mut request).await.unwrap();
    assert_eq!(reply, Some(request));

    context.close().await;
}

#[tokio::test]
async fn test_send_and_wait_unregisters_synchronizer() {
    let transport = MemoryTransport::new();
    let context =
        MessagingContext::with_transport(settings(&["--timeout-ms", "20"]), Arc::new(transport.clone()))
            .unwrap();
    let channels = context.channels().unwrap();

    let mut request = Message::new(
        channels.the_index_server().clone(),
        channels.this_index_client().clone(),
        "IndexRequest",
    );

    let reply = context.send_and_wait(&mut request).await.unwrap();

    assert!(reply.is_none());
    assert_eq!(transport.broker().listeners(channels.this_index_client()), 0);
    assert_eq!(transport.broker().pending(channels.the_index_server()), 1);
}

#[tokio::test]
async fn test_reply_kept_when_unregister_fails() {
    let transport = MemoryTransport::new();
    let context = MessagingContext::with_transport(
        settings(&[]),
        Arc::new(FailingUnsubscribe {
            inner: transport.clone(),
        }),
    )
    .unwrap();
    let channels = context.channels().unwrap();

    let echo = Arc::new(Echo {
        connection: context.connection().clone(),
    });
    context
        .connection()
        .set_listener(channels.the_repos(), &echo)
        .await
        .unwrap();

    let mut request = Message::new(
        channels.the_repos().clone(),
        channels.this_repos_client().clone(),
        "StoreMessage",
    );

    let reply = context.send_and_wait(&mut request).await.unwrap();

    assert_eq!(reply, Some(request));
    assert_eq!(transport.broker().listeners(channels.this_repos_client()), 0);
}

#[test]
fn test_invalid_replica_in_use() {
    let result = MessagingContext::new(settings(&["--use-replica-id", "NOWHERE"]));

    assert!(matches!(
        result,
        Err(Error::Channels(courier_channels::Error::UnknownChannel(_)))
    ));
}

#[test]
fn test_broker_selection() {
    let nats = settings(&["--broker", "nats", "--broker-host", "broker.example"]);
    assert_eq!(nats.broker, BrokerKind::Nats);
    assert_eq!(courier::transport_for(&nats).name(), "nats");

    let memory = settings(&[]);
    assert_eq!(courier::transport_for(&memory).name(), "memory");
}

#[tokio::test]
async fn test_registry_reset_changes_replica_channels() {
    let context = MessagingContext::new(settings(&[])).unwrap();
    let before = context.channels().unwrap().the_bamon().unwrap().clone();

    let mut changed = context.registry().settings();
    changed.use_replica_id = "CS".to_string();
    context.registry().update_settings(changed);
    context.registry().reset();

    let channels = context.channels().unwrap();
    assert_eq!(before.name(), "TEST_ONE_THE_BAMON");
    assert_eq!(channels.the_cr().unwrap().name(), "TEST_CS_THE_CR");
    assert!(channels.the_bamon().is_err());
}
