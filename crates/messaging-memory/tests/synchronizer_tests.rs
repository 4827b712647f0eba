mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::{Replier, channel, connection, message};
use courier_messaging::{Connection, Error, Message, MessageListener, Synchronizer};
use courier_messaging_memory::MemoryTransport;

/// Answers each request first with a reply correlated to another id, then
/// with the correct one.
#[derive(Debug)]
struct MisleadingReplier {
    connection: Connection,
}

#[async_trait]
impl MessageListener for MisleadingReplier {
    async fn on_message(&self, mut request: Message) {
        let mut wrong = Message::new(request.reply_to().clone(), request.to().clone(), "Noise")
            .in_reply_to("UNKNOWN_ID");
        self.connection.send(&mut wrong).await.unwrap();

        self.connection.reply(&mut request).await.unwrap();
    }
}

/// Only ever answers with replies correlated to another id.
#[derive(Debug)]
struct WrongReplier {
    connection: Connection,
}

#[async_trait]
impl MessageListener for WrongReplier {
    async fn on_message(&self, request: Message) {
        let mut wrong = Message::new(request.reply_to().clone(), request.to().clone(), "Noise")
            .in_reply_to("UNKNOWN_ID");
        self.connection.send(&mut wrong).await.unwrap();
    }
}

/// Replies after a delay.
#[derive(Debug)]
struct DelayedReplier {
    connection: Connection,
    delay: Duration,
}

#[async_trait]
impl MessageListener for DelayedReplier {
    async fn on_message(&self, mut request: Message) {
        tokio::time::sleep(self.delay).await;
        self.connection.reply(&mut request).await.unwrap();
    }
}

#[tokio::test]
async fn test_returns_matching_reply() {
    let _ = tracing_subscriber::fmt::try_init();

    let transport = MemoryTransport::new();
    let connection = connection(&transport);
    let to = channel("TEST_COMMON_THE_REPOS");
    let reply_to = channel("TEST_COMMON_THIS_REPOS_CLIENT_host");

    let replier = Arc::new(Replier {
        connection: connection.clone(),
    });
    connection.set_listener(&to, &replier).await.unwrap();

    let synchronizer = Arc::new(Synchronizer::new(connection.clone()));
    connection.set_listener(&reply_to, &synchronizer).await.unwrap();

    let mut request = message(&to, &reply_to).with_payload("request");
    let reply = synchronizer
        .send_and_wait_for_one_reply(&mut request, 0)
        .await
        .unwrap()
        .expect("reply expected");

    assert_eq!(reply, request);
    assert_eq!(reply.reply_of_id(), Some(request.id()));
    assert_eq!(reply.payload(), request.payload());
}

#[tokio::test]
async fn test_ignores_reply_to_other_message() {
    let _ = tracing_subscriber::fmt::try_init();

    let transport = MemoryTransport::new();
    let connection = connection(&transport);
    let to = channel("TEST_COMMON_INDEX_SERVER");
    let reply_to = channel("TEST_COMMON_THIS_INDEX_CLIENT_host");

    let replier = Arc::new(MisleadingReplier {
        connection: connection.clone(),
    });
    connection.set_listener(&to, &replier).await.unwrap();

    let synchronizer = Arc::new(Synchronizer::new(connection.clone()));
    connection.set_listener(&reply_to, &synchronizer).await.unwrap();

    let mut request = message(&to, &reply_to);
    let reply = tokio::time::timeout(
        Duration::from_secs(1),
        synchronizer.send_and_wait_for_one_reply(&mut request, 0),
    )
    .await
    .expect("wait should complete")
    .unwrap()
    .expect("reply expected");

    assert_eq!(reply.reply_of_id(), Some(request.id()));
    assert_eq!(reply.kind(), "TestMessage");

    transport.broker().wait_for_concurrent_tasks_to_finish().await;
    assert_eq!(transport.broker().sent(&reply_to).len(), 2);
}

#[tokio::test]
async fn test_wrong_reply_only_times_out() {
    let transport = MemoryTransport::new();
    let connection = connection(&transport);
    let to = channel("TEST_COMMON_THE_REPOS");
    let reply_to = channel("TEST_COMMON_THIS_REPOS_CLIENT_host");

    let replier = Arc::new(WrongReplier {
        connection: connection.clone(),
    });
    connection.set_listener(&to, &replier).await.unwrap();

    let synchronizer = Arc::new(Synchronizer::new(connection.clone()));
    connection.set_listener(&reply_to, &synchronizer).await.unwrap();

    let reply = synchronizer
        .send_and_wait_for_one_reply(&mut message(&to, &reply_to), 100)
        .await
        .unwrap();

    assert!(reply.is_none());
}

#[tokio::test]
async fn test_times_out_no_earlier_than_requested() {
    let transport = MemoryTransport::new();
    let connection = connection(&transport);
    let to = channel("TEST_COMMON_THE_REPOS");
    let reply_to = channel("TEST_COMMON_THIS_REPOS_CLIENT_host");

    let replier = Arc::new(DelayedReplier {
        connection: connection.clone(),
        delay: Duration::from_millis(300),
    });
    connection.set_listener(&to, &replier).await.unwrap();

    let synchronizer = Arc::new(Synchronizer::new(connection.clone()));
    connection.set_listener(&reply_to, &synchronizer).await.unwrap();

    let started = Instant::now();
    let reply = synchronizer
        .send_and_wait_for_one_reply(&mut message(&to, &reply_to), 50)
        .await
        .unwrap();

    assert!(reply.is_none());
    assert!(started.elapsed() >= Duration::from_millis(50));

    // The late reply does not revive the exchange.
    transport.broker().wait_for_concurrent_tasks_to_finish().await;
    assert!(matches!(
        synchronizer
            .send_and_wait_for_one_reply(&mut message(&to, &reply_to), 50)
            .await,
        Err(Error::PermissionDenied(_))
    ));
}

#[tokio::test]
async fn test_delayed_reply_within_timeout() {
    let transport = MemoryTransport::new();
    let connection = connection(&transport);
    let to = channel("TEST_COMMON_THE_REPOS");
    let reply_to = channel("TEST_COMMON_THIS_REPOS_CLIENT_host");

    let replier = Arc::new(DelayedReplier {
        connection: connection.clone(),
        delay: Duration::from_millis(20),
    });
    connection.set_listener(&to, &replier).await.unwrap();

    let synchronizer = Arc::new(Synchronizer::new(connection.clone()));
    connection.set_listener(&reply_to, &synchronizer).await.unwrap();

    let mut request = message(&to, &reply_to);
    let reply = synchronizer
        .send_and_wait_for_one_reply(&mut request, 1000)
        .await
        .unwrap();

    assert_eq!(reply, Some(request));
}

#[tokio::test]
async fn test_synchronizer_serves_one_exchange() {
    let transport = MemoryTransport::new();
    let connection = connection(&transport);
    let to = channel("TEST_COMMON_THE_REPOS");
    let reply_to = channel("TEST_COMMON_THIS_REPOS_CLIENT_host");

    let replier = Arc::new(Replier {
        connection: connection.clone(),
    });
    connection.set_listener(&to, &replier).await.unwrap();

    let synchronizer = Arc::new(Synchronizer::new(connection.clone()));
    connection.set_listener(&reply_to, &synchronizer).await.unwrap();

    synchronizer
        .send_and_wait_for_one_reply(&mut message(&to, &reply_to), 0)
        .await
        .unwrap()
        .expect("reply expected");

    let mut second = message(&to, &reply_to);
    assert!(matches!(
        synchronizer.send_and_wait_for_one_reply(&mut second, 0).await,
        Err(Error::PermissionDenied(_))
    ));
    assert!(!second.has_been_sent());
}
