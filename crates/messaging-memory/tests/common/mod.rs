#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use courier_channels::ChannelId;
use courier_messaging::{Connection, ConnectionSettings, FailurePolicy, Message, MessageListener};
use courier_messaging_memory::MemoryTransport;

pub fn channel(name: &str) -> ChannelId {
    ChannelId::new(name).unwrap()
}

pub fn connection(transport: &MemoryTransport) -> Connection {
    Connection::new(
        Arc::new(transport.clone()),
        ConnectionSettings {
            connect_attempts: 3,
            retry_delay: Duration::from_millis(1),
            failure_policy: FailurePolicy::LogOnly,
            ..ConnectionSettings::default()
        },
    )
}

pub fn message(to: &ChannelId, reply_to: &ChannelId) -> Message {
    Message::new(to.clone(), reply_to.clone(), "TestMessage")
}

/// Keeps every message it receives.
#[derive(Debug, Default)]
pub struct Recorder {
    received: Mutex<Vec<Message>>,
}

impl Recorder {
    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn received(&self) -> Vec<Message> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageListener for Recorder {
    async fn on_message(&self, message: Message) {
        self.received.lock().unwrap().push(message);
    }
}

/// Replies to every message it receives with the message itself.
#[derive(Debug)]
pub struct Replier {
    pub connection: Connection,
}

#[async_trait]
impl MessageListener for Replier {
    async fn on_message(&self, mut message: Message) {
        self.connection.reply(&mut message).await.unwrap();
    }
}

/// Polls `condition` until it holds, failing the test after a second.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
