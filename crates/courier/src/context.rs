use std::sync::Arc;

use courier_channels::{ChannelRegistry, Channels};
use courier_messaging::transport::Transport;
use courier_messaging::{Connection, Message, Synchronizer};
use tracing::{info, warn};

use crate::{Error, Settings, transport_for};

/// Everything a component needs to take part in messaging.
///
/// Build one per process and hand clones to the components that send or
/// listen; clones share the connection and the channel registry.
#[derive(Clone, Debug)]
pub struct MessagingContext {
    settings: Arc<Settings>,
    registry: Arc<ChannelRegistry>,
    connection: Connection,
}

impl MessagingContext {
    /// Creates the context with the broker selected in `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channels`] if no channels can be derived from the settings.
    pub fn new(settings: Settings) -> Result<Self, Error> {
        let transport = transport_for(&settings);
        Self::with_transport(settings, transport)
    }

    /// Creates the context over an existing transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channels`] if no channels can be derived from the settings.
    pub fn with_transport(
        settings: Settings,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, Error> {
        let registry = Arc::new(ChannelRegistry::new(settings.channel_settings()));
        registry.channels()?;

        info!(
            environment = %settings.environment_name,
            replica = %settings.use_replica_id,
            transport = transport.name(),
            "messaging context created"
        );

        Ok(Self {
            connection: Connection::new(transport, settings.connection_settings()),
            registry,
            settings: Arc::new(settings),
        })
    }

    /// The settings the context was built from.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The current channel snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channels`] if the registry was reset to invalid settings.
    pub fn channels(&self) -> Result<Arc<Channels>, Error> {
        Ok(self.registry.channels()?)
    }

    /// The channel registry, for updating settings and resetting.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// The process's connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Sends `message` and waits for its reply for the configured timeout.
    ///
    /// A fresh [`Synchronizer`] listens on the message's reply channel for the
    /// duration of the exchange.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Messaging`] if registering or sending fails. Failing to
    /// unregister afterwards is only logged.
    pub async fn send_and_wait(&self, message: &mut Message) -> Result<Option<Message>, Error> {
        let reply_to = message.reply_to().clone();
        let synchronizer = Arc::new(Synchronizer::new(self.connection.clone()));

        self.connection
            .set_listener(&reply_to, &synchronizer)
            .await?;

        let result = synchronizer
            .send_and_wait_for_one_reply(message, self.settings.timeout_ms)
            .await;

        if let Err(error) = self
            .connection
            .remove_listener(&reply_to, &synchronizer)
            .await
        {
            warn!(channel = %reply_to, %error, "failed to unregister synchronizer");
        }

        Ok(result?)
    }

    /// Closes the connection.
    pub async fn close(&self) {
        self.connection.close().await;
    }
}
