mod settings;

pub use settings::{ConnectionSettings, FailurePolicy};

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use courier_channels::ChannelId;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::listener::{ListenerDelivery, listener_identity};
use crate::transport::{
    Consumer, DeliveryHandler, ExceptionSink, Sender, Session, Transport, TransportError,
};
use crate::{Error, Message, MessageListener};

/// Assigns a fresh id to `message` unless it already has one.
pub(crate) fn assign_id(message: &mut Message) {
    if !message.has_been_sent() {
        message.update_id(Uuid::new_v4().to_string());
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct ConsumerKey {
    channel: String,
    listener: usize,
}

type Registrations = HashMap<ConsumerKey, Registration>;

// `consumer` is `None` while no session is open for it. Whenever the session
// slot holds a session, every registration has a consumer on it.
struct Registration {
    channel: ChannelId,
    handler: Arc<dyn DeliveryHandler>,
    consumer: Option<Box<dyn Consumer>>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    settings: ConnectionSettings,
    // Lock order: `consumers` before `session`.
    consumers: Mutex<Registrations>,
    session: RwLock<Option<Arc<dyn Session>>>,
    senders: DashMap<String, Arc<dyn Sender>>,
    reconnecting: AtomicBool,
    exceptions: ExceptionSink,
    exception_receiver: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<TransportError>>>,
}

/// The process's single point of sending and receiving messages.
///
/// Cloning is cheap and every clone shares the same session, sender cache and
/// listener registrations. The session is opened on first use and reopened
/// transparently after [`Connection::cleanup`].
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Creates a connection over `transport`. No session is opened yet.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, settings: ConnectionSettings) -> Self {
        let (exceptions, exception_receiver) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(Inner {
                transport,
                settings,
                consumers: Mutex::new(HashMap::new()),
                session: RwLock::new(None),
                senders: DashMap::new(),
                reconnecting: AtomicBool::new(false),
                exceptions,
                exception_receiver: parking_lot::Mutex::new(Some(exception_receiver)),
            }),
        }
    }

    /// Broker host from the settings.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.settings.broker_host
    }

    /// Broker port from the settings.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.settings.broker_port
    }

    /// Sends `message` to its destination, assigning its id on first send.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportFailure`] if no session can be opened or the
    /// broker rejects the message.
    pub async fn send(&self, message: &mut Message) -> Result<(), Error> {
        let to = message.to().clone();
        self.send_to(message, &to).await
    }

    /// Sends `message` as a reply to its `reply_to` channel, correlated by
    /// its own id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] if the message was never sent, and
    /// [`Error::TransportFailure`] if dispatch fails.
    pub async fn reply(&self, message: &mut Message) -> Result<(), Error> {
        if !message.has_been_sent() {
            return Err(Error::PermissionDenied(format!(
                "cannot reply to {} message that was never sent",
                message.kind()
            )));
        }

        message.set_reply_of_id(message.id().to_string());

        let reply_to = message.reply_to().clone();
        self.send_to(message, &reply_to).await
    }

    /// Sends `message` to `to` instead of its own destination, which stays
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportFailure`] if dispatch fails.
    pub async fn resend(&self, message: &mut Message, to: &ChannelId) -> Result<(), Error> {
        self.send_to(message, to).await
    }

    /// Registers `listener` for every message delivered to `channel`.
    ///
    /// Registering the same listener on the same channel twice has no effect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportFailure`] if the consumer cannot be created.
    pub async fn set_listener<L>(&self, channel: &ChannelId, listener: &Arc<L>) -> Result<(), Error>
    where
        L: MessageListener + ?Sized,
    {
        let key = ConsumerKey {
            channel: channel.name().to_string(),
            listener: listener_identity(listener),
        };

        let mut consumers = self.inner.consumers.lock().await;
        let session = self.attached_session(&mut consumers).await?;

        if consumers.contains_key(&key) {
            debug!(channel = %channel.name(), "listener already registered");
            return Ok(());
        }

        let handler: Arc<dyn DeliveryHandler> = Arc::new(ListenerDelivery::new(
            channel.name().to_string(),
            Arc::clone(listener),
        ));

        let consumer = session
            .create_consumer(channel, Arc::clone(&handler))
            .await
            .map_err(|source| transport_failure(channel, source))?;

        consumers.insert(
            key,
            Registration {
                channel: channel.clone(),
                handler,
                consumer: Some(consumer),
            },
        );
        info!(channel = %channel, ?listener, "listener registered");

        Ok(())
    }

    /// Stops delivering messages on `channel` to `listener`. Removing a
    /// listener that is not registered does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportFailure`] if the consumer cannot be closed.
    pub async fn remove_listener<L>(
        &self,
        channel: &ChannelId,
        listener: &Arc<L>,
    ) -> Result<(), Error>
    where
        L: MessageListener + ?Sized,
    {
        let key = ConsumerKey {
            channel: channel.name().to_string(),
            listener: listener_identity(listener),
        };

        let removed = self.inner.consumers.lock().await.remove(&key);
        let Some(registration) = removed else {
            debug!(channel = %channel.name(), "listener was not registered");
            return Ok(());
        };

        if let Some(consumer) = registration.consumer {
            consumer
                .close()
                .await
                .map_err(|source| transport_failure(channel, source))?;
        }
        info!(channel = %channel, ?listener, "listener removed");

        Ok(())
    }

    /// Takes every message waiting on queue `channel` without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportFailure`] if the broker cannot be read and
    /// [`Error::ArgumentNotValid`] if a buffered payload is not a message.
    pub async fn remove_all_messages(&self, channel: &ChannelId) -> Result<Vec<Message>, Error> {
        let session = self.session().await?;
        let payloads = session
            .drain(channel)
            .await
            .map_err(|source| transport_failure(channel, source))?;

        debug!(channel = %channel.name(), count = payloads.len(), "drained channel");

        payloads
            .iter()
            .map(|payload| Message::unpack(payload))
            .collect()
    }

    /// Handles a failure the transport reported outside any call.
    ///
    /// A lost connection is reestablished and every listener registered
    /// again. Anything else, or a failed reconnect, is handled according to
    /// the configured [`FailurePolicy`].
    pub async fn on_exception(&self, exception: TransportError) {
        warn!(%exception, "transport reported an exception");

        if exception.is_recoverable() {
            match self.reconnect().await {
                Ok(()) => return,
                Err(error) => {
                    error!(%error, "reconnect failed");
                    self.fail(&error);
                    return;
                }
            }
        }

        self.fail(&exception);
    }

    /// Releases the session, every consumer and every cached sender.
    ///
    /// The next operation opens a fresh session.
    pub async fn cleanup(&self) {
        let mut consumers = self.inner.consumers.lock().await;
        let mut session = self.inner.session.write().await;

        for (key, registration) in consumers.drain() {
            if let Some(consumer) = registration.consumer {
                if let Err(error) = consumer.close().await {
                    warn!(channel = %key.channel, %error, "failed to close consumer");
                }
            }
        }

        self.inner.senders.clear();

        if let Some(session) = session.take() {
            if let Err(error) = session.close().await {
                warn!(%error, "failed to close session");
            }
        }

        debug!("connection cleaned up");
    }

    /// Closes the connection. Same as [`Connection::cleanup`].
    pub async fn close(&self) {
        info!(broker = %self.broker_address(), "closing connection");
        self.cleanup().await;
    }

    async fn send_to(&self, message: &mut Message, to: &ChannelId) -> Result<(), Error> {
        assign_id(message);

        let payload = message.pack()?;
        let sender = self.sender(to).await?;

        if let Err(source) = sender.send(payload).await {
            self.inner.senders.remove(to.name());
            return Err(transport_failure(to, source));
        }

        debug!(to = %to.name(), %message, "sent message");

        Ok(())
    }

    async fn sender(&self, channel: &ChannelId) -> Result<Arc<dyn Sender>, Error> {
        if let Some(sender) = self.inner.senders.get(channel.name()) {
            return Ok(Arc::clone(sender.value()));
        }

        let session = self.session().await?;
        let sender = session
            .create_sender(channel)
            .await
            .map_err(|source| transport_failure(channel, source))?;

        Ok(Arc::clone(
            self.inner
                .senders
                .entry(channel.name().to_string())
                .or_insert(sender)
                .value(),
        ))
    }

    async fn session(&self) -> Result<Arc<dyn Session>, Error> {
        if let Some(session) = self.inner.session.read().await.as_ref() {
            return Ok(Arc::clone(session));
        }

        let mut consumers = self.inner.consumers.lock().await;
        self.attached_session(&mut consumers).await
    }

    /// Returns the open session, opening one and recreating every detached
    /// consumer on it if there is none.
    async fn attached_session(
        &self,
        consumers: &mut Registrations,
    ) -> Result<Arc<dyn Session>, Error> {
        let mut slot = self.inner.session.write().await;
        if let Some(session) = slot.as_ref() {
            return Ok(Arc::clone(session));
        }

        let session = self.open_and_attach(consumers).await?;
        *slot = Some(Arc::clone(&session));

        Ok(session)
    }

    /// Opens a session and creates a consumer on it for every registration
    /// that lacks one. On failure the new session is closed and every
    /// registration is left detached.
    async fn open_and_attach(
        &self,
        consumers: &mut Registrations,
    ) -> Result<Arc<dyn Session>, Error> {
        let session = self.open_session().await?;

        let mut failure = None;
        let mut attached = 0;
        for registration in consumers.values_mut() {
            if registration.consumer.is_some() {
                continue;
            }

            match session
                .create_consumer(&registration.channel, Arc::clone(&registration.handler))
                .await
            {
                Ok(consumer) => {
                    registration.consumer = Some(consumer);
                    attached += 1;
                }
                Err(source) => {
                    failure = Some(transport_failure(&registration.channel, source));
                    break;
                }
            }
        }

        if let Some(error) = failure {
            detach(consumers).await;
            if let Err(close_error) = session.close().await {
                warn!(error = %close_error, "failed to close partially attached session");
            }
            return Err(error);
        }

        if attached > 0 {
            info!(listeners = attached, "listeners attached to new session");
        }

        Ok(session)
    }

    async fn open_session(&self) -> Result<Arc<dyn Session>, Error> {
        self.spawn_exception_watcher();

        let attempts = self.inner.settings.connect_attempts.max(1);
        let mut delay = self.inner.settings.retry_delay;
        let mut attempt = 1;

        loop {
            match self
                .inner
                .transport
                .connect(self.inner.exceptions.clone())
                .await
            {
                Ok(session) => {
                    info!(
                        transport = self.inner.transport.name(),
                        broker = %self.broker_address(),
                        "connected"
                    );
                    return Ok(session);
                }
                Err(error) if attempt < attempts => {
                    warn!(attempt, %error, ?delay, "connect failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(source) => {
                    return Err(Error::TransportFailure {
                        destination: self.broker_address(),
                        source,
                    });
                }
            }
        }
    }

    async fn reconnect(&self) -> Result<(), Error> {
        if self.inner.reconnecting.swap(true, Ordering::AcqRel) {
            debug!("reconnect already in progress");
            return Ok(());
        }

        let result = self.reopen_and_reregister().await;
        self.inner.reconnecting.store(false, Ordering::Release);

        result
    }

    async fn reopen_and_reregister(&self) -> Result<(), Error> {
        let mut consumers = self.inner.consumers.lock().await;
        let mut slot = self.inner.session.write().await;

        detach(&mut consumers).await;
        if let Some(old) = slot.take() {
            if let Err(error) = old.close().await {
                debug!(%error, "closing lost session failed");
            }
        }
        self.inner.senders.clear();

        let session = self.open_and_attach(&mut consumers).await?;

        *slot = Some(session);
        info!(listeners = consumers.len(), "reconnected");

        Ok(())
    }

    fn fail(&self, failure: &dyn fmt::Display) {
        match self.inner.settings.failure_policy {
            FailurePolicy::Terminate => {
                error!(%failure, "unrecoverable transport failure, terminating");
                std::process::exit(1);
            }
            FailurePolicy::LogOnly => {
                error!(%failure, "unrecoverable transport failure");
            }
        }
    }

    fn spawn_exception_watcher(&self) {
        let Some(mut receiver) = self.inner.exception_receiver.lock().take() else {
            return;
        };

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(exception) = receiver.recv().await {
                let Some(inner) = inner.upgrade() else {
                    break;
                };

                Connection { inner }.on_exception(exception).await;
            }

            debug!("exception watcher stopped");
        });
    }

    fn broker_address(&self) -> String {
        format!(
            "{}:{}",
            self.inner.settings.broker_host, self.inner.settings.broker_port
        )
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("transport", &self.inner.transport.name())
            .field("broker", &self.broker_address())
            .finish_non_exhaustive()
    }
}

/// Closes every consumer, leaving the registrations to be attached to the
/// next session.
async fn detach(consumers: &mut Registrations) {
    for (key, registration) in consumers.iter_mut() {
        if let Some(consumer) = registration.consumer.take() {
            if let Err(error) = consumer.close().await {
                debug!(channel = %key.channel, %error, "failed to close consumer");
            }
        }
    }
}

fn transport_failure(channel: &ChannelId, source: TransportError) -> Error {
    Error::TransportFailure {
        destination: channel.name().to_string(),
        source,
    }
}
