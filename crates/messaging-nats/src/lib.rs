//! NATS implementation of the messaging transport.
//!
//! Channel names are used verbatim as subjects. Queue channels subscribe in
//! a queue group named after the channel so each message reaches one member;
//! topic channels use plain subscriptions.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod session;

use std::sync::Arc;
use std::time::Duration;

use async_nats::{ConnectOptions, Event};
use async_trait::async_trait;
use courier_messaging::transport::{ExceptionSink, Session, Transport, TransportError};
use tracing::{debug, info, warn};

use crate::session::NatsSession;

/// Options for [`NatsTransport`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NatsTransportOptions {
    /// Server to connect to, e.g. `nats://localhost:4222`.
    pub server_url: String,

    /// How long a connection attempt may take.
    pub connection_timeout: Duration,

    /// Client name reported to the server.
    pub client_name: Option<String>,
}

impl NatsTransportOptions {
    /// Options for the server at `host:port`.
    #[must_use]
    pub fn for_address(host: &str, port: u16) -> Self {
        Self {
            server_url: format!("nats://{host}:{port}"),
            ..Self::default()
        }
    }
}

impl Default for NatsTransportOptions {
    fn default() -> Self {
        Self {
            server_url: "nats://localhost:4222".to_string(),
            connection_timeout: Duration::from_secs(5),
            client_name: None,
        }
    }
}

/// A transport backed by a NATS server.
#[derive(Clone, Debug)]
pub struct NatsTransport {
    options: NatsTransportOptions,
}

impl NatsTransport {
    /// Creates a transport. Nothing is connected until a session is opened.
    #[must_use]
    pub const fn new(options: NatsTransportOptions) -> Self {
        Self { options }
    }

    /// The options this transport connects with.
    #[must_use]
    pub const fn options(&self) -> &NatsTransportOptions {
        &self.options
    }
}

/// Maps client events onto the exception sink. Disconnects are left to the
/// client's own reconnect logic; only a closed client is reported as lost.
fn forward_event(event: &Event, exceptions: &ExceptionSink) {
    let exception = match event {
        Event::Closed => TransportError::ConnectionLost("nats client closed".to_string()),
        Event::ServerError(error) => TransportError::Other(format!("server error: {error}")),
        Event::ClientError(error) => TransportError::Other(format!("client error: {error}")),
        Event::Disconnected => {
            warn!("disconnected from nats server");
            return;
        }
        other => {
            debug!(event = %other, "nats event");
            return;
        }
    };

    if exceptions.send(exception).is_err() {
        debug!(%event, "connection gone, dropping nats event");
    }
}

#[async_trait]
impl Transport for NatsTransport {
    fn name(&self) -> &'static str {
        "nats"
    }

    async fn connect(
        &self,
        exceptions: ExceptionSink,
    ) -> Result<Arc<dyn Session>, TransportError> {
        let mut options = ConnectOptions::new()
            .connection_timeout(self.options.connection_timeout)
            .event_callback(move |event| {
                let exceptions = exceptions.clone();
                async move { forward_event(&event, &exceptions) }
            });

        if let Some(name) = &self.options.client_name {
            options = options.name(name);
        }

        let client = async_nats::connect_with_options(&self.options.server_url, options)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!(server = %self.options.server_url, "connected to nats");

        Ok(Arc::new(NatsSession::new(client)))
    }
}
