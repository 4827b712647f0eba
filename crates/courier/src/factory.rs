use std::fmt;
use std::sync::Arc;

use clap::ValueEnum;
use courier_messaging::transport::Transport;
use courier_messaging_memory::MemoryTransport;
use courier_messaging_nats::{NatsTransport, NatsTransportOptions};
use tracing::debug;

use crate::Settings;

/// The broker implementations a process can be configured with.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum BrokerKind {
    /// In-process broker, for tests and single-process setups.
    #[default]
    Memory,

    /// A NATS server.
    Nats,
}

impl fmt::Display for BrokerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Nats => write!(f, "nats"),
        }
    }
}

/// Builds the transport selected by `settings`.
#[must_use]
pub fn transport_for(settings: &Settings) -> Arc<dyn Transport> {
    debug!(broker = %settings.broker, "creating transport");

    match settings.broker {
        BrokerKind::Memory => Arc::new(MemoryTransport::new()),
        BrokerKind::Nats => Arc::new(NatsTransport::new(NatsTransportOptions {
            client_name: Some(settings.application_name.clone()),
            ..NatsTransportOptions::for_address(&settings.broker_host, settings.broker_port)
        })),
    }
}
