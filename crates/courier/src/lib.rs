//! Process-level wiring of the messaging core.
//!
//! [`Settings`] gathers configuration from the command line and environment,
//! [`transport_for`] picks the broker implementation and [`MessagingContext`]
//! owns the one connection and channel registry of the process.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod context;
mod error;
mod factory;
mod settings;

pub use context::MessagingContext;
pub use error::Error;
pub use factory::{BrokerKind, transport_for};
pub use settings::Settings;

pub use courier_channels::{ChannelId, ChannelRegistry, Channels, Replica, ReplicaKind};
pub use courier_messaging::{Connection, Message, MessageListener, Synchronizer};
