//! Point-to-point and publish/subscribe messaging over a pluggable broker.
//!
//! A [`Connection`] sends [`Message`] envelopes to channels and delivers
//! incoming messages to registered [`MessageListener`]s. The broker underneath
//! is anything implementing the traits in [`transport`].
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod connection;
mod error;
mod listener;
mod message;
mod synchronizer;

/// The boundary between the connection and a concrete broker.
pub mod transport;

pub use connection::{Connection, ConnectionSettings, FailurePolicy};
pub use error::Error;
pub use listener::MessageListener;
pub use message::Message;
pub use synchronizer::Synchronizer;

pub use courier_channels::ChannelId;
