//! Channel addressing for the messaging core.
//!
//! Every logical destination is a [`ChannelId`] whose name is derived from the
//! environment name, the replica (or `COMMON`) location, the channel role and,
//! for reply channels, the host and application instance. A [`ChannelRegistry`]
//! caches the derived set until it is explicitly reset.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod channel_id;
mod channels;
mod error;
mod registry;
mod replica;
mod settings;

pub use channel_id::ChannelId;
pub use channels::{Channels, HarvestPriority};
pub use error::Error;
pub use registry::ChannelRegistry;
pub use replica::{Replica, ReplicaKind};
pub use settings::ChannelSettings;

/// Marker that makes a channel name a topic.
const TOPIC_MARKER: &str = "_ALL_";

/// Separator between the parts of a channel name.
pub const SEPARATOR: &str = "_";

/// Location used for channels that are not bound to a replica.
pub const COMMON_LOCATION: &str = "COMMON";

/// Returns `true` if `name` denotes a publish/subscribe topic.
///
/// Classification depends on the name only, so transports can route a
/// destination without holding a [`ChannelId`].
#[must_use]
pub fn is_topic(name: &str) -> bool {
    name.contains(TOPIC_MARKER)
}
