use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, is_topic};

/// Identifies a logical channel, either a queue or a topic.
///
/// Two ids with the same name always denote the same channel, so equality and
/// hashing look at the name and kind only.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ChannelId {
    name: String,
    is_topic: bool,
}

impl ChannelId {
    /// Creates a channel id from a complete channel name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentNotValid`] if the name is empty.
    pub fn new(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(Error::ArgumentNotValid(
                "channel name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            is_topic: is_topic(&name),
            name,
        })
    }

    /// The derived channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether every listener receives each message.
    #[must_use]
    pub const fn is_topic(&self) -> bool {
        self.is_topic
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_topic { "topic" } else { "queue" };
        write!(f, "{} ({kind})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_name() {
        let topic = ChannelId::new("PROD_ONE_ALL_BA").unwrap();
        assert!(topic.is_topic());

        let queue = ChannelId::new("PROD_ONE_ANY_BA").unwrap();
        assert!(!queue.is_topic());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(
            ChannelId::new("  "),
            Err(Error::ArgumentNotValid(_))
        ));
    }

    #[test]
    fn test_serde_round_trip() {
        let channel = ChannelId::new("PROD_ONE_ALL_BA").unwrap();

        let json = serde_json::to_string(&channel).unwrap();
        let decoded: ChannelId = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, channel);
        assert_eq!(decoded.name(), channel.name());
        assert_eq!(decoded.is_topic(), channel.is_topic());
    }
}
