use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{ChannelSettings, Channels, Error};

/// Process-wide cache of the derived channel set.
///
/// Channels are derived on first use and handed out as a shared snapshot, so
/// repeated lookups return identical ids until [`ChannelRegistry::reset`] is
/// called. Changing the settings alone never changes the derived names.
#[derive(Debug)]
pub struct ChannelRegistry {
    settings: RwLock<ChannelSettings>,
    current: RwLock<Option<Arc<Channels>>>,
}

impl ChannelRegistry {
    /// Creates a registry deriving channels from `settings`.
    #[must_use]
    pub fn new(settings: ChannelSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            current: RwLock::new(None),
        }
    }

    /// The settings the next derivation will use.
    #[must_use]
    pub fn settings(&self) -> ChannelSettings {
        self.settings.read().clone()
    }

    /// Replaces the settings. Takes effect at the next [`Self::reset`].
    pub fn update_settings(&self, settings: ChannelSettings) {
        *self.settings.write() = settings;
    }

    /// Returns the current channel snapshot, deriving it if needed.
    ///
    /// # Errors
    ///
    /// Returns the derivation error if the settings are invalid. Nothing is
    /// cached in that case, so a later call retries.
    pub fn channels(&self) -> Result<Arc<Channels>, Error> {
        if let Some(channels) = self.current.read().as_ref() {
            return Ok(Arc::clone(channels));
        }

        let mut current = self.current.write();
        if let Some(channels) = current.as_ref() {
            return Ok(Arc::clone(channels));
        }

        let settings = self.settings.read().clone();
        let channels = Arc::new(Channels::build(&settings)?);
        debug!(
            environment = %settings.environment_name,
            replica = %settings.use_replica_id,
            "derived channels"
        );

        *current = Some(Arc::clone(&channels));
        Ok(channels)
    }

    /// Drops the cached snapshot so the next lookup derives channels from the
    /// current settings.
    ///
    /// Ids already handed out stay valid values and keep comparing by name.
    pub fn reset(&self) {
        info!("resetting channel registry");
        *self.current.write() = None;
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(ChannelSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Replica;

    fn settings() -> ChannelSettings {
        ChannelSettings {
            environment_name: "TEST".to_string(),
            replicas: vec![Replica::bit_archive("ONE"), Replica::bit_archive("TWO")],
            use_replica_id: "ONE".to_string(),
            ..ChannelSettings::default()
        }
    }

    #[test]
    fn test_identity_stable_until_reset() {
        let _ = tracing_subscriber::fmt::try_init();

        let registry = ChannelRegistry::new(settings());

        let first = registry.channels().unwrap().the_bamon().unwrap().clone();
        let second = registry.channels().unwrap().the_bamon().unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(first.name(), "TEST_ONE_THE_BAMON");

        registry.update_settings(ChannelSettings {
            use_replica_id: "TWO".to_string(),
            ..settings()
        });

        // Not visible before reset.
        assert_eq!(registry.channels().unwrap().the_bamon().unwrap(), &first);

        registry.reset();

        let changed = registry.channels().unwrap().the_bamon().unwrap().clone();
        assert_eq!(changed.name(), "TEST_TWO_THE_BAMON");
        assert_ne!(changed, first);
        assert_eq!(registry.channels().unwrap().the_bamon().unwrap(), &changed);
    }

    #[test]
    fn test_failed_derivation_is_not_cached() {
        let registry = ChannelRegistry::new(ChannelSettings {
            use_replica_id: "NOWHERE".to_string(),
            ..settings()
        });

        assert!(matches!(registry.channels(), Err(Error::UnknownChannel(_))));
        assert!(matches!(registry.channels(), Err(Error::UnknownChannel(_))));

        registry.update_settings(settings());
        registry.reset();

        assert_eq!(
            registry.channels().unwrap().any_ba().unwrap().name(),
            "TEST_ONE_ANY_BA"
        );
    }

    #[test]
    fn test_old_snapshot_survives_reset() {
        let registry = ChannelRegistry::new(settings());
        let old = registry.channels().unwrap();

        registry.update_settings(ChannelSettings {
            environment_name: "OTHER".to_string(),
            ..settings()
        });
        registry.reset();

        assert_eq!(old.the_repos().name(), "TEST_COMMON_THE_REPOS");
        assert_eq!(
            registry.channels().unwrap().the_repos().name(),
            "OTHER_COMMON_THE_REPOS"
        );
    }
}
