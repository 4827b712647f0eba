use std::collections::HashMap;
use std::str::FromStr;

use crate::{COMMON_LOCATION, ChannelId, ChannelSettings, Error, Replica, ReplicaKind, SEPARATOR};

const ALL_BA: &str = "ALL_BA";
const ANY_BA: &str = "ANY_BA";
const THE_BAMON: &str = "THE_BAMON";
const THE_CR: &str = "THE_CR";
const THE_SCHED: &str = "THE_SCHED";
const THE_REPOS: &str = "THE_REPOS";
const ANY_LOWPRIORITY_HACO: &str = "ANY_LOWPRIORITY_HACO";
const ANY_HIGHPRIORITY_HACO: &str = "ANY_HIGHPRIORITY_HACO";
const THIS_HACO: &str = "THIS_HACO";
const THIS_REPOS_CLIENT: &str = "THIS_REPOS_CLIENT";
const ERROR: &str = "ERROR";
const INDEX_SERVER: &str = "INDEX_SERVER";
const THIS_INDEX_CLIENT: &str = "THIS_INDEX_CLIENT";
const MONITOR: &str = "MONITOR";

/// Priority of a harvest job, selecting which harvester pool receives it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HarvestPriority {
    /// Selective and event harvests.
    High,

    /// Snapshot harvests.
    Low,
}

impl FromStr for HarvestPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HIGH" | "HIGHPRIORITY" => Ok(Self::High),
            "LOW" | "LOWPRIORITY" => Ok(Self::Low),
            other => Err(Error::UnknownChannel(format!(
                "no harvester channel for priority '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
enum ReplicaChannels {
    BitArchive {
        all_ba: ChannelId,
        any_ba: ChannelId,
        the_bamon: ChannelId,
    },
    Checksum {
        the_cr: ChannelId,
    },
}

impl ReplicaChannels {
    fn identification(&self) -> &ChannelId {
        match self {
            Self::BitArchive { the_bamon, .. } => the_bamon,
            Self::Checksum { the_cr } => the_cr,
        }
    }
}

/// A consistent snapshot of every channel derivable from one configuration.
#[derive(Clone, Debug)]
pub struct Channels {
    replicas: Vec<Replica>,
    in_use: Replica,
    per_replica: HashMap<String, ReplicaChannels>,
    the_sched: ChannelId,
    the_repos: ChannelId,
    any_low_priority_haco: ChannelId,
    any_high_priority_haco: ChannelId,
    this_haco: ChannelId,
    this_repos_client: ChannelId,
    error: ChannelId,
    the_index_server: ChannelId,
    this_index_client: ChannelId,
    the_monitor_server: ChannelId,
}

struct NameBuilder<'a> {
    environment: &'a str,
    application_suffix: String,
}

impl NameBuilder<'_> {
    fn build(&self, location: &str, role: &str, per_application: bool) -> Result<ChannelId, Error> {
        let mut name = [self.environment, location, role].join(SEPARATOR);

        if per_application && !self.application_suffix.is_empty() {
            name.push_str(SEPARATOR);
            name.push_str(&self.application_suffix);
        }

        ChannelId::new(name)
    }

    fn common(&self, role: &str) -> Result<ChannelId, Error> {
        self.build(COMMON_LOCATION, role, false)
    }
}

fn sanitize(part: &str) -> String {
    part.trim()
        .chars()
        .map(|c| if c == '.' || c.is_whitespace() { '-' } else { c })
        .collect()
}

impl Channels {
    /// Derives all channels from `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentNotValid`] for an empty environment name or a
    /// malformed replica list, and [`Error::UnknownChannel`] if the replica in
    /// use is not configured.
    pub fn build(settings: &ChannelSettings) -> Result<Self, Error> {
        let environment = settings.environment_name.trim();
        if environment.is_empty() {
            return Err(Error::ArgumentNotValid(
                "environment name must not be empty".to_string(),
            ));
        }

        let mut per_replica = HashMap::with_capacity(settings.replicas.len());

        let application_suffix = [
            sanitize(&settings.host_identity),
            sanitize(&settings.application_instance_id),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(SEPARATOR);

        let names = NameBuilder {
            environment,
            application_suffix,
        };

        for replica in &settings.replicas {
            if replica.id().trim().is_empty() {
                return Err(Error::ArgumentNotValid("empty replica id".to_string()));
            }

            let channels = match replica.kind() {
                ReplicaKind::BitArchive => ReplicaChannels::BitArchive {
                    all_ba: names.build(replica.id(), ALL_BA, false)?,
                    any_ba: names.build(replica.id(), ANY_BA, false)?,
                    the_bamon: names.build(replica.id(), THE_BAMON, false)?,
                },
                ReplicaKind::Checksum => ReplicaChannels::Checksum {
                    the_cr: names.build(replica.id(), THE_CR, false)?,
                },
            };

            if per_replica.insert(replica.id().to_string(), channels).is_some() {
                return Err(Error::ArgumentNotValid(format!(
                    "replica '{}' is configured twice",
                    replica.id()
                )));
            }
        }

        let in_use = settings
            .replicas
            .iter()
            .find(|replica| replica.id() == settings.use_replica_id)
            .cloned()
            .ok_or_else(|| {
                Error::UnknownChannel(format!(
                    "replica in use '{}' is not one of the configured replicas",
                    settings.use_replica_id
                ))
            })?;

        Ok(Self {
            replicas: settings.replicas.clone(),
            in_use,
            per_replica,
            the_sched: names.common(THE_SCHED)?,
            the_repos: names.common(THE_REPOS)?,
            any_low_priority_haco: names.common(ANY_LOWPRIORITY_HACO)?,
            any_high_priority_haco: names.common(ANY_HIGHPRIORITY_HACO)?,
            this_haco: names.build(COMMON_LOCATION, THIS_HACO, true)?,
            this_repos_client: names.build(COMMON_LOCATION, THIS_REPOS_CLIENT, true)?,
            error: names.common(ERROR)?,
            the_index_server: names.common(INDEX_SERVER)?,
            this_index_client: names.build(COMMON_LOCATION, THIS_INDEX_CLIENT, true)?,
            the_monitor_server: names.common(MONITOR)?,
        })
    }

    /// Every configured replica.
    #[must_use]
    pub fn replicas(&self) -> &[Replica] {
        &self.replicas
    }

    /// The replica this process works for.
    #[must_use]
    pub const fn replica_in_use(&self) -> &Replica {
        &self.in_use
    }

    /// The harvest scheduler.
    #[must_use]
    pub const fn the_sched(&self) -> &ChannelId {
        &self.the_sched
    }

    /// The central repository.
    #[must_use]
    pub const fn the_repos(&self) -> &ChannelId {
        &self.the_repos
    }

    /// Pool of harvesters taking low priority jobs.
    #[must_use]
    pub const fn any_low_priority_haco(&self) -> &ChannelId {
        &self.any_low_priority_haco
    }

    /// Pool of harvesters taking high priority jobs.
    #[must_use]
    pub const fn any_high_priority_haco(&self) -> &ChannelId {
        &self.any_high_priority_haco
    }

    /// The harvester pool for `priority`.
    #[must_use]
    pub const fn any_haco_for(&self, priority: HarvestPriority) -> &ChannelId {
        match priority {
            HarvestPriority::High => &self.any_high_priority_haco,
            HarvestPriority::Low => &self.any_low_priority_haco,
        }
    }

    /// Queue on which this harvester receives replies from the repository.
    #[must_use]
    pub const fn this_haco(&self) -> &ChannelId {
        &self.this_haco
    }

    /// Reply channel of this application towards the repository.
    #[must_use]
    pub const fn this_repos_client(&self) -> &ChannelId {
        &self.this_repos_client
    }

    /// Where undeliverable or failed messages are routed.
    #[must_use]
    pub const fn error(&self) -> &ChannelId {
        &self.error
    }

    /// The index server.
    #[must_use]
    pub const fn the_index_server(&self) -> &ChannelId {
        &self.the_index_server
    }

    /// Reply channel of this application towards the index server.
    #[must_use]
    pub const fn this_index_client(&self) -> &ChannelId {
        &self.this_index_client
    }

    /// The monitor server.
    #[must_use]
    pub const fn the_monitor_server(&self) -> &ChannelId {
        &self.the_monitor_server
    }

    /// Broadcast to all bit-archive workers of the replica in use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChannel`] if the replica in use is not a bit-archive replica.
    pub fn all_ba(&self) -> Result<&ChannelId, Error> {
        self.bit_archive(self.in_use.id()).map(|(all_ba, _, _)| all_ba)
    }

    /// Any one bit-archive worker of the replica in use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChannel`] if the replica in use is not a bit-archive replica.
    pub fn any_ba(&self) -> Result<&ChannelId, Error> {
        self.bit_archive(self.in_use.id()).map(|(_, any_ba, _)| any_ba)
    }

    /// The bit-archive monitor of the replica in use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChannel`] if the replica in use is not a bit-archive replica.
    pub fn the_bamon(&self) -> Result<&ChannelId, Error> {
        self.bamon_for_replica(self.in_use.id())
    }

    /// The checksum replica in use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChannel`] if the replica in use is not a checksum replica.
    pub fn the_cr(&self) -> Result<&ChannelId, Error> {
        self.cr_for_replica(self.in_use.id())
    }

    /// The bit-archive monitor of replica `replica_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChannel`] if the replica is unknown or not a bit-archive replica.
    pub fn bamon_for_replica(&self, replica_id: &str) -> Result<&ChannelId, Error> {
        self.bit_archive(replica_id).map(|(_, _, the_bamon)| the_bamon)
    }

    /// The checksum channel of replica `replica_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChannel`] if the replica is unknown or not a checksum replica.
    pub fn cr_for_replica(&self, replica_id: &str) -> Result<&ChannelId, Error> {
        match self.replica_channels(replica_id)? {
            ReplicaChannels::Checksum { the_cr } => Ok(the_cr),
            ReplicaChannels::BitArchive { .. } => Err(Error::UnknownChannel(format!(
                "replica '{replica_id}' is not a checksum replica"
            ))),
        }
    }

    /// `ALL_BA` topics of every bit-archive replica.
    #[must_use]
    pub fn all_ba_for_all_replicas(&self) -> Vec<&ChannelId> {
        self.collect_bit_archive(|(all_ba, _, _)| all_ba)
    }

    /// `ANY_BA` queues of every bit-archive replica.
    #[must_use]
    pub fn any_ba_for_all_replicas(&self) -> Vec<&ChannelId> {
        self.collect_bit_archive(|(_, any_ba, _)| any_ba)
    }

    /// Monitor queues of every bit-archive replica.
    #[must_use]
    pub fn bamons_for_all_replicas(&self) -> Vec<&ChannelId> {
        self.collect_bit_archive(|(_, _, the_bamon)| the_bamon)
    }

    /// Queues of every checksum replica.
    #[must_use]
    pub fn crs_for_all_replicas(&self) -> Vec<&ChannelId> {
        self.replicas
            .iter()
            .filter_map(|replica| self.cr_for_replica(replica.id()).ok())
            .collect()
    }

    /// The channel identifying replica `replica_id`: its monitor for a
    /// bit-archive replica, its checksum queue otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChannel`] if the replica is unknown.
    pub fn identification_channel(&self, replica_id: &str) -> Result<&ChannelId, Error> {
        self.replica_channels(replica_id)
            .map(ReplicaChannels::identification)
    }

    /// Finds the replica whose identification channel is named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChannel`] if no replica is identified by `name`.
    pub fn replica_for_identification_channel(&self, name: &str) -> Result<&Replica, Error> {
        self.replicas
            .iter()
            .find(|replica| {
                self.per_replica
                    .get(replica.id())
                    .is_some_and(|channels| channels.identification().name() == name)
            })
            .ok_or_else(|| {
                Error::UnknownChannel(format!("'{name}' does not identify any replica"))
            })
    }

    fn replica_channels(&self, replica_id: &str) -> Result<&ReplicaChannels, Error> {
        self.per_replica
            .get(replica_id)
            .ok_or_else(|| Error::UnknownChannel(format!("unknown replica '{replica_id}'")))
    }

    fn bit_archive(&self, replica_id: &str) -> Result<(&ChannelId, &ChannelId, &ChannelId), Error> {
        match self.replica_channels(replica_id)? {
            ReplicaChannels::BitArchive {
                all_ba,
                any_ba,
                the_bamon,
            } => Ok((all_ba, any_ba, the_bamon)),
            ReplicaChannels::Checksum { .. } => Err(Error::UnknownChannel(format!(
                "replica '{replica_id}' is not a bit-archive replica"
            ))),
        }
    }

    fn collect_bit_archive<'a>(
        &'a self,
        pick: impl Fn((&'a ChannelId, &'a ChannelId, &'a ChannelId)) -> &'a ChannelId,
    ) -> Vec<&'a ChannelId> {
        self.replicas
            .iter()
            .filter_map(|replica| self.bit_archive(replica.id()).ok())
            .map(pick)
            .collect()
    }
}
