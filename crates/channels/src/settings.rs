use crate::Replica;

/// Configuration values channel names are derived from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChannelSettings {
    /// Name of the environment, the first part of every channel name.
    pub environment_name: String,

    /// Every replica known to the installation.
    pub replicas: Vec<Replica>,

    /// Identifier of the replica this process works for.
    pub use_replica_id: String,

    /// Identity of the host, used for per-application reply channels.
    pub host_identity: String,

    /// Instance id distinguishing applications on the same host.
    pub application_instance_id: String,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            environment_name: "DEV".to_string(),
            replicas: vec![Replica::bit_archive("ONE")],
            use_replica_id: "ONE".to_string(),
            host_identity: "localhost".to_string(),
            application_instance_id: String::new(),
        }
    }
}
