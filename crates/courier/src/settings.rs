use std::time::Duration;

use clap::Parser;
use courier_channels::{ChannelSettings, Replica};
use courier_messaging::{ConnectionSettings, FailurePolicy};

use crate::BrokerKind;

/// Messaging configuration, read from arguments or `COURIER_*` variables.
#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Settings {
    /// Environment name prefixed to every channel
    #[arg(long, default_value = "DEV", env = "COURIER_ENVIRONMENT_NAME")]
    pub environment_name: String,

    /// Replicas as ID=kind, kind being bitarchive or checksum
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "ONE=bitarchive",
        env = "COURIER_REPLICAS"
    )]
    pub replicas: Vec<Replica>,

    /// Replica this application works for
    #[arg(long, default_value = "ONE", env = "COURIER_USE_REPLICA_ID")]
    pub use_replica_id: String,

    /// Host identity used in per-application reply channels
    #[arg(long, default_value = "localhost", env = "COURIER_HOST_IDENTITY")]
    pub host_identity: String,

    /// Name of this application
    #[arg(long, default_value = "courier", env = "COURIER_APPLICATION_NAME")]
    pub application_name: String,

    /// Distinguishes several instances of the application on one host
    #[arg(long, default_value = "", env = "COURIER_APPLICATION_INSTANCE_ID")]
    pub application_instance_id: String,

    /// Broker implementation
    #[arg(long, value_enum, default_value_t = BrokerKind::Memory, env = "COURIER_BROKER")]
    pub broker: BrokerKind,

    /// Broker host
    #[arg(long, default_value = "localhost", env = "COURIER_BROKER_HOST")]
    pub broker_host: String,

    /// Broker port
    #[arg(long, default_value_t = 4222, env = "COURIER_BROKER_PORT")]
    pub broker_port: u16,

    /// Milliseconds to wait for a reply, 0 waiting forever
    #[arg(long, default_value_t = 60_000, env = "COURIER_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Attempts at opening a broker session
    #[arg(long, default_value_t = 3, env = "COURIER_CONNECT_ATTEMPTS")]
    pub connect_attempts: u32,

    /// Milliseconds before the first reconnect attempt, doubled afterwards
    #[arg(long, default_value_t = 1000, env = "COURIER_RETRY_DELAY_MS")]
    pub retry_delay_ms: u64,

    /// What to do on unrecoverable transport failures: terminate or log-only
    #[arg(long, default_value = "terminate", env = "COURIER_FAILURE_POLICY")]
    pub failure_policy: FailurePolicy,
}

impl Settings {
    /// The part of the settings channel names are derived from.
    #[must_use]
    pub fn channel_settings(&self) -> ChannelSettings {
        ChannelSettings {
            environment_name: self.environment_name.clone(),
            replicas: self.replicas.clone(),
            use_replica_id: self.use_replica_id.clone(),
            host_identity: self.host_identity.clone(),
            application_instance_id: self.application_instance_id.clone(),
        }
    }

    /// The part of the settings the connection uses.
    #[must_use]
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            broker_host: self.broker_host.clone(),
            broker_port: self.broker_port,
            connect_attempts: self.connect_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            failure_policy: self.failure_policy,
        }
    }
}
