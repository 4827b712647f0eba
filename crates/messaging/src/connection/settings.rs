use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What the connection does when the transport fails beyond recovery.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FailurePolicy {
    /// Log the failure and exit the process.
    #[default]
    Terminate,

    /// Log the failure and keep running.
    LogOnly,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => write!(f, "terminate"),
            Self::LogOnly => write!(f, "log-only"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "terminate" => Ok(Self::Terminate),
            "log-only" | "log_only" | "log" => Ok(Self::LogOnly),
            other => Err(format!("unknown failure policy '{other}'")),
        }
    }
}

/// Options for a [`crate::Connection`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectionSettings {
    /// Broker host.
    pub broker_host: String,

    /// Broker port.
    pub broker_port: u16,

    /// How many times opening a session is attempted.
    pub connect_attempts: u32,

    /// Delay before the first retry; doubled for every further retry.
    pub retry_delay: Duration,

    /// Handling of unrecoverable transport failures.
    pub failure_policy: FailurePolicy,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 4222,
            connect_attempts: 3,
            retry_delay: Duration::from_secs(1),
            failure_policy: FailurePolicy::default(),
        }
    }
}
