use thiserror::Error;

/// Errors raised while deriving or resolving channels.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// A configuration value or lookup argument is malformed.
    #[error("argument not valid: {0}")]
    ArgumentNotValid(String),

    /// The requested role or replica cannot be resolved from the current configuration.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
}
