use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the connection and the synchronizer.
#[derive(Debug, Error)]
pub enum Error {
    /// An argument or payload was invalid.
    #[error("argument not valid: {0}")]
    ArgumentNotValid(String),

    /// The operation is not allowed in the current state.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A channel could not be resolved.
    #[error(transparent)]
    Channel(#[from] courier_channels::Error),

    /// The envelope could not be encoded.
    #[error("failed to serialize message: {0}")]
    Serialization(String),

    /// The transport failed while talking to `destination`.
    #[error("transport failure on '{destination}': {source}")]
    TransportFailure {
        /// The channel or broker the operation addressed.
        destination: String,

        /// The underlying transport error.
        #[source]
        source: TransportError,
    },
}
