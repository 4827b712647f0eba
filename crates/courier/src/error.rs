use thiserror::Error;

/// Errors from setting up or using the messaging context.
#[derive(Debug, Error)]
pub enum Error {
    /// Channel derivation failed.
    #[error(transparent)]
    Channels(#[from] courier_channels::Error),

    /// The connection failed.
    #[error(transparent)]
    Messaging(#[from] courier_messaging::Error),
}
