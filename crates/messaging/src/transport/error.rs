use thiserror::Error;

/// Errors reported by a transport, either returned from a call or pushed to
/// the connection's exception sink.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// No session could be established.
    #[error("could not connect: {0}")]
    ConnectionFailed(String),

    /// An established session was dropped by the broker.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The session was closed before the operation.
    #[error("session closed")]
    SessionClosed,

    /// The broker refused the destination name.
    #[error("invalid destination '{0}'")]
    InvalidDestination(String),

    /// Publishing failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Creating or closing a consumer failed.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// Anything else the broker reported.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether reconnecting can restore service.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}
