use std::fmt;
use std::ptr;

use bytes::Bytes;
use courier_channels::ChannelId;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Envelope carrying addressing and correlation metadata around a payload.
///
/// The id is assigned by the connection the first time the message is sent
/// and never changes afterwards.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Message {
    to: ChannelId,
    reply_to: ChannelId,
    id: Option<String>,
    reply_of_id: Option<String>,
    ok: bool,
    err_msg: Option<String>,
    kind: String,
    payload: Bytes,
}

impl Message {
    /// Creates an unsent message with an empty payload.
    pub fn new(to: ChannelId, reply_to: ChannelId, kind: impl Into<String>) -> Self {
        Self {
            to,
            reply_to,
            id: None,
            reply_of_id: None,
            ok: true,
            err_msg: None,
            kind: kind.into(),
            payload: Bytes::new(),
        }
    }

    /// Sets the application payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Marks the message as a reply to the message with id `id`.
    #[must_use]
    pub fn in_reply_to(mut self, id: impl Into<String>) -> Self {
        self.reply_of_id = Some(id.into());
        self
    }

    /// Destination of the message.
    #[must_use]
    pub const fn to(&self) -> &ChannelId {
        &self.to
    }

    /// Where replies should be sent.
    #[must_use]
    pub const fn reply_to(&self) -> &ChannelId {
        &self.reply_to
    }

    /// The assigned id, or the empty string before the first send.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Whether an id has been assigned.
    #[must_use]
    pub const fn has_been_sent(&self) -> bool {
        self.id.is_some()
    }

    /// Id of the message this one answers.
    #[must_use]
    pub fn reply_of_id(&self) -> Option<&str> {
        self.reply_of_id.as_deref()
    }

    /// Label describing what the message is about.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The application payload.
    #[must_use]
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Whether processing succeeded so far.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.ok
    }

    /// Accumulated failure reasons, if the message is not ok.
    #[must_use]
    pub fn err_msg(&self) -> Option<&str> {
        self.err_msg.as_deref()
    }

    /// Marks the message as failed. Reasons from repeated calls are kept,
    /// one per line.
    pub fn set_not_ok(&mut self, reason: impl Into<String>) {
        let reason = reason.into();

        self.ok = false;
        self.err_msg = Some(match self.err_msg.take() {
            Some(previous) => format!("{previous}\n{reason}"),
            None => reason,
        });
    }

    /// Assigns `id` unless the message already has one.
    ///
    /// Only the connection calls this outside tests.
    #[doc(hidden)]
    pub fn update_id(&mut self, id: impl Into<String>) {
        if self.id.is_none() {
            self.id = Some(id.into());
        }
    }

    pub(crate) fn set_reply_of_id(&mut self, id: String) {
        self.reply_of_id = Some(id);
    }

    /// Serializes the envelope for the wire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if encoding fails.
    pub fn pack(&self) -> Result<Bytes, Error> {
        let mut buffer = Vec::new();
        ciborium::ser::into_writer(self, &mut buffer)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        Ok(Bytes::from(buffer))
    }

    /// Restores an envelope from wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentNotValid`] if the bytes are not a packed message.
    pub fn unpack(bytes: &[u8]) -> Result<Self, Error> {
        ciborium::de::from_reader(bytes)
            .map_err(|e| Error::ArgumentNotValid(format!("invalid message payload: {e}")))
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a == b,
            _ => ptr::eq(self, other),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} id={:?} to={} reply_to={}",
            self.kind,
            self.id(),
            self.to.name(),
            self.reply_to.name()
        )?;

        if let Some(reply_of_id) = &self.reply_of_id {
            write!(f, " reply_of={reply_of_id:?}")?;
        }

        match &self.err_msg {
            Some(err_msg) if !self.ok => write!(f, " not ok: {err_msg}"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message::new(
            ChannelId::new("TEST_COMMON_THE_REPOS").unwrap(),
            ChannelId::new("TEST_COMMON_THIS_REPOS_CLIENT_host").unwrap(),
            "GetFileMessage",
        )
    }

    #[test]
    fn test_id_empty_before_send() {
        let msg = message();

        assert_eq!(msg.id(), "");
        assert!(!msg.has_been_sent());
    }

    #[test]
    fn test_update_id_only_once() {
        let mut msg = message();

        msg.update_id("first");
        msg.update_id("second");

        assert_eq!(msg.id(), "first");
        assert!(msg.has_been_sent());
    }

    #[test]
    fn test_equality_by_id() {
        let mut a = message();
        let mut b = message().with_payload("other");
        assert_ne!(a, b);

        a.update_id("same");
        b.update_id("same");
        assert_eq!(a, b);

        let c = message();
        assert_ne!(a, c);
    }

    #[test]
    fn test_set_not_ok_accumulates() {
        let mut msg = message();
        assert!(msg.is_ok());
        assert_eq!(msg.err_msg(), None);

        msg.set_not_ok("file missing");
        msg.set_not_ok("checksum mismatch");

        assert!(!msg.is_ok());
        assert_eq!(msg.err_msg(), Some("file missing\nchecksum mismatch"));
    }

    #[test]
    fn test_pack_unpack() {
        let mut msg = message().with_payload("payload").in_reply_to("request");
        msg.update_id("reply");
        msg.set_not_ok("failed");

        let unpacked = Message::unpack(&msg.pack().unwrap()).unwrap();

        assert_eq!(unpacked, msg);
        assert_eq!(unpacked.to(), msg.to());
        assert_eq!(unpacked.reply_of_id(), Some("request"));
        assert_eq!(unpacked.payload(), &Bytes::from("payload"));
        assert_eq!(unpacked.err_msg(), Some("failed"));
    }

    #[test]
    fn test_unpack_garbage() {
        assert!(matches!(
            Message::unpack(b"not a message"),
            Err(Error::ArgumentNotValid(_))
        ));
    }
}
