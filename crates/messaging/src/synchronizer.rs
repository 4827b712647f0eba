use std::mem;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::connection::assign_id;
use crate::{Connection, Error, Message, MessageListener};

#[derive(Debug)]
enum State {
    Idle,
    Waiting {
        request_id: String,
        reply: oneshot::Sender<Message>,
    },
    Replied,
    TimedOut,
    Failed,
}

/// Turns an asynchronous send and listen into one awaited request/reply
/// exchange.
///
/// Register the synchronizer on the request's reply channel before calling
/// [`Synchronizer::send_and_wait_for_one_reply`]. Each instance serves a
/// single exchange.
#[derive(Debug)]
pub struct Synchronizer {
    connection: Connection,
    state: Mutex<State>,
}

impl Synchronizer {
    /// Creates a synchronizer sending through `connection`.
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            state: Mutex::new(State::Idle),
        }
    }

    /// Sends `message` and waits for the reply correlated with its id.
    ///
    /// A `timeout_ms` of zero waits indefinitely. Replies correlated with
    /// other ids are ignored.
    ///
    /// Returns `Ok(None)` if no matching reply arrived in time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] if this synchronizer was already
    /// used, or the error of the underlying send.
    pub async fn send_and_wait_for_one_reply(
        &self,
        message: &mut Message,
        timeout_ms: u64,
    ) -> Result<Option<Message>, Error> {
        let (reply, receiver) = oneshot::channel();

        {
            let mut state = self.state.lock();
            if !matches!(*state, State::Idle) {
                return Err(Error::PermissionDenied(
                    "a synchronizer serves a single exchange".to_string(),
                ));
            }

            assign_id(message);
            *state = State::Waiting {
                request_id: message.id().to_string(),
                reply,
            };
        }

        if let Err(error) = self.connection.send(message).await {
            *self.state.lock() = State::Failed;
            return Err(error);
        }

        let received = if timeout_ms == 0 {
            receiver.await.ok()
        } else {
            tokio::time::timeout(Duration::from_millis(timeout_ms), receiver)
                .await
                .ok()
                .and_then(Result::ok)
        };

        if received.is_none() {
            let mut state = self.state.lock();
            if matches!(*state, State::Waiting { .. }) {
                *state = State::TimedOut;
            }
            debug!(id = %message.id(), timeout_ms, "no reply before timeout");
        }

        Ok(received)
    }
}

#[async_trait]
impl MessageListener for Synchronizer {
    async fn on_message(&self, message: Message) {
        let mut state = self.state.lock();

        let matches = match &*state {
            State::Waiting { request_id, .. } => message.reply_of_id() == Some(request_id.as_str()),
            _ => {
                debug!(%message, "no exchange pending, ignoring message");
                return;
            }
        };

        if !matches {
            debug!(%message, "ignoring reply to another message");
            return;
        }

        if let State::Waiting { reply, .. } = mem::replace(&mut *state, State::Replied) {
            // The waiter may have timed out in the meantime.
            let _ = reply.send(message);
        }
    }
}
