use std::future::Future;

use guildconf_contracts::{Reply, ReplyMode};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("interaction was already answered")]
    AlreadyAnswered,
    #[error("transport rejected the reply: {0}")]
    Transport(String),
}

/// The transport's reply primitive for one interaction.
pub trait Responder: Send {
    fn send(&mut self, reply: Reply) -> impl Future<Output = Result<(), ReplyError>> + Send;
}

/// Keeps the one-reply-per-interaction contract: a second reply is refused
/// locally, and an update is turned into a fresh message when there is no
/// rendered message to update.
pub struct ReplyTracker<'r, R> {
    responder: &'r mut R,
    from_message: bool,
    answered: bool,
}

impl<'r, R: Responder> ReplyTracker<'r, R> {
    pub fn new(responder: &'r mut R, from_message: bool) -> Self {
        Self {
            responder,
            from_message,
            answered: false,
        }
    }

    pub async fn reply(&mut self, reply: Reply) -> Result<(), ReplyError> {
        if self.answered {
            return Err(ReplyError::AlreadyAnswered);
        }
        let reply = match reply {
            Reply::Update { message, notice } if !self.from_message => Reply::Message {
                content: notice,
                message: Some(message),
                ephemeral: false,
            },
            other => other,
        };
        debug_assert!(self.from_message || reply.mode() == ReplyMode::Fresh);

        // A failed send still counts: retrying could deliver twice.
        self.answered = true;
        self.responder.send(reply).await
    }
}

/// Buffers replies in memory; the HTTP adapter returns them as the response
/// body.
#[derive(Debug, Default)]
pub struct CollectingResponder {
    replies: Vec<Reply>,
}

impl CollectingResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replies(&self) -> &[Reply] {
        &self.replies
    }

    pub fn into_replies(self) -> Vec<Reply> {
        self.replies
    }
}

impl Responder for CollectingResponder {
    async fn send(&mut self, reply: Reply) -> Result<(), ReplyError> {
        self.replies.push(reply);
        Ok(())
    }
}
