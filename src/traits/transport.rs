use async_trait::async_trait;

use crate::protocol::{ReplyBody, SessionId};

/// Outcome of one transport send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The reply is on the wire; its resources can be released.
    Sent,
    /// The outbound channel is saturated. Transient; the same reply must be
    /// retried, never duplicated.
    Busy,
    /// Hard transport failure. Not recoverable locally.
    Fatal(String),
}

/// Outbound send primitive of the transport layer.
#[async_trait]
pub trait ReplyTransport: Send + Sync {
    async fn send(&self, session: SessionId, body: &ReplyBody) -> SendOutcome;
}
