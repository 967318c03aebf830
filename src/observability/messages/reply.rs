// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for reply delivery and retry events.

use std::fmt::{Display, Formatter};
use tracing::Span;

use crate::observability::messages::StructuredLog;
use crate::protocol::SessionId;

/// A reply reached the wire.
///
/// # Log Level
/// `debug!` - High-volume event
pub struct ReplyDelivered {
    pub session: SessionId,
    pub retries: u32,
}

impl Display for ReplyDelivered {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "reply delivered to {} after {} retries", self.session, self.retries)
    }
}

impl StructuredLog for ReplyDelivered {
    fn log(&self) {
        tracing::debug!(session = self.session.0, retries = self.retries, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("reply", span_name = name, session = self.session.0)
    }
}

/// The transport reported backpressure; the same reply will be retried.
///
/// # Log Level
/// `debug!` normally, `warn!` once the configured retry threshold is hit
pub struct ReplySendBusy {
    pub session: SessionId,
    pub retries: u32,
    pub escalate: bool,
}

impl Display for ReplySendBusy {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "reply channel busy for {} (retry {})",
            self.session, self.retries
        )
    }
}

impl StructuredLog for ReplySendBusy {
    fn log(&self) {
        if self.escalate {
            tracing::warn!(session = self.session.0, retries = self.retries, "{}", self);
        } else {
            tracing::debug!(session = self.session.0, retries = self.retries, "{}", self);
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("reply_retry", span_name = name, session = self.session.0)
    }
}

/// The transport failed hard while sending; the service is going down.
///
/// # Log Level
/// `error!` - Fatal
pub struct ReplyTransportFatal<'a> {
    pub session: SessionId,
    pub reason: &'a str,
}

impl Display for ReplyTransportFatal<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "reply transport failed for {}: {}", self.session, self.reason)
    }
}

impl StructuredLog for ReplyTransportFatal<'_> {
    fn log(&self) {
        tracing::error!(session = self.session.0, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("reply_fatal", span_name = name, session = self.session.0)
    }
}
