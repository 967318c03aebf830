// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for session and transfer dispatch events.

use std::fmt::{Display, Formatter};
use tracing::Span;

use crate::observability::messages::StructuredLog;
use crate::protocol::{SessionId, TransferId};

/// A client connected and its region table was created.
///
/// # Log Level
/// `info!` - Operational event
pub struct SessionConnected {
    pub session: SessionId,
}

impl Display for SessionConnected {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} connected", self.session)
    }
}

impl StructuredLog for SessionConnected {
    fn log(&self) {
        tracing::info!(session = self.session.0, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("session", span_name = name, session = self.session.0)
    }
}

/// A client disconnected; its region table was released.
///
/// # Log Level
/// `info!` - Operational event
pub struct SessionDisconnected {
    pub session: SessionId,
    pub regions_released: usize,
}

impl Display for SessionDisconnected {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} disconnected, released {} region(s)",
            self.session, self.regions_released
        )
    }
}

impl StructuredLog for SessionDisconnected {
    fn log(&self) {
        tracing::info!(
            session = self.session.0,
            regions_released = self.regions_released,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "session_disconnect",
            span_name = name,
            session = self.session.0,
            regions_released = self.regions_released,
        )
    }
}

/// A validated transfer was accepted by the execution engine.
///
/// # Log Level
/// `info!` - Operational event
pub struct TransferSubmitted {
    pub session: SessionId,
    pub id: TransferId,
    pub bytes: u64,
}

impl Display for TransferSubmitted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} accepted for {} ({} bytes)",
            self.id, self.session, self.bytes
        )
    }
}

impl StructuredLog for TransferSubmitted {
    fn log(&self) {
        tracing::info!(
            session = self.session.0,
            transfer = self.id.0,
            bytes = self.bytes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "transfer",
            span_name = name,
            session = self.session.0,
            transfer = self.id.0,
        )
    }
}

/// An exec request failed range validation; the engine was not invoked.
///
/// # Log Level
/// `warn!` - Client error, service unaffected
pub struct TransferValidationFailed {
    pub session: SessionId,
    pub src: u64,
    pub dst: u64,
    pub bytes: u64,
}

impl Display for TransferValidationFailed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "transfer validation failed for {}: src={:#x} dst={:#x} bytes={:#x}",
            self.session, self.src, self.dst, self.bytes
        )
    }
}

impl StructuredLog for TransferValidationFailed {
    fn log(&self) {
        tracing::warn!(
            session = self.session.0,
            src = self.src,
            dst = self.dst,
            bytes = self.bytes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "transfer_validation",
            span_name = name,
            session = self.session.0,
        )
    }
}

/// The engine declined a validated transfer at submission time.
///
/// # Log Level
/// `warn!` - Reported to the client as a result code
pub struct TransferRejectedByEngine<'a> {
    pub session: SessionId,
    pub reason: &'a str,
}

impl Display for TransferRejectedByEngine<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "engine rejected transfer for {}: {}", self.session, self.reason)
    }
}

impl StructuredLog for TransferRejectedByEngine<'_> {
    fn log(&self) {
        tracing::warn!(session = self.session.0, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "transfer_reject",
            span_name = name,
            session = self.session.0,
        )
    }
}
