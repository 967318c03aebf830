// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for human-readable output and
//! [`StructuredLog`] for emission with structured fields.

use tracing::Span;

pub mod broker;
pub mod lifecycle;
pub mod reply;

/// Structured emission for log message types.
pub trait StructuredLog {
    /// Emit the message as a tracing event with structured fields.
    fn log(&self);

    /// Create a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
