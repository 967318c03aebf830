// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for startup state machine events.

use std::fmt::{Display, Formatter};
use tracing::Span;

use crate::lifecycle::ServiceState;
use crate::observability::messages::StructuredLog;
use crate::protocol::ServiceEndpoint;

/// The startup sequencer moved to a new state.
///
/// # Log Level
/// `info!`, or `error!` when the new state is a failure state
pub struct StartupStateChanged {
    pub from: ServiceState,
    pub to: ServiceState,
}

impl Display for StartupStateChanged {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "startup state {} -> {}", self.from, self.to)
    }
}

impl StructuredLog for StartupStateChanged {
    fn log(&self) {
        if self.to.is_failure() {
            tracing::error!(from = %self.from, to = %self.to, "{}", self);
        } else {
            tracing::info!(from = %self.from, to = %self.to, "{}", self);
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("startup", span_name = name, to = %self.to)
    }
}

/// The export resolved and the service has an endpoint.
///
/// # Log Level
/// `info!` - Operational event
pub struct ServiceExported {
    pub endpoint: ServiceEndpoint,
}

impl Display for ServiceExported {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "service exported at {}", self.endpoint)
    }
}

impl StructuredLog for ServiceExported {
    fn log(&self) {
        tracing::info!(endpoint = self.endpoint.0, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("export", span_name = name, endpoint = self.endpoint.0)
    }
}

/// The endpoint was bound to its discovery name.
///
/// # Log Level
/// `info!` - Operational event
pub struct NameRegistered<'a> {
    pub name: &'a str,
    pub endpoint: ServiceEndpoint,
}

impl Display for NameRegistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "registered '{}' for {}", self.name, self.endpoint)
    }
}

impl StructuredLog for NameRegistered<'_> {
    fn log(&self) {
        tracing::info!(name = self.name, endpoint = self.endpoint.0, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("name_register", span_name = name, service = self.name)
    }
}
