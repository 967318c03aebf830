// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::protocol::SessionId;

/// Failures of the reply delivery path. Transient backpressure is handled
/// internally by retrying and never appears here; what remains is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    /// The transport failed non-transiently while sending a reply. A broken
    /// reply channel cannot be repaired locally; the service shuts down.
    #[error("reply transport failed for {session}: {reason}")]
    TransportFatal { session: SessionId, reason: String },
}
