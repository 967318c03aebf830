// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::protocol::{GrantHandle, ResultCode};

/// Recoverable request-level failures. These never abort the service; each
/// one becomes a result code delivered through the normal reply path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// No registered region matches the given handle.
    #[error("no registered region for handle {handle:?}")]
    RegionNotFound { handle: GrantHandle },
    /// The grant handle is already registered for this session.
    #[error("handle {handle:?} is already registered")]
    RegionInUse { handle: GrantHandle },
    /// A transfer range is not fully covered by a single registered region.
    #[error("range [{addr:#x}, +{bytes:#x}) is not registered")]
    RangeNotRegistered { addr: u64, bytes: u64 },
    /// The execution engine declined the transfer at submission time.
    #[error("execution engine rejected the transfer: {reason}")]
    TransferRejected { reason: String },
}

impl BrokerError {
    /// The result code this error crosses the reply surface as.
    pub fn code(&self) -> ResultCode {
        match self {
            BrokerError::RegionNotFound { .. } => ResultCode::RegionNotFound,
            BrokerError::RegionInUse { .. } => ResultCode::RegionInUse,
            BrokerError::RangeNotRegistered { .. } => ResultCode::RangeNotRegistered,
            BrokerError::TransferRejected { .. } => ResultCode::TransferRejected,
        }
    }
}
