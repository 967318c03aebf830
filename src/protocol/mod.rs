// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message shapes exchanged with clients.
//!
//! These are the logical request and reply types of the broker's RPC
//! surface. Wire encoding is out of scope; a transport layer maps these
//! onto whatever framing it uses.

use std::fmt;

/// Transport-level connection handle identifying a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Opaque handle naming a memory grant a client wants registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrantHandle(pub u64);

/// Identifier of a registered region, returned by a successful register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(pub u64);

/// Process-unique identifier of an accepted transfer. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(pub u64);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transfer-{}", self.0)
    }
}

/// Reference to an exported service endpoint, produced during startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceEndpoint(pub u64);

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint-{}", self.0)
    }
}

/// A memory grant as presented by the client: the opaque handle plus the
/// physical range it resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionGrant {
    pub handle: GrantHandle,
    pub base: u64,
    pub bytes: u64,
}

/// Terminal status of a transfer, reported by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Ok,
    Failed,
}

/// Result code carried in every reply. Recoverable broker errors map onto
/// these; transient transport conditions never surface here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    RegionNotFound,
    RegionInUse,
    RangeNotRegistered,
    TransferRejected,
}

impl ResultCode {
    pub fn is_ok(&self) -> bool {
        matches!(self, ResultCode::Ok)
    }
}

/// The calls a connected client can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCall {
    Register(RegionGrant),
    Deregister(GrantHandle),
    Exec { src: u64, dst: u64, bytes: u64 },
    Stop(TransferId),
}

/// One logical response. Every client call produces exactly one of these;
/// `Completion` is the unsolicited server-to-client notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Register { code: ResultCode, region: Option<RegionId> },
    Deregister { code: ResultCode },
    Exec { code: ResultCode, id: Option<TransferId> },
    Stop { code: ResultCode },
    Completion { id: TransferId, status: TransferStatus },
}
