use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::{SessionId, TransferId, TransferStatus};

/// A validated transfer, ready for the execution engine. Both ranges have
/// passed region-table verification for the owning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDescriptor {
    pub src: u64,
    pub dst: u64,
    pub bytes: u64,
    pub session: SessionId,
}

/// Submission-time rejection from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReject {
    pub reason: String,
}

/// Terminal completion event for an accepted transfer. The engine emits
/// exactly one of these per accepted transfer, never for rejected ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub id: TransferId,
    pub status: TransferStatus,
}

/// Narrow contract to the hardware channel scheduler.
///
/// `execute` submits and returns immediately with accept or reject; it must
/// not wait for the transfer to finish. Completions arrive later on the
/// completion channel the engine was constructed with.
pub trait DmaEngine: Send + Sync {
    fn execute(&self, descriptor: TransferDescriptor) -> Result<TransferId, EngineReject>;
}

/// Process-unique transfer id allocator. Ids start at 1 and are never
/// reused for the lifetime of the process.
#[derive(Debug, Default)]
pub struct TransferIdAllocator {
    next: AtomicU64,
}

impl TransferIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> TransferId {
        TransferId(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
