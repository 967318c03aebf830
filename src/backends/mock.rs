// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::DirectoryError;
use crate::lifecycle::LifecycleEvent;
use crate::protocol::{ReplyBody, ServiceEndpoint, SessionId, TransferId, TransferStatus};
use crate::traits::{
    Completion, DmaEngine, EngineReject, ReplyTransport, SendOutcome, ServiceDirectory,
    TransferDescriptor, TransferIdAllocator,
};

/// An execution engine stand-in with scriptable submission behavior.
///
/// Accepted transfers get a fresh process-unique id; in the default
/// `accepting` mode the engine also reports completion immediately on its
/// completion channel. `manual` mode accepts but leaves completion to the
/// caller, and `rejecting` declines every submission.
pub struct MockDmaEngine {
    completions: mpsc::UnboundedSender<Completion>,
    allocator: TransferIdAllocator,
    submissions: AtomicUsize,
    accept: bool,
    auto_complete: bool,
}

impl MockDmaEngine {
    pub fn accepting(completions: mpsc::UnboundedSender<Completion>) -> Self {
        Self {
            completions,
            allocator: TransferIdAllocator::new(),
            submissions: AtomicUsize::new(0),
            accept: true,
            auto_complete: true,
        }
    }

    pub fn manual(completions: mpsc::UnboundedSender<Completion>) -> Self {
        Self {
            auto_complete: false,
            ..Self::accepting(completions)
        }
    }

    pub fn rejecting(completions: mpsc::UnboundedSender<Completion>) -> Self {
        Self {
            accept: false,
            ..Self::accepting(completions)
        }
    }

    /// How many descriptors reached `execute`.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::Relaxed)
    }

    /// Report a completion by hand, for `manual` mode.
    pub fn complete(&self, id: TransferId, status: TransferStatus) {
        let _ = self.completions.send(Completion { id, status });
    }
}

impl DmaEngine for MockDmaEngine {
    fn execute(&self, _descriptor: TransferDescriptor) -> Result<TransferId, EngineReject> {
        self.submissions.fetch_add(1, Ordering::Relaxed);
        if !self.accept {
            return Err(EngineReject {
                reason: "channel pool exhausted".to_string(),
            });
        }
        let id = self.allocator.allocate();
        if self.auto_complete {
            let _ = self.completions.send(Completion {
                id,
                status: TransferStatus::Ok,
            });
        }
        Ok(id)
    }
}

/// A reply transport that reports `Busy` a scripted number of times before
/// delivering, and records everything that reaches the wire.
pub struct ScriptedTransport {
    busy_remaining: AtomicU32,
    attempts: AtomicUsize,
    fatal: Option<String>,
    sent: Mutex<Vec<(SessionId, ReplyBody)>>,
}

impl ScriptedTransport {
    /// Delivers on the first attempt.
    pub fn reliable() -> Self {
        Self::busy_times(0)
    }

    /// Reports `Busy` for the first `n` attempts, then delivers.
    pub fn busy_times(n: u32) -> Self {
        Self {
            busy_remaining: AtomicU32::new(n),
            attempts: AtomicUsize::new(0),
            fatal: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Fails hard on every attempt.
    pub fn fatal(reason: &str) -> Self {
        Self {
            fatal: Some(reason.to_string()),
            ..Self::reliable()
        }
    }

    /// Everything delivered so far, in wire order.
    pub fn sent(&self) -> Vec<(SessionId, ReplyBody)> {
        self.sent.lock().unwrap().clone()
    }

    /// Total send attempts, including the busy ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReplyTransport for ScriptedTransport {
    async fn send(&self, session: SessionId, body: &ReplyBody) -> SendOutcome {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if let Some(reason) = &self.fatal {
            return SendOutcome::Fatal(reason.clone());
        }
        if self
            .busy_remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
        {
            return SendOutcome::Busy;
        }
        self.sent.lock().unwrap().push((session, body.clone()));
        SendOutcome::Sent
    }
}

/// A discovery directory that resolves exports in-process.
pub struct LoopbackDirectory {
    fail_export: bool,
    fail_register: bool,
    registered: Mutex<Vec<String>>,
}

impl LoopbackDirectory {
    pub fn healthy() -> Self {
        Self {
            fail_export: false,
            fail_register: false,
            registered: Mutex::new(Vec::new()),
        }
    }

    pub fn export_fails() -> Self {
        Self {
            fail_export: true,
            ..Self::healthy()
        }
    }

    pub fn registration_fails() -> Self {
        Self {
            fail_register: true,
            ..Self::healthy()
        }
    }

    /// The names registered so far.
    pub fn registered(&self) -> Vec<String> {
        self.registered.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceDirectory for LoopbackDirectory {
    fn begin_export(&self, events: mpsc::UnboundedSender<LifecycleEvent>) {
        let result = if self.fail_export {
            Err(DirectoryError::ExportRefused(
                "no transport endpoints available".to_string(),
            ))
        } else {
            Ok(ServiceEndpoint(1))
        };
        let _ = events.send(LifecycleEvent::ExportResolved(result));
    }

    async fn register_name(
        &self,
        name: &str,
        _endpoint: ServiceEndpoint,
    ) -> Result<(), DirectoryError> {
        if self.fail_register {
            return Err(DirectoryError::RegistrationRefused(format!(
                "name '{name}' unavailable"
            )));
        }
        self.registered.lock().unwrap().push(name.to_string());
        Ok(())
    }
}
