// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The broker event loop.
//!
//! A single task owns every session's region table, the in-flight transfer
//! map, and the reply queues. Each event handler runs to completion
//! without suspending, so no locking is needed around this state; the only
//! await points are between events. Transfer dispatch submits to the
//! execution engine and returns immediately; completion arrives later as
//! its own event.

#[cfg(test)]
pub mod integration_tests;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::completion::CompletionNotifier;
use crate::config::ReplyOptions;
use crate::errors::{BrokerError, ReplyError};
use crate::observability::messages::broker::{
    SessionConnected, SessionDisconnected, TransferRejectedByEngine, TransferSubmitted,
    TransferValidationFailed,
};
use crate::observability::messages::StructuredLog;
use crate::protocol::{
    ClientCall, GrantHandle, RegionGrant, ReplyBody, ResultCode, SessionId, TransferId,
};
use crate::regions::{PhysRange, RegionTable};
use crate::reply::ReplyEngine;
use crate::traits::{Completion, DmaEngine, ReplyTransport, TransferDescriptor};

/// Everything the broker reacts to.
#[derive(Debug)]
pub enum BrokerEvent {
    Connected(SessionId),
    Disconnected(SessionId),
    Call { session: SessionId, call: ClientCall },
    Completed(Completion),
}

/// Cheap cloneable handle for feeding events into the broker loop.
#[derive(Clone)]
pub struct BrokerHandle {
    events: mpsc::UnboundedSender<BrokerEvent>,
}

impl BrokerHandle {
    /// Create the handle and the receiving end the broker consumes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BrokerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }

    pub fn connect(&self, session: SessionId) {
        let _ = self.events.send(BrokerEvent::Connected(session));
    }

    pub fn disconnect(&self, session: SessionId) {
        let _ = self.events.send(BrokerEvent::Disconnected(session));
    }

    pub fn call(&self, session: SessionId, call: ClientCall) {
        let _ = self.events.send(BrokerEvent::Call { session, call });
    }

    /// Completion channel to hand to an execution engine. A forwarder task
    /// maps engine completions into broker events.
    pub fn completions(&self) -> mpsc::UnboundedSender<Completion> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(completion) = rx.recv().await {
                if events.send(BrokerEvent::Completed(completion)).is_err() {
                    break;
                }
            }
        });
        tx
    }
}

/// The DMA-transfer request broker.
pub struct Broker {
    engine: Arc<dyn DmaEngine>,
    replies: ReplyEngine,
    sessions: HashMap<SessionId, RegionTable>,
    notifier: CompletionNotifier,
    events: mpsc::UnboundedReceiver<BrokerEvent>,
    shutdown: CancellationToken,
}

impl Broker {
    pub fn new(
        engine: Arc<dyn DmaEngine>,
        transport: Arc<dyn ReplyTransport>,
        reply_options: ReplyOptions,
        shutdown: CancellationToken,
        events: mpsc::UnboundedReceiver<BrokerEvent>,
    ) -> Self {
        Self {
            engine,
            replies: ReplyEngine::new(transport, reply_options, shutdown.clone()),
            sessions: HashMap::new(),
            notifier: CompletionNotifier::new(),
            events,
            shutdown,
        }
    }

    /// Process events until shutdown or until every handle is dropped,
    /// then drain the reply queues. A fatal reply-transport error is the
    /// only error this returns.
    pub async fn run(mut self) -> Result<(), ReplyError> {
        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            match event {
                BrokerEvent::Connected(session) => self.handle_connected(session),
                BrokerEvent::Disconnected(session) => self.handle_disconnected(session),
                BrokerEvent::Call { session, call } => self.handle_call(session, call),
                BrokerEvent::Completed(completion) => {
                    self.notifier.notify(&self.replies, completion)
                }
            }
        }
        self.replies.join().await
    }

    fn handle_connected(&mut self, session: SessionId) {
        self.sessions.insert(session, RegionTable::new());
        self.replies.attach(session);
        SessionConnected { session }.log();
    }

    fn handle_disconnected(&mut self, session: SessionId) {
        let regions_released = self
            .sessions
            .remove(&session)
            .map(|table| table.len())
            .unwrap_or(0);
        self.notifier.forget_session(session);
        self.replies.detach(session);
        SessionDisconnected {
            session,
            regions_released,
        }
        .log();
    }

    fn handle_call(&mut self, session: SessionId, call: ClientCall) {
        match call {
            ClientCall::Register(grant) => self.handle_register(session, grant),
            ClientCall::Deregister(handle) => self.handle_deregister(session, handle),
            ClientCall::Exec { src, dst, bytes } => self.handle_exec(session, src, dst, bytes),
            ClientCall::Stop(id) => self.handle_stop(session, id),
        }
    }

    fn handle_register(&mut self, session: SessionId, grant: RegionGrant) {
        let Some(table) = self.sessions.get_mut(&session) else {
            tracing::debug!(session = session.0, "register from unknown session");
            return;
        };
        let body = match table.register(grant) {
            Ok(region) => ReplyBody::Register {
                code: ResultCode::Ok,
                region: Some(region),
            },
            Err(err) => ReplyBody::Register {
                code: err.code(),
                region: None,
            },
        };
        self.replies.enqueue(session, body);
    }

    fn handle_deregister(&mut self, session: SessionId, handle: GrantHandle) {
        let Some(table) = self.sessions.get_mut(&session) else {
            tracing::debug!(session = session.0, "deregister from unknown session");
            return;
        };
        let body = match table.deregister(handle) {
            Ok(()) => ReplyBody::Deregister {
                code: ResultCode::Ok,
            },
            Err(err) => ReplyBody::Deregister { code: err.code() },
        };
        self.replies.enqueue(session, body);
    }

    /// Validate both ranges, then dispatch. On validation failure no
    /// transfer id is allocated and the engine is never invoked.
    fn handle_exec(&mut self, session: SessionId, src: u64, dst: u64, bytes: u64) {
        let Some(table) = self.sessions.get(&session) else {
            tracing::debug!(session = session.0, "exec from unknown session");
            return;
        };
        let result = Self::validate(table, src, dst, bytes).and_then(|(src_range, dst_range)| {
            self.engine
                .execute(TransferDescriptor {
                    src: src_range.start,
                    dst: dst_range.start,
                    bytes: src_range.bytes,
                    session,
                })
                .map_err(|reject| BrokerError::TransferRejected {
                    reason: reject.reason,
                })
        });
        let body = match result {
            Ok(id) => {
                self.notifier.record(id, session);
                TransferSubmitted { session, id, bytes }.log();
                ReplyBody::Exec {
                    code: ResultCode::Ok,
                    id: Some(id),
                }
            }
            Err(err) => {
                match &err {
                    BrokerError::TransferRejected { reason } => {
                        TransferRejectedByEngine { session, reason }.log()
                    }
                    _ => TransferValidationFailed {
                        session,
                        src,
                        dst,
                        bytes,
                    }
                    .log(),
                }
                ReplyBody::Exec {
                    code: err.code(),
                    id: None,
                }
            }
        };
        self.replies.enqueue(session, body);
    }

    /// Resolve both endpoints of a transfer against the session's table.
    fn validate(
        table: &RegionTable,
        src: u64,
        dst: u64,
        bytes: u64,
    ) -> Result<(PhysRange, PhysRange), BrokerError> {
        let src_range = table
            .verify(src, bytes)
            .ok_or(BrokerError::RangeNotRegistered { addr: src, bytes })?;
        let dst_range = table
            .verify(dst, bytes)
            .ok_or(BrokerError::RangeNotRegistered { addr: dst, bytes })?;
        Ok((src_range, dst_range))
    }

    /// Stop performs no cancellation and unconditionally reports success,
    /// matching the contract clients already depend on.
    fn handle_stop(&mut self, session: SessionId, id: TransferId) {
        tracing::debug!(
            session = session.0,
            transfer = id.0,
            "stop acknowledged without cancelling"
        );
        self.replies.enqueue(
            session,
            ReplyBody::Stop {
                code: ResultCode::Ok,
            },
        );
    }
}
