// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Reliable reply delivery.
//!
//! Every response the broker produces goes through here: register,
//! deregister, exec, stop, and completion notifications all share the same
//! path. Each session gets its own delivery pump task with a FIFO queue,
//! so replies are delivered in submission order per session and one
//! saturated session never stalls another.
//!
//! A send that hits transport backpressure retries the same
//! [`PendingReply`] after yielding back to the executor; the reply is
//! moved, never cloned, so no duplicate can ever be queued for the same
//! logical response. A hard transport failure cancels the service-wide
//! shutdown token and surfaces [`ReplyError::TransportFatal`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ReplyOptions;
use crate::errors::ReplyError;
use crate::observability::messages::reply::{ReplyDelivered, ReplySendBusy, ReplyTransportFatal};
use crate::observability::messages::StructuredLog;
use crate::protocol::{ReplyBody, SessionId};
use crate::traits::{ReplyTransport, SendOutcome};

/// One queued response. At most one of these exists per logical response;
/// retries resubmit this same object with an incremented count.
#[derive(Debug)]
pub struct PendingReply {
    pub session: SessionId,
    pub body: ReplyBody,
    pub retries: u32,
}

/// Per-session reply queues plus the pump tasks draining them.
pub struct ReplyEngine {
    transport: Arc<dyn ReplyTransport>,
    options: ReplyOptions,
    shutdown: CancellationToken,
    queues: HashMap<SessionId, mpsc::UnboundedSender<PendingReply>>,
    pumps: Vec<JoinHandle<Result<(), ReplyError>>>,
}

impl ReplyEngine {
    pub fn new(
        transport: Arc<dyn ReplyTransport>,
        options: ReplyOptions,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transport,
            options,
            shutdown,
            queues: HashMap::new(),
            pumps: Vec::new(),
        }
    }

    /// Start a delivery pump for a newly connected session.
    pub fn attach(&mut self, session: SessionId) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.queues.insert(session, tx);
        self.pumps.push(tokio::spawn(pump(
            rx,
            Arc::clone(&self.transport),
            self.options.clone(),
            self.shutdown.clone(),
        )));
    }

    /// Drop a session's queue. The pump delivers what was already queued,
    /// then exits.
    pub fn detach(&mut self, session: SessionId) {
        self.queues.remove(&session);
    }

    /// Queue exactly one reply for delivery. Non-blocking; returns
    /// immediately while the pump handles transport backpressure.
    pub fn enqueue(&self, session: SessionId, body: ReplyBody) {
        let Some(queue) = self.queues.get(&session) else {
            tracing::debug!(session = session.0, "dropping reply for detached session");
            return;
        };
        let _ = queue.send(PendingReply {
            session,
            body,
            retries: 0,
        });
    }

    pub fn attached_sessions(&self) -> usize {
        self.queues.len()
    }

    /// Close all queues and wait for the pumps to drain. Returns the first
    /// fatal transport error, if any pump hit one.
    pub async fn join(self) -> Result<(), ReplyError> {
        let ReplyEngine { queues, pumps, .. } = self;
        drop(queues);

        let mut first_error = None;
        for pump in pumps {
            if let Ok(Err(err)) = pump.await {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Drain one session's queue, one reply at a time.
async fn pump(
    mut queue: mpsc::UnboundedReceiver<PendingReply>,
    transport: Arc<dyn ReplyTransport>,
    options: ReplyOptions,
    shutdown: CancellationToken,
) -> Result<(), ReplyError> {
    loop {
        let mut reply = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            next = queue.recv() => match next {
                Some(reply) => reply,
                None => return Ok(()),
            },
        };

        loop {
            match transport.send(reply.session, &reply.body).await {
                SendOutcome::Sent => {
                    ReplyDelivered {
                        session: reply.session,
                        retries: reply.retries,
                    }
                    .log();
                    break;
                }
                SendOutcome::Busy => {
                    reply.retries += 1;
                    ReplySendBusy {
                        session: reply.session,
                        retries: reply.retries,
                        escalate: options
                            .warn_after_retries
                            .is_some_and(|limit| reply.retries == limit),
                    }
                    .log();
                    // Re-enter the scheduler so unrelated work can proceed
                    // between retries.
                    tokio::task::yield_now().await;
                    if shutdown.is_cancelled() {
                        return Ok(());
                    }
                }
                SendOutcome::Fatal(reason) => {
                    ReplyTransportFatal {
                        session: reply.session,
                        reason: &reason,
                    }
                    .log();
                    shutdown.cancel();
                    return Err(ReplyError::TransportFatal {
                        session: reply.session,
                        reason,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::ScriptedTransport;
    use crate::protocol::ResultCode;

    fn ok_stop() -> ReplyBody {
        ReplyBody::Stop {
            code: ResultCode::Ok,
        }
    }

    #[tokio::test]
    async fn delivers_in_submission_order_per_session() {
        let transport = Arc::new(ScriptedTransport::reliable());
        let mut engine = ReplyEngine::new(
            Arc::clone(&transport) as Arc<dyn ReplyTransport>,
            ReplyOptions::default(),
            CancellationToken::new(),
        );
        let session = SessionId(1);
        engine.attach(session);

        for code in [
            ResultCode::Ok,
            ResultCode::RegionNotFound,
            ResultCode::RangeNotRegistered,
        ] {
            engine.enqueue(session, ReplyBody::Deregister { code });
        }

        engine.join().await.unwrap();
        let sent = transport.sent();
        assert_eq!(
            sent.iter().map(|(_, body)| body.clone()).collect::<Vec<_>>(),
            vec![
                ReplyBody::Deregister { code: ResultCode::Ok },
                ReplyBody::Deregister { code: ResultCode::RegionNotFound },
                ReplyBody::Deregister { code: ResultCode::RangeNotRegistered },
            ]
        );
    }

    #[tokio::test]
    async fn busy_transport_yields_exactly_one_delivery() {
        let transport = Arc::new(ScriptedTransport::busy_times(5));
        let mut engine = ReplyEngine::new(
            Arc::clone(&transport) as Arc<dyn ReplyTransport>,
            ReplyOptions::default(),
            CancellationToken::new(),
        );
        let session = SessionId(7);
        engine.attach(session);
        engine.enqueue(session, ok_stop());

        engine.join().await.unwrap();
        // Five busy reports, then success: the client sees one response.
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(transport.attempts(), 6);
    }

    #[tokio::test]
    async fn fatal_transport_cancels_shutdown_token() {
        let transport = Arc::new(ScriptedTransport::fatal("wire torn down"));
        let shutdown = CancellationToken::new();
        let mut engine = ReplyEngine::new(
            Arc::clone(&transport) as Arc<dyn ReplyTransport>,
            ReplyOptions::default(),
            shutdown.clone(),
        );
        let session = SessionId(3);
        engine.attach(session);
        engine.enqueue(session, ok_stop());

        let err = engine.join().await.unwrap_err();
        assert_eq!(
            err,
            ReplyError::TransportFatal {
                session,
                reason: "wire torn down".to_string(),
            }
        );
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn replies_for_detached_sessions_are_dropped() {
        let transport = Arc::new(ScriptedTransport::reliable());
        let mut engine = ReplyEngine::new(
            Arc::clone(&transport) as Arc<dyn ReplyTransport>,
            ReplyOptions::default(),
            CancellationToken::new(),
        );
        let session = SessionId(9);
        engine.attach(session);
        assert_eq!(engine.attached_sessions(), 1);
        engine.detach(session);
        assert_eq!(engine.attached_sessions(), 0);
        engine.enqueue(session, ok_stop());

        engine.join().await.unwrap();
        assert!(transport.sent().is_empty());
    }
}
