use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backends::{MockDmaEngine, ScriptedTransport};
use crate::broker::{Broker, BrokerHandle};
use crate::config::ReplyOptions;
use crate::errors::ReplyError;
use crate::protocol::{
    ClientCall, GrantHandle, RegionGrant, ReplyBody, ResultCode, SessionId, TransferId,
    TransferStatus,
};
use crate::traits::{DmaEngine, ReplyTransport};

/// Integration tests driving the full broker loop against the in-process
/// backends.
#[cfg(test)]
mod tests {
    use super::*;

    fn grant(handle: u64, base: u64, bytes: u64) -> RegionGrant {
        RegionGrant {
            handle: GrantHandle(handle),
            base,
            bytes,
        }
    }

    fn spawn_broker(
        engine: Arc<dyn DmaEngine>,
        transport: Arc<ScriptedTransport>,
        events: tokio::sync::mpsc::UnboundedReceiver<crate::broker::BrokerEvent>,
    ) -> (CancellationToken, JoinHandle<Result<(), ReplyError>>) {
        let shutdown = CancellationToken::new();
        let broker = Broker::new(
            engine,
            transport as Arc<dyn ReplyTransport>,
            ReplyOptions::default(),
            shutdown.clone(),
            events,
        );
        (shutdown.clone(), tokio::spawn(broker.run()))
    }

    async fn wait_for_replies(transport: &ScriptedTransport, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while transport.sent().len() < n {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("timed out waiting for replies");
    }

    fn exec_id(body: &ReplyBody) -> Option<TransferId> {
        match body {
            ReplyBody::Exec { id, .. } => *id,
            _ => None,
        }
    }

    #[tokio::test]
    async fn register_exec_completion_roundtrip() {
        let (handle, events) = BrokerHandle::new();
        let engine = Arc::new(MockDmaEngine::accepting(handle.completions()));
        let transport = Arc::new(ScriptedTransport::reliable());
        let (shutdown, task) = spawn_broker(engine.clone(), Arc::clone(&transport), events);

        let session = SessionId(1);
        handle.connect(session);
        handle.call(session, ClientCall::Register(grant(1, 0x1_0000, 0x1000)));
        handle.call(
            session,
            ClientCall::Exec {
                src: 0x1_0000,
                dst: 0x1_0800,
                bytes: 0x100,
            },
        );

        wait_for_replies(&transport, 3).await;
        let sent = transport.sent();
        match &sent[0].1 {
            ReplyBody::Register { code, region } => {
                assert!(code.is_ok());
                assert!(region.is_some());
            }
            other => panic!("unexpected first reply: {other:?}"),
        }
        let id = exec_id(&sent[1].1).expect("exec reply carries an id");
        assert_eq!(
            sent[2].1,
            ReplyBody::Completion {
                id,
                status: TransferStatus::Ok,
            }
        );

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn accepted_transfer_ids_are_unique() {
        let (handle, events) = BrokerHandle::new();
        let engine = Arc::new(MockDmaEngine::accepting(handle.completions()));
        let transport = Arc::new(ScriptedTransport::reliable());
        let (shutdown, task) = spawn_broker(engine.clone(), Arc::clone(&transport), events);

        for raw in [1u64, 2] {
            let session = SessionId(raw);
            handle.connect(session);
            handle.call(session, ClientCall::Register(grant(1, 0x1_0000, 0x1000)));
            handle.call(
                session,
                ClientCall::Exec {
                    src: 0x1_0000,
                    dst: 0x1_0000,
                    bytes: 0x100,
                },
            );
        }

        wait_for_replies(&transport, 6).await;
        let ids: Vec<TransferId> = transport
            .sent()
            .iter()
            .filter_map(|(_, body)| exec_id(body))
            .collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn invalid_range_never_reaches_the_engine() {
        let (handle, events) = BrokerHandle::new();
        let engine = Arc::new(MockDmaEngine::accepting(handle.completions()));
        let transport = Arc::new(ScriptedTransport::reliable());
        let (shutdown, task) = spawn_broker(engine.clone(), Arc::clone(&transport), events);

        let session = SessionId(1);
        handle.connect(session);
        handle.call(session, ClientCall::Register(grant(1, 0x1_0000, 0x1000)));
        // Destination is outside every registered region.
        handle.call(
            session,
            ClientCall::Exec {
                src: 0x1_0000,
                dst: 0x9_0000,
                bytes: 0x100,
            },
        );

        wait_for_replies(&transport, 2).await;
        assert_eq!(
            transport.sent()[1].1,
            ReplyBody::Exec {
                code: ResultCode::RangeNotRegistered,
                id: None,
            }
        );
        assert_eq!(engine.submissions(), 0);

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn engine_rejection_is_reported_without_completion() {
        let (handle, events) = BrokerHandle::new();
        let engine = Arc::new(MockDmaEngine::rejecting(handle.completions()));
        let transport = Arc::new(ScriptedTransport::reliable());
        let (shutdown, task) = spawn_broker(engine.clone(), Arc::clone(&transport), events);

        let session = SessionId(1);
        handle.connect(session);
        handle.call(session, ClientCall::Register(grant(1, 0x1_0000, 0x1000)));
        handle.call(
            session,
            ClientCall::Exec {
                src: 0x1_0000,
                dst: 0x1_0000,
                bytes: 0x100,
            },
        );

        wait_for_replies(&transport, 2).await;
        assert_eq!(
            transport.sent()[1].1,
            ReplyBody::Exec {
                code: ResultCode::TransferRejected,
                id: None,
            }
        );
        assert_eq!(engine.submissions(), 1);

        // No completion may ever follow a submission-time reject.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(transport.sent().len(), 2);

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn backpressure_retries_deliver_exactly_one_response() {
        let (handle, events) = BrokerHandle::new();
        let engine = Arc::new(MockDmaEngine::accepting(handle.completions()));
        let transport = Arc::new(ScriptedTransport::busy_times(3));
        let (shutdown, task) = spawn_broker(engine, Arc::clone(&transport), events);

        let session = SessionId(1);
        handle.connect(session);
        handle.call(session, ClientCall::Register(grant(1, 0x1_0000, 0x1000)));

        wait_for_replies(&transport, 1).await;
        // Three busy reports plus the delivery: one response, not four.
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(transport.attempts(), 4);

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn stop_reports_success_for_any_id() {
        let (handle, events) = BrokerHandle::new();
        let engine = Arc::new(MockDmaEngine::manual(handle.completions()));
        let transport = Arc::new(ScriptedTransport::reliable());
        let (shutdown, task) = spawn_broker(engine.clone(), Arc::clone(&transport), events);

        let session = SessionId(1);
        handle.connect(session);

        // Unknown id.
        handle.call(session, ClientCall::Stop(TransferId(9999)));
        wait_for_replies(&transport, 1).await;

        // In-flight id.
        handle.call(session, ClientCall::Register(grant(1, 0x1_0000, 0x1000)));
        handle.call(
            session,
            ClientCall::Exec {
                src: 0x1_0000,
                dst: 0x1_0000,
                bytes: 0x100,
            },
        );
        wait_for_replies(&transport, 3).await;
        let id = exec_id(&transport.sent()[2].1).unwrap();
        handle.call(session, ClientCall::Stop(id));
        wait_for_replies(&transport, 4).await;

        // Already-completed id.
        engine.complete(id, TransferStatus::Ok);
        wait_for_replies(&transport, 5).await;
        handle.call(session, ClientCall::Stop(id));
        wait_for_replies(&transport, 6).await;

        let stops: Vec<ReplyBody> = transport
            .sent()
            .iter()
            .filter(|(_, body)| matches!(body, ReplyBody::Stop { .. }))
            .map(|(_, body)| body.clone())
            .collect();
        assert_eq!(
            stops,
            vec![
                ReplyBody::Stop { code: ResultCode::Ok },
                ReplyBody::Stop { code: ResultCode::Ok },
                ReplyBody::Stop { code: ResultCode::Ok },
            ]
        );

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn deregister_revokes_coverage_for_later_execs() {
        let (handle, events) = BrokerHandle::new();
        let engine = Arc::new(MockDmaEngine::accepting(handle.completions()));
        let transport = Arc::new(ScriptedTransport::reliable());
        let (shutdown, task) = spawn_broker(engine.clone(), Arc::clone(&transport), events);

        let session = SessionId(1);
        handle.connect(session);
        handle.call(session, ClientCall::Register(grant(1, 0x1_0000, 0x1000)));
        handle.call(session, ClientCall::Deregister(GrantHandle(1)));
        handle.call(
            session,
            ClientCall::Exec {
                src: 0x1_0000,
                dst: 0x1_0000,
                bytes: 0x100,
            },
        );

        wait_for_replies(&transport, 3).await;
        let sent = transport.sent();
        assert_eq!(
            sent[1].1,
            ReplyBody::Deregister {
                code: ResultCode::Ok,
            }
        );
        assert_eq!(
            sent[2].1,
            ReplyBody::Exec {
                code: ResultCode::RangeNotRegistered,
                id: None,
            }
        );
        assert_eq!(engine.submissions(), 0);

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn completion_after_disconnect_is_dropped() {
        let (handle, events) = BrokerHandle::new();
        let engine = Arc::new(MockDmaEngine::manual(handle.completions()));
        let transport = Arc::new(ScriptedTransport::reliable());
        let (shutdown, task) = spawn_broker(engine.clone(), Arc::clone(&transport), events);

        let session = SessionId(1);
        handle.connect(session);
        handle.call(session, ClientCall::Register(grant(1, 0x1_0000, 0x1000)));
        handle.call(
            session,
            ClientCall::Exec {
                src: 0x1_0000,
                dst: 0x1_0000,
                bytes: 0x100,
            },
        );
        wait_for_replies(&transport, 2).await;
        let id = exec_id(&transport.sent()[1].1).unwrap();

        handle.disconnect(session);
        engine.complete(id, TransferStatus::Ok);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let sent = transport.sent();
        assert!(sent
            .iter()
            .all(|(_, body)| !matches!(body, ReplyBody::Completion { .. })));

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }
}
