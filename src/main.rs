// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use dma_broker::backends::{LoopbackDirectory, MockDmaEngine, ScriptedTransport};
use dma_broker::broker::{Broker, BrokerHandle};
use dma_broker::config::{load_and_validate_config, BrokerConfig};
use dma_broker::lifecycle::StartupSequencer;
use dma_broker::protocol::{ClientCall, GrantHandle, RegionGrant, SessionId};
use dma_broker::traits::{DmaEngine, ReplyTransport, ServiceDirectory};

/// Demo driver: runs the startup sequence against a loopback directory,
/// then pushes a small request script through the broker with a transport
/// that reports backpressure on the first two sends.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(path) => load_and_validate_config(path)
            .map_err(|err| anyhow::anyhow!("{err}"))
            .with_context(|| format!("loading config from {path}"))?,
        None => BrokerConfig::default(),
    };

    let directory = Arc::new(LoopbackDirectory::healthy());
    let mut sequencer = StartupSequencer::new(Arc::clone(&directory) as Arc<dyn ServiceDirectory>);
    let endpoint = sequencer.run(&config).await?;
    println!(
        "service '{}' running at {} (state: {})",
        config.registered_name(),
        endpoint,
        sequencer.state()
    );

    let shutdown = CancellationToken::new();
    let (handle, events) = BrokerHandle::new();
    let engine = Arc::new(MockDmaEngine::accepting(handle.completions()));
    let transport = Arc::new(ScriptedTransport::busy_times(2));
    let broker = Broker::new(
        Arc::clone(&engine) as Arc<dyn DmaEngine>,
        Arc::clone(&transport) as Arc<dyn ReplyTransport>,
        config.reply.clone(),
        shutdown.clone(),
        events,
    );
    let broker_task = tokio::spawn(broker.run());

    let session = SessionId(1);
    handle.connect(session);
    handle.call(
        session,
        ClientCall::Register(RegionGrant {
            handle: GrantHandle(1),
            base: 0x1000_0000,
            bytes: 64 * 1024,
        }),
    );
    handle.call(
        session,
        ClientCall::Exec {
            src: 0x1000_0000,
            dst: 0x1000_8000,
            bytes: 0x1000,
        },
    );
    // This one misses every registered region and is refused up front.
    handle.call(
        session,
        ClientCall::Exec {
            src: 0x2000_0000,
            dst: 0x1000_0000,
            bytes: 0x1000,
        },
    );
    handle.call(session, ClientCall::Deregister(GrantHandle(1)));
    handle.disconnect(session);

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();
    broker_task.await??;

    println!("engine submissions: {}", engine.submissions());
    println!(
        "replies delivered: {} (send attempts: {})",
        transport.sent().len(),
        transport.attempts()
    );
    for (session, body) in transport.sent() {
        println!("  {} <- {:?}", session, body);
    }

    Ok(())
}
