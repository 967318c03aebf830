// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Completion routing.
//!
//! The execution engine reports exactly one terminal status per accepted
//! transfer. The notifier remembers which session is waiting on each
//! transfer id and converts the engine event into a completion reply on
//! that session's queue. Transfers whose owner disconnected before the
//! engine finished still complete in hardware; their notifications are
//! dropped here.

use std::collections::HashMap;

use crate::protocol::{ReplyBody, SessionId, TransferId};
use crate::reply::ReplyEngine;
use crate::traits::Completion;

/// Maps in-flight transfer ids to their owning sessions.
#[derive(Debug, Default)]
pub struct CompletionNotifier {
    in_flight: HashMap<TransferId, SessionId>,
}

impl CompletionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember who is waiting on `id`. Called once per accepted transfer.
    pub fn record(&mut self, id: TransferId, session: SessionId) {
        self.in_flight.insert(id, session);
    }

    /// Forget a disconnecting session's transfers. Their completions will
    /// be dropped when the engine reports them.
    pub fn forget_session(&mut self, session: SessionId) {
        self.in_flight.retain(|_, owner| *owner != session);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Route one engine completion to the owning session.
    pub fn notify(&mut self, replies: &ReplyEngine, completion: Completion) {
        match self.in_flight.remove(&completion.id) {
            Some(session) => replies.enqueue(
                session,
                ReplyBody::Completion {
                    id: completion.id,
                    status: completion.status,
                },
            ),
            None => {
                tracing::debug!(
                    transfer = completion.id.0,
                    "dropping completion with no in-flight owner"
                );
            }
        }
    }
}
