//! Per-session conversation history
//!
//! Sessions live in a `DashMap` keyed by session id, each behind its own
//! mutex so different sessions never contend. Locks are only held for the
//! duration of a copy or an append; callers read a snapshot, release the
//! lock, do their slow work and come back to record the turn.

use crate::core::types::SessionId;
use crate::session::turn::{Outcome, PendingClarification, Turn};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Conversation state for one session id
#[derive(Debug)]
struct Session {
    turns: VecDeque<Turn>,
    pending: Option<PendingClarification>,
    last_active: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            turns: VecDeque::new(),
            pending: None,
            last_active: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    fn push_turn(&mut self, turn: Turn, cap: usize) {
        self.turns.push_back(turn);
        while self.turns.len() > cap {
            self.turns.pop_front();
        }
    }

}

/// Read-only copy of a session handed to resolvers
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: SessionId,
    /// Most recent last
    pub turns: Vec<Turn>,
    pub pending: Option<PendingClarification>,
}

impl SessionContext {
    pub fn empty(session_id: SessionId) -> Self {
        Self {
            session_id,
            turns: Vec::new(),
            pending: None,
        }
    }

    /// Payload of the newest successful turn of `kind`
    pub fn latest_success(&self, kind: &str) -> Option<&Value> {
        self.turns.iter().rev().find_map(|turn| {
            let action = turn.action.as_ref()?;
            match &turn.outcome {
                Outcome::Success { payload } if action.kind == kind => Some(payload),
                _ => None,
            }
        })
    }
}

/// Owner of all session and turn data
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<SessionId, Arc<Mutex<Session>>>,
    max_turns: usize,
    idle_window: Duration,
}

impl SessionStore {
    pub fn new(max_turns: usize, idle_window: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            max_turns: max_turns.max(1),
            idle_window,
        }
    }

    /// Get or implicitly create a session; the map shard lock is released on return
    fn session(&self, id: &SessionId) -> Arc<Mutex<Session>> {
        if let Some(existing) = self.sessions.get(id) {
            return existing.clone();
        }
        self.sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(session = %id, "creating session");
                Arc::new(Mutex::new(Session::new()))
            })
            .clone()
    }

    /// All retained turns, most recent last
    pub fn get_context(&self, id: &SessionId) -> Vec<Turn> {
        let session = self.session(id);
        let mut session = session.lock();
        session.touch();
        session.turns.iter().cloned().collect()
    }

    /// The last `n` turns plus any pending clarification
    pub fn snapshot(&self, id: &SessionId, n: usize) -> SessionContext {
        let session = self.session(id);
        let mut session = session.lock();
        session.touch();
        let skip = session.turns.len().saturating_sub(n);
        SessionContext {
            session_id: id.clone(),
            turns: session.turns.iter().skip(skip).cloned().collect(),
            pending: session.pending.clone(),
        }
    }

    pub fn append_turn(&self, id: &SessionId, turn: Turn) {
        let session = self.session(id);
        let mut session = session.lock();
        session.touch();
        session.push_turn(turn, self.max_turns);
    }

    pub fn set_pending(&self, id: &SessionId, pending: Option<PendingClarification>) {
        let session = self.session(id);
        let mut session = session.lock();
        session.touch();
        session.pending = pending;
    }

    pub fn pending(&self, id: &SessionId) -> Option<PendingClarification> {
        self.session(id).lock().pending.clone()
    }

    /// Append a turn and replace the pending field under one lock acquisition
    pub fn record(&self, id: &SessionId, turn: Turn, pending: Option<PendingClarification>) {
        let session = self.session(id);
        let mut session = session.lock();
        session.touch();
        session.push_turn(turn, self.max_turns);
        session.pending = pending;
    }

    /// Destroy a session; returns whether it existed
    pub fn reset(&self, id: &SessionId) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Purge sessions idle longer than the inactivity window
    pub fn sweep(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        let before = self.sessions.len();
        let idle_window = self.idle_window;
        self.sessions
            .retain(|_, session| session.lock().last_active.elapsed() < idle_window);
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            debug!(purged, "swept idle sessions");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }
}
