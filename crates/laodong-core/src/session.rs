//! Session memory.
//!
//! The store maps a session id to a per-session async mutex. Holding the
//! mutex is the PROCESSING state; an unlocked session is IDLE. Different
//! sessions never contend with each other.
//!
//! A session keeps its turns oldest-first with a running token count. After
//! every append the oldest turns are evicted until the count fits the budget.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::errors::{LaodongError, LaodongResult, TurnError};
use crate::types::ConversationTurn;

/// Exclusive access to a session for the length of one turn.
pub type SessionGuard = OwnedMutexGuard<ConversationSession>;

#[derive(Debug)]
pub struct ConversationSession {
    id: String,
    turns: VecDeque<ConversationTurn>,
    token_count: usize,
    token_budget: usize,
    last_activity: Instant,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>, token_budget: usize) -> Self {
        Self {
            id: id.into(),
            turns: VecDeque::new(),
            token_count: 0,
            token_budget,
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Turns oldest first.
    pub fn turns(&self) -> &VecDeque<ConversationTurn> {
        &self.turns
    }

    /// Owned copy of the turns, oldest first.
    pub fn history(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Sum of retained turn token counts.
    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Append turns in order, then evict oldest-first until within budget.
    ///
    /// Returns the number of evicted turns.
    pub fn append_and_evict(&mut self, turns: impl IntoIterator<Item = ConversationTurn>) -> usize {
        for turn in turns {
            self.token_count += turn.tokens;
            self.turns.push_back(turn);
        }

        let mut evicted = 0;
        while self.token_count > self.token_budget {
            match self.turns.pop_front() {
                Some(old) => {
                    self.token_count -= old.tokens;
                    evicted += 1;
                }
                None => break,
            }
        }
        if evicted > 0 {
            debug!(
                "Session {}: evicted {} turns, {} tokens retained",
                self.id, evicted, self.token_count
            );
        }
        self.touch();
        evicted
    }

    /// Drop every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.token_count = 0;
        self.touch();
    }
}

// ============================================================================
// SessionStore
// ============================================================================

pub struct SessionStore {
    sessions: DashMap<String, Arc<Mutex<ConversationSession>>>,
    token_budget: usize,
}

impl SessionStore {
    pub fn new(token_budget: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            token_budget,
        }
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    fn entry(&self, session_id: &str) -> Arc<Mutex<ConversationSession>> {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ConversationSession::new(
                    session_id,
                    self.token_budget,
                )))
            })
            .clone()
    }

    /// Lock a session for one turn, creating it on first use.
    ///
    /// Waits at most `wait` for a turn already in progress. A zero wait fails
    /// immediately when the session is busy.
    pub async fn acquire(&self, session_id: &str, wait: Duration) -> Result<SessionGuard, TurnError> {
        let busy = || TurnError::SessionBusy {
            session_id: session_id.to_string(),
        };

        loop {
            let session = self.entry(session_id);
            let guard = if wait.is_zero() {
                session.clone().try_lock_owned().map_err(|_| busy())?
            } else {
                tokio::time::timeout(wait, session.clone().lock_owned())
                    .await
                    .map_err(|_| busy())?
            };

            // An idle sweep may have dropped the entry between lookup and lock.
            let current = self
                .sessions
                .get(session_id)
                .is_some_and(|entry| Arc::ptr_eq(entry.value(), &session));
            if current {
                return Ok(guard);
            }
        }
    }

    /// Clear a session's turns. Unknown ids are acknowledged.
    pub fn reset(&self, session_id: &str) -> LaodongResult<()> {
        let Some(session) = self.sessions.get(session_id).map(|e| e.value().clone()) else {
            return Ok(());
        };
        let mut guard = session.try_lock().map_err(|_| LaodongError::SessionBusy {
            session_id: session_id.to_string(),
        })?;
        guard.clear();
        debug!("Session {} reset", session_id);
        Ok(())
    }

    /// Drop idle sessions whose last activity is older than `ttl`.
    ///
    /// Returns the number of sessions dropped. Busy sessions are kept.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| match session.try_lock() {
            Ok(guard) => guard.idle_for() < ttl,
            Err(_) => true,
        });
        let dropped = before.saturating_sub(self.sessions.len());
        if dropped > 0 {
            debug!("Dropped {} idle sessions", dropped);
        }
        dropped
    }

    /// Committed turns of a session, waiting for any turn in progress.
    pub async fn snapshot(&self, session_id: &str) -> Option<Vec<ConversationTurn>> {
        let session = self.sessions.get(session_id).map(|e| e.value().clone())?;
        let guard = session.lock().await;
        Some(guard.history())
    }
}
