//! Learner sessions
//!
//! Each session owns its own [`PracticeQueue`]. The store only maps ids to
//! sessions; every session sits behind its own async mutex so one slow
//! evaluator round trip never blocks another learner.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use pulpit_algo::{
    ApplySummary, Book, GradeResult, NextBatch, PracticeItem, PracticeQueue, Progress, QueueError,
};

use crate::services::coach::CoachMode;

pub type SessionHandle = Arc<Mutex<PracticeSession>>;

#[derive(Debug)]
pub struct PracticeSession {
    id: Uuid,
    book: Option<String>,
    mode: CoachMode,
    queue: PracticeQueue,
    created_at: DateTime<Utc>,
    last_active: Instant,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub book: Option<String>,
    pub mode: CoachMode,
    pub created_at: DateTime<Utc>,
    pub progress: Progress,
    pub current_batch: Vec<PracticeItem>,
    pub last_results: Vec<GradeResult>,
}

impl PracticeSession {
    pub fn new(mode: CoachMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            book: None,
            mode,
            queue: PracticeQueue::new(),
            created_at: Utc::now(),
            last_active: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn book(&self) -> Option<&str> {
        self.book.as_deref()
    }

    pub fn mode(&self) -> CoachMode {
        self.mode
    }

    pub fn queue(&self) -> &PracticeQueue {
        &self.queue
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Starts a fresh pass over `book`, discarding all queue state.
    pub fn load_book(&mut self, name: impl Into<String>, book: &Book) {
        let name = name.into();
        self.queue.load(book);
        info!(session = %self.id, book = %name, items = book.len(), "book loaded");
        self.book = Some(name);
        self.touch();
    }

    pub fn set_mode(&mut self, mode: CoachMode) {
        self.mode = mode;
        self.touch();
    }

    pub fn next_batch(&mut self, size: usize) -> Result<NextBatch, QueueError> {
        self.touch();
        let outcome = self.queue.next_batch(size)?;
        if let NextBatch::Ready { items, recycled } = &outcome {
            debug!(session = %self.id, items = items.len(), recycled, "batch issued");
        }
        Ok(outcome)
    }

    pub fn apply_results(&mut self, results: Vec<GradeResult>) -> Result<ApplySummary, QueueError> {
        self.touch();
        let summary = self.queue.apply_results(results)?;
        info!(
            session = %self.id,
            passed = summary.passed,
            warned = summary.warned,
            failed = summary.failed,
            missing = summary.missing,
            ignored = summary.ignored,
            completed = self.queue.completed(),
            total = self.queue.total(),
            "results applied"
        );
        Ok(summary)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            book: self.book.clone(),
            mode: self.mode,
            created_at: self.created_at,
            progress: self.queue.progress(),
            current_batch: self
                .queue
                .current_batch()
                .iter()
                .map(|item| PracticeItem::clone(item))
                .collect(),
            last_results: self.queue.last_results().to_vec(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(Uuid),
    #[error("session {0} is busy with another submission")]
    Busy(Uuid),
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: PracticeSession) -> Uuid {
        let id = session.id();
        self.sessions.write().insert(id, Arc::new(Mutex::new(session)));
        id
    }

    pub fn get(&self, id: Uuid) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    pub fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Drops sessions idle for longer than `max_idle`. Sessions locked by
    /// an in-flight request are in use and kept.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => session.idle_for() <= max_idle,
            Err(_) => true,
        });
        before - sessions.len()
    }
}

/// Exclusive access without waiting; a held lock means a submission is
/// being evaluated.
pub fn try_lock(id: Uuid, handle: &SessionHandle) -> Result<MutexGuard<'_, PracticeSession>, SessionError> {
    handle.try_lock().map_err(|_| SessionError::Busy(id))
}
