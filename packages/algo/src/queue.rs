//! Practice Queue
//!
//! Three ordered collections cycle the items of a loaded book until every
//! one of them has been passed (or passed with a warning):
//!
//! - **active**: not yet attempted in the current cycle
//! - **retry**: failed, waiting for the next cycle
//! - **batch**: handed to the learner, waiting for grades
//!
//! When the active queue runs dry the retry queue is recycled into it. When
//! both are empty the book is mastered, which is terminal until the next
//! [`PracticeQueue::load`].
//!
//! Every item id of the loaded book is always in exactly one of
//! {active, retry, batch, retired}.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;

use crate::book::Book;
use crate::types::{GradeResult, GradeStatus, PracticeItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
    #[error("a batch of {0} items is still waiting for results")]
    BatchOutstanding(usize),
    #[error("no batch is waiting for results")]
    NoOutstandingBatch,
}

/// Membership invariant violation, reported by [`PracticeQueue::check_invariant`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("item {0} is held more than once")]
    Duplicate(u32),
    #[error("item {0} does not belong to the loaded book")]
    Unknown(u32),
    #[error("item {0} was lost")]
    Missing(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QueuePhase {
    /// Nothing loaded yet
    Unloaded,
    /// Items remain and no batch is out
    AwaitingBatch,
    /// A batch is waiting for results
    BatchOutstanding,
    /// Every item retired
    Mastered,
}

/// Outcome of [`PracticeQueue::next_batch`]
#[derive(Debug, Clone, PartialEq)]
pub enum NextBatch {
    Ready {
        items: Vec<Arc<PracticeItem>>,
        /// The retry queue was moved into the active queue first
        recycled: bool,
    },
    Mastered,
}

/// Counts from one [`PracticeQueue::apply_results`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplySummary {
    pub passed: usize,
    pub warned: usize,
    pub failed: usize,
    /// Batch items with no result; requeued as failures
    pub missing: usize,
    /// Results for ids outside the batch, or repeats
    pub ignored: usize,
}

impl ApplySummary {
    pub fn retired(&self) -> usize {
        self.passed + self.warned
    }

    pub fn requeued(&self) -> usize {
        self.failed + self.missing
    }
}

/// Read-only progress snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub retry: usize,
    pub in_batch: usize,
    /// completed / total, 0.0 for an empty book
    pub fraction: f64,
    pub recycles: u32,
    pub phase: QueuePhase,
}

#[derive(Debug, Clone, Default)]
pub struct PracticeQueue {
    active: VecDeque<Arc<PracticeItem>>,
    retry: VecDeque<Arc<PracticeItem>>,
    batch: Vec<Arc<PracticeItem>>,
    retired: Vec<u32>,
    loaded_ids: Vec<u32>,
    last_results: Vec<GradeResult>,
    recycles: u32,
    loaded: bool,
}

impl PracticeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all state with a fresh pass over `book`.
    pub fn load(&mut self, book: &Book) {
        self.active = book.items().iter().cloned().collect();
        self.retry.clear();
        self.batch.clear();
        self.retired.clear();
        self.loaded_ids = book.ids().collect();
        self.last_results.clear();
        self.recycles = 0;
        self.loaded = true;
    }

    /// Moves up to `size` items from the front of the active queue into the
    /// batch, recycling the retry queue first if the active queue is empty.
    ///
    /// The previous batch must have been graded with
    /// [`apply_results`](Self::apply_results).
    pub fn next_batch(&mut self, size: usize) -> Result<NextBatch, QueueError> {
        if size == 0 {
            return Err(QueueError::ZeroBatchSize);
        }
        if !self.batch.is_empty() {
            return Err(QueueError::BatchOutstanding(self.batch.len()));
        }

        let mut recycled = false;
        if self.active.is_empty() {
            if self.retry.is_empty() {
                return Ok(NextBatch::Mastered);
            }
            self.active = std::mem::take(&mut self.retry);
            self.recycles += 1;
            recycled = true;
        }

        let take = size.min(self.active.len());
        self.batch = self.active.drain(..take).collect();
        debug_assert_eq!(self.check_invariant(), Ok(()));

        Ok(NextBatch::Ready {
            items: self.batch.clone(),
            recycled,
        })
    }

    /// Routes the outstanding batch by grade: pass and warning retire the
    /// item, fail (or no result at all) appends it to the retry queue.
    ///
    /// Results are sanitized first, so a silent transcript always fails.
    /// Results for ids outside the batch and repeated ids are ignored.
    pub fn apply_results<I>(&mut self, results: I) -> Result<ApplySummary, QueueError>
    where
        I: IntoIterator<Item = GradeResult>,
    {
        if self.batch.is_empty() {
            return Err(QueueError::NoOutstandingBatch);
        }

        let batch_ids: HashSet<u32> = self.batch.iter().map(|item| item.id).collect();
        let mut summary = ApplySummary::default();
        let mut by_id: HashMap<u32, GradeResult> = HashMap::with_capacity(self.batch.len());

        for result in results {
            let result = result.sanitized();
            if !batch_ids.contains(&result.id) || by_id.contains_key(&result.id) {
                summary.ignored += 1;
                continue;
            }
            by_id.insert(result.id, result);
        }

        let batch = std::mem::take(&mut self.batch);
        let mut applied = Vec::with_capacity(batch.len());

        for item in batch {
            let Some(result) = by_id.remove(&item.id) else {
                summary.missing += 1;
                self.retry.push_back(item);
                continue;
            };

            match result.status {
                GradeStatus::Pass => summary.passed += 1,
                GradeStatus::Warning => summary.warned += 1,
                GradeStatus::Fail => summary.failed += 1,
            }
            if result.status.retires_item() {
                self.retired.push(item.id);
            } else {
                self.retry.push_back(item);
            }
            applied.push(result);
        }

        self.last_results = applied;
        debug_assert_eq!(self.check_invariant(), Ok(()));

        Ok(summary)
    }

    pub fn phase(&self) -> QueuePhase {
        if !self.loaded {
            QueuePhase::Unloaded
        } else if !self.batch.is_empty() {
            QueuePhase::BatchOutstanding
        } else if self.active.is_empty() && self.retry.is_empty() {
            QueuePhase::Mastered
        } else {
            QueuePhase::AwaitingBatch
        }
    }

    pub fn is_mastered(&self) -> bool {
        self.phase() == QueuePhase::Mastered
    }

    pub fn total(&self) -> usize {
        self.loaded_ids.len()
    }

    /// total − |active| − |retry| − |batch|
    pub fn completed(&self) -> usize {
        self.total()
            .saturating_sub(self.active.len() + self.retry.len() + self.batch.len())
    }

    pub fn progress(&self) -> Progress {
        let total = self.total();
        let completed = self.completed();
        let fraction = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64
        };

        Progress {
            total,
            completed,
            remaining: self.active.len(),
            retry: self.retry.len(),
            in_batch: self.batch.len(),
            fraction,
            recycles: self.recycles,
            phase: self.phase(),
        }
    }

    pub fn current_batch(&self) -> &[Arc<PracticeItem>] {
        &self.batch
    }

    pub fn active_ids(&self) -> Vec<u32> {
        self.active.iter().map(|item| item.id).collect()
    }

    pub fn retry_ids(&self) -> Vec<u32> {
        self.retry.iter().map(|item| item.id).collect()
    }

    pub fn batch_ids(&self) -> Vec<u32> {
        self.batch.iter().map(|item| item.id).collect()
    }

    pub fn retired_ids(&self) -> &[u32] {
        &self.retired
    }

    /// Sanitized results of the most recent grading round
    pub fn last_results(&self) -> &[GradeResult] {
        &self.last_results
    }

    pub fn recycles(&self) -> u32 {
        self.recycles
    }

    /// Every loaded id sits in exactly one of {active, retry, batch, retired}.
    pub fn check_invariant(&self) -> Result<(), InvariantViolation> {
        let known: HashSet<u32> = self.loaded_ids.iter().copied().collect();
        let mut held = HashSet::with_capacity(known.len());

        let queued = self
            .active
            .iter()
            .chain(self.retry.iter())
            .chain(self.batch.iter())
            .map(|item| item.id);

        for id in queued.chain(self.retired.iter().copied()) {
            if !known.contains(&id) {
                return Err(InvariantViolation::Unknown(id));
            }
            if !held.insert(id) {
                return Err(InvariantViolation::Duplicate(id));
            }
        }

        match self.loaded_ids.iter().find(|id| !held.contains(id)) {
            Some(&id) => Err(InvariantViolation::Missing(id)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_BATCH_SIZE;

    fn book(ids: &[u32]) -> Book {
        Book::new(
            ids.iter()
                .map(|&id| PracticeItem::new(id, format!("短语{id}"), format!("phrase {id}")))
                .collect(),
        )
        .unwrap()
    }

    fn grade(id: u32, status: GradeStatus) -> GradeResult {
        GradeResult::new(id, status, format!("spoken {id}"), "")
    }

    fn ready_ids(outcome: NextBatch) -> (Vec<u32>, bool) {
        match outcome {
            NextBatch::Ready { items, recycled } => (items.iter().map(|i| i.id).collect(), recycled),
            NextBatch::Mastered => panic!("expected a batch"),
        }
    }

    /// Queue with active = [], retry = ids, batch = []
    fn queue_with_retry(ids: &[u32]) -> PracticeQueue {
        let mut queue = PracticeQueue::new();
        queue.load(&book(ids));
        queue.next_batch(ids.len()).unwrap();
        queue.apply_results(Vec::new()).unwrap();
        queue
    }

    // ==================== load ====================

    #[test]
    fn test_new_queue_is_unloaded() {
        let queue = PracticeQueue::new();
        assert_eq!(queue.phase(), QueuePhase::Unloaded);
        assert_eq!(queue.progress().fraction, 0.0);
    }

    #[test]
    fn test_load_fills_active_in_order() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[4, 2, 9]));
        assert_eq!(queue.active_ids(), vec![4, 2, 9]);
        assert!(queue.retry_ids().is_empty());
        assert!(queue.current_batch().is_empty());
        assert_eq!(queue.total(), 3);
        assert_eq!(queue.phase(), QueuePhase::AwaitingBatch);
    }

    #[test]
    fn test_load_empty_book_is_mastered() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[]));
        assert_eq!(queue.total(), 0);
        assert_eq!(queue.phase(), QueuePhase::Mastered);
        assert_eq!(queue.progress().fraction, 0.0);
        assert_eq!(queue.next_batch(5).unwrap(), NextBatch::Mastered);
    }

    #[test]
    fn test_reload_resets_everything() {
        let mut queue = queue_with_retry(&[1, 2, 3]);
        queue.next_batch(2).unwrap();
        queue.load(&book(&[7, 8]));
        assert_eq!(queue.active_ids(), vec![7, 8]);
        assert!(queue.retry_ids().is_empty());
        assert!(queue.current_batch().is_empty());
        assert!(queue.last_results().is_empty());
        assert_eq!(queue.recycles(), 0);
        assert_eq!(queue.completed(), 0);
        assert_eq!(queue.check_invariant(), Ok(()));
    }

    #[test]
    fn test_load_shares_items_with_book() {
        let source = book(&[1]);
        let mut queue = PracticeQueue::new();
        queue.load(&source);
        let (ids, _) = ready_ids(queue.next_batch(1).unwrap());
        assert_eq!(ids, vec![1]);
        assert!(Arc::ptr_eq(&queue.current_batch()[0], &source.items()[0]));
    }

    // ==================== next_batch ====================

    #[test]
    fn test_first_batch_is_prefix_of_book() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[1, 2, 3, 4, 5, 6, 7]));
        let (ids, recycled) = ready_ids(queue.next_batch(DEFAULT_BATCH_SIZE).unwrap());
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(!recycled);
        assert_eq!(queue.active_ids(), vec![6, 7]);
        assert_eq!(queue.phase(), QueuePhase::BatchOutstanding);
    }

    #[test]
    fn test_short_active_queue_gives_short_batch() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[1, 2]));
        let (ids, _) = ready_ids(queue.next_batch(5).unwrap());
        assert_eq!(ids, vec![1, 2]);
        assert!(queue.active_ids().is_empty());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[1]));
        assert_eq!(queue.next_batch(0), Err(QueueError::ZeroBatchSize));
        assert_eq!(queue.active_ids(), vec![1]);
    }

    #[test]
    fn test_outstanding_batch_blocks_next_batch() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[1, 2, 3]));
        queue.next_batch(2).unwrap();
        assert_eq!(queue.next_batch(2), Err(QueueError::BatchOutstanding(2)));
        assert_eq!(queue.batch_ids(), vec![1, 2]);
        assert_eq!(queue.active_ids(), vec![3]);
    }

    #[test]
    fn test_recycles_retry_queue_when_active_empty() {
        let mut queue = queue_with_retry(&[1, 2, 3]);
        assert!(queue.active_ids().is_empty());
        assert_eq!(queue.retry_ids(), vec![1, 2, 3]);

        let (ids, recycled) = ready_ids(queue.next_batch(5).unwrap());
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(recycled);
        assert!(queue.active_ids().is_empty());
        assert!(queue.retry_ids().is_empty());
        assert_eq!(queue.recycles(), 1);
    }

    #[test]
    fn test_recycle_preserves_order_and_leaves_remainder_active() {
        let mut queue = queue_with_retry(&[5, 6, 7, 8]);
        let (ids, recycled) = ready_ids(queue.next_batch(3).unwrap());
        assert_eq!(ids, vec![5, 6, 7]);
        assert!(recycled);
        assert_eq!(queue.active_ids(), vec![8]);
    }

    #[test]
    fn test_mastered_is_terminal_and_stateless() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[1]));
        queue.next_batch(5).unwrap();
        queue.apply_results(vec![grade(1, GradeStatus::Pass)]).unwrap();

        let before = queue.progress();
        assert_eq!(queue.next_batch(5).unwrap(), NextBatch::Mastered);
        assert_eq!(queue.next_batch(1).unwrap(), NextBatch::Mastered);
        assert_eq!(queue.progress(), before);
        assert_eq!(before.phase, QueuePhase::Mastered);
        assert_eq!(before.fraction, 1.0);
    }

    // ==================== apply_results ====================

    #[test]
    fn test_fail_routes_to_retry_and_pass_retires() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[1, 2]));
        queue.next_batch(5).unwrap();

        let summary = queue
            .apply_results(vec![grade(1, GradeStatus::Pass), grade(2, GradeStatus::Fail)])
            .unwrap();

        assert_eq!(queue.retry_ids(), vec![2]);
        assert!(queue.current_batch().is_empty());
        assert_eq!(queue.retired_ids(), &[1]);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(queue.completed(), 1);
    }

    #[test]
    fn test_warning_retires_item() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[1]));
        queue.next_batch(5).unwrap();
        let summary = queue.apply_results(vec![grade(1, GradeStatus::Warning)]).unwrap();
        assert_eq!(summary.warned, 1);
        assert!(queue.retry_ids().is_empty());
        assert!(queue.is_mastered());
    }

    #[test]
    fn test_missing_result_is_implicit_fail() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[1, 2]));
        queue.next_batch(5).unwrap();

        let summary = queue.apply_results(vec![grade(1, GradeStatus::Pass)]).unwrap();

        assert_eq!(queue.retry_ids(), vec![2]);
        assert!(queue.current_batch().is_empty());
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.requeued(), 1);
        assert_eq!(queue.last_results().len(), 1);
    }

    #[test]
    fn test_silent_pass_is_coerced_to_fail() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[1]));
        queue.next_batch(5).unwrap();

        let silent = GradeResult::new(1, GradeStatus::Pass, "no audio detected", "great job");
        let summary = queue.apply_results(vec![silent]).unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(queue.retry_ids(), vec![1]);
        assert_eq!(queue.last_results()[0].status, GradeStatus::Fail);
    }

    #[test]
    fn test_unknown_and_repeated_ids_are_ignored() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[1, 2, 3]));
        queue.next_batch(2).unwrap();

        let summary = queue
            .apply_results(vec![
                grade(1, GradeStatus::Fail),
                grade(1, GradeStatus::Pass),
                grade(3, GradeStatus::Pass),
                grade(42, GradeStatus::Pass),
                grade(2, GradeStatus::Pass),
            ])
            .unwrap();

        assert_eq!(summary.ignored, 3);
        assert_eq!(queue.retry_ids(), vec![1]);
        assert_eq!(queue.active_ids(), vec![3]);
        assert_eq!(queue.retired_ids(), &[2]);
        assert_eq!(queue.check_invariant(), Ok(()));
    }

    #[test]
    fn test_retry_follows_batch_order() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[1, 2, 3]));
        queue.next_batch(3).unwrap();
        queue
            .apply_results(vec![grade(3, GradeStatus::Fail), grade(1, GradeStatus::Fail)])
            .unwrap();
        assert_eq!(queue.retry_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_apply_without_batch_is_rejected() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[1]));
        assert_eq!(
            queue.apply_results(vec![grade(1, GradeStatus::Pass)]),
            Err(QueueError::NoOutstandingBatch)
        );
        assert_eq!(queue.active_ids(), vec![1]);
    }

    // ==================== full cycle ====================

    #[test]
    fn test_cycles_until_mastery() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[1, 2, 3, 4, 5, 6]));
        let mut attempts: HashMap<u32, u32> = HashMap::new();
        let mut rounds = 0;

        loop {
            let items = match queue.next_batch(4).unwrap() {
                NextBatch::Ready { items, .. } => items,
                NextBatch::Mastered => break,
            };
            // Even ids need two attempts
            let results: Vec<_> = items
                .iter()
                .map(|item| {
                    let n = attempts.entry(item.id).or_insert(0);
                    *n += 1;
                    let status = if item.id % 2 == 0 && *n < 2 {
                        GradeStatus::Fail
                    } else {
                        GradeStatus::Pass
                    };
                    grade(item.id, status)
                })
                .collect();
            queue.apply_results(results).unwrap();
            assert_eq!(queue.check_invariant(), Ok(()));
            rounds += 1;
            assert!(rounds < 10);
        }

        assert!(queue.is_mastered());
        assert_eq!(queue.completed(), 6);
        assert_eq!(queue.recycles(), 1);
        assert_eq!(attempts.values().sum::<u32>(), 9);
    }

    #[test]
    fn test_progress_counts() {
        let mut queue = PracticeQueue::new();
        queue.load(&book(&[1, 2, 3, 4]));
        queue.next_batch(2).unwrap();
        queue
            .apply_results(vec![grade(1, GradeStatus::Pass), grade(2, GradeStatus::Fail)])
            .unwrap();
        queue.next_batch(1).unwrap();

        let progress = queue.progress();
        assert_eq!(progress.total, 4);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.remaining, 1);
        assert_eq!(progress.retry, 1);
        assert_eq!(progress.in_batch, 1);
        assert_eq!(progress.fraction, 0.25);
        assert_eq!(progress.phase, QueuePhase::BatchOutstanding);
    }
}
