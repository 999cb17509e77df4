//! The cooperative timer queue.
//!
//! Every recurring loop and one-shot delay in the engine is a scheduled
//! task. The queue is a plain binary heap ordered by fire time, with a
//! monotonically increasing sequence number breaking ties so equal
//! deadlines fire in scheduling order. Cancellation is lazy; cancelled
//! handles are filtered out when they surface.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

/// Handle to a scheduled task, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// What a fired timer means to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Integrate the motion model one step.
    Motion,
    /// Consider small annoyances and pointer pranks.
    Annoy,
    /// Poll the foreground window for watch rules.
    ForegroundPoll,
    /// Drain the hunger bar.
    HungerTick,
    /// Scare-mode effect roll.
    ScaryTick,
    /// Try to start an image heist.
    ImageHeist,
    /// Try to start an editor heist.
    EditorHeist,
    /// Try to start a window-kill march.
    WindowKill,
    /// Try to start a mouse lock.
    MouseLock,
    /// Try to spawn a clone.
    CloneSpawn,
    /// Pulse the final-sequence dots.
    DotsFx,
    /// Give up on the final-sequence dots.
    FinalTimeout,
    /// Type the next farewell character.
    TypeMessage,
    /// Bring the agent back after the ending.
    Resurrect,
    /// Step the horror mini-game.
    HorrorTick,
}

#[derive(Debug)]
struct Entry {
    at: f64,
    seq: u64,
    handle: TaskHandle,
    kind: TaskKind,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .total_cmp(&other.at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-heap of pending tasks keyed by fire time.
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    cancelled: HashSet<TaskHandle>,
    next_id: u64,
    next_seq: u64,
}

impl TimerQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` to fire at engine time `at`.
    pub fn schedule(&mut self, at: f64, kind: TaskKind) -> TaskHandle {
        let handle = TaskHandle(self.next_id);
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry {
            at,
            seq,
            handle,
            kind,
        }));
        handle
    }

    /// Cancel a scheduled task. Cancelling an already-fired or unknown
    /// handle is a no-op.
    pub fn cancel(&mut self, handle: TaskHandle) {
        self.cancelled.insert(handle);
    }

    /// Pop the next task due at or before `now`, skipping cancelled ones.
    pub fn pop_due(&mut self, now: f64) -> Option<(TaskHandle, TaskKind, f64)> {
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.at > now {
                return None;
            }
            let Reverse(entry) = self.heap.pop()?;
            if self.cancelled.remove(&entry.handle) {
                continue;
            }
            return Some((entry.handle, entry.kind, entry.at));
        }
        None
    }

    /// Fire time of the next live task, if any.
    pub fn next_deadline(&mut self) -> Option<f64> {
        while let Some(Reverse(entry)) = self.heap.peek() {
            if self.cancelled.contains(&entry.handle) {
                let Reverse(entry) = self.heap.pop()?;
                self.cancelled.remove(&entry.handle);
                continue;
            }
            return Some(entry.at);
        }
        None
    }

    /// Number of live pending tasks.
    pub fn len(&self) -> usize {
        self.heap.len() - self.cancelled.len().min(self.heap.len())
    }

    /// Whether no live tasks are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_in_time_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(3.0, TaskKind::Motion);
        queue.schedule(1.0, TaskKind::Annoy);
        queue.schedule(2.0, TaskKind::HungerTick);

        let kinds: Vec<TaskKind> = std::iter::from_fn(|| queue.pop_due(10.0).map(|(_, k, _)| k))
            .collect();
        assert_eq!(
            kinds,
            vec![TaskKind::Annoy, TaskKind::HungerTick, TaskKind::Motion]
        );
    }

    #[test]
    fn test_equal_deadlines_fire_in_schedule_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(1.0, TaskKind::Motion);
        queue.schedule(1.0, TaskKind::Annoy);
        queue.schedule(1.0, TaskKind::ScaryTick);

        assert_eq!(queue.pop_due(1.0).map(|(_, k, _)| k), Some(TaskKind::Motion));
        assert_eq!(queue.pop_due(1.0).map(|(_, k, _)| k), Some(TaskKind::Annoy));
        assert_eq!(
            queue.pop_due(1.0).map(|(_, k, _)| k),
            Some(TaskKind::ScaryTick)
        );
    }

    #[test]
    fn test_not_due_yet() {
        let mut queue = TimerQueue::new();
        queue.schedule(5.0, TaskKind::Motion);
        assert!(queue.pop_due(4.9).is_none());
        assert!(queue.pop_due(5.0).is_some());
    }

    #[test]
    fn test_cancel_suppresses_task() {
        let mut queue = TimerQueue::new();
        let a = queue.schedule(1.0, TaskKind::Motion);
        queue.schedule(2.0, TaskKind::Annoy);
        queue.cancel(a);

        assert_eq!(queue.pop_due(10.0).map(|(_, k, _)| k), Some(TaskKind::Annoy));
        assert!(queue.pop_due(10.0).is_none());
    }

    #[test]
    fn test_cancel_unknown_handle_is_noop() {
        let mut queue = TimerQueue::new();
        let a = queue.schedule(1.0, TaskKind::Motion);
        queue.pop_due(1.0);
        queue.cancel(a);
        queue.schedule(2.0, TaskKind::Annoy);
        assert!(queue.pop_due(10.0).is_some());
    }

    #[test]
    fn test_next_deadline_skips_cancelled() {
        let mut queue = TimerQueue::new();
        let a = queue.schedule(1.0, TaskKind::Motion);
        queue.schedule(2.0, TaskKind::Annoy);
        queue.cancel(a);
        assert_eq!(queue.next_deadline(), Some(2.0));
    }

    #[test]
    fn test_len_accounts_for_cancellations() {
        let mut queue = TimerQueue::new();
        let a = queue.schedule(1.0, TaskKind::Motion);
        queue.schedule(2.0, TaskKind::Annoy);
        assert_eq!(queue.len(), 2);
        queue.cancel(a);
        assert_eq!(queue.len(), 1);
        assert!(!queue.is_empty());
    }
}
