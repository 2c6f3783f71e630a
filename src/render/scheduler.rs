// ============================================================================
// DEFERRED SCHEDULER: virtual-clock event loop with cancellable tasks
// ============================================================================
//
// Redraw work that must not block the caller is queued here instead of being
// run inline. The owner drives the clock with `advance()` and drains ready jobs
// one per cycle with `next_ready()`, so tests never need a real timer.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TaskState {
    Waiting,
    Cancelled,
    Done,
}

/// Handle to a scheduled job. Cancelling only drops the pending job; a job
/// that already ran is unaffected.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    id: u64,
    state: Rc<Cell<TaskState>>,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        if self.state.get() == TaskState::Waiting {
            self.state.set(TaskState::Cancelled);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.get() == TaskState::Cancelled
    }

    /// Handed out by `next_ready`.
    pub fn is_done(&self) -> bool {
        self.state.get() == TaskState::Done
    }

    /// Neither run nor cancelled yet.
    pub fn is_waiting(&self) -> bool {
        self.state.get() == TaskState::Waiting
    }
}

struct Pending<J> {
    job: J,
    state: Rc<Cell<TaskState>>,
}

impl<J> Pending<J> {
    fn is_live(&self) -> bool {
        self.state.get() == TaskState::Waiting
    }
}

/// Single-threaded deferred job queue keyed by due time, FIFO within a tick.
pub struct Scheduler<J> {
    now_ms: u64,
    next_id: u64,
    queue: BTreeMap<(u64, u64), Pending<J>>,
}

impl<J> Default for Scheduler<J> {
    fn default() -> Self {
        Self::new()
    }
}

impl<J> Scheduler<J> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_id: 0,
            queue: BTreeMap::new(),
        }
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Queue `job` to become ready `delay_ms` from now.
    pub fn schedule(&mut self, delay_ms: u64, job: J) -> TaskHandle {
        let id = self.next_id;
        self.next_id += 1;
        let state = Rc::new(Cell::new(TaskState::Waiting));
        self.queue.insert(
            (self.now_ms.saturating_add(delay_ms), id),
            Pending {
                job,
                state: Rc::clone(&state),
            },
        );
        TaskHandle { id, state }
    }

    /// Move the clock forward.
    pub fn advance(&mut self, ms: u64) {
        self.now_ms = self.now_ms.saturating_add(ms);
    }

    /// Pop the earliest job that is due and not cancelled. Cancelled entries
    /// met on the way are dropped.
    pub fn next_ready(&mut self) -> Option<J> {
        loop {
            let (&key, _) = self.queue.first_key_value()?;
            if key.0 > self.now_ms {
                return None;
            }
            let pending = self.queue.remove(&key)?;
            if pending.is_live() {
                pending.state.set(TaskState::Done);
                return Some(pending.job);
            }
        }
    }

    /// Live (not cancelled) jobs still queued, due or not.
    pub fn pending(&self) -> usize {
        self.queue.values().filter(|p| p.is_live()).count()
    }

    /// Drop cancelled entries eagerly.
    pub fn purge_cancelled(&mut self) {
        self.queue.retain(|_, p| p.is_live());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_wait_for_their_due_time() {
        let mut s = Scheduler::new();
        s.schedule(50, "a");
        assert_eq!(s.next_ready(), None);
        s.advance(49);
        assert_eq!(s.next_ready(), None);
        s.advance(1);
        assert_eq!(s.next_ready(), Some("a"));
        assert_eq!(s.next_ready(), None);
    }

    #[test]
    fn same_tick_runs_in_submission_order() {
        let mut s = Scheduler::new();
        for n in 0..4 {
            s.schedule(0, n);
        }
        let order: Vec<_> = std::iter::from_fn(|| s.next_ready()).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn cancelled_jobs_never_run() {
        let mut s = Scheduler::new();
        let a = s.schedule(0, 'a');
        s.schedule(0, 'b');
        a.cancel();
        assert!(a.is_cancelled());
        assert_eq!(s.pending(), 1);
        assert_eq!(s.next_ready(), Some('b'));
        assert_eq!(s.next_ready(), None);
    }

    #[test]
    fn handles_report_completion() {
        let mut s = Scheduler::new();
        let a = s.schedule(0, 1);
        assert!(a.is_waiting());
        assert_eq!(s.next_ready(), Some(1));
        assert!(a.is_done());
        a.cancel();
        assert!(!a.is_cancelled());
        assert!(!a.is_waiting());
    }
}
