#![forbid(unsafe_code)]

//! Cooperative two-lane task scheduler.
//!
//! All deferred work in weft (batched broadcasts, bind confirmation, mutation
//! delivery) runs through a [`Scheduler`]: a cheap cloneable handle over two
//! FIFO lanes.
//!
//! - The **tick** lane models "run on the next turn of the event loop".
//! - The **idle** lane models "run when nothing more urgent is pending".
//!
//! The host decides when turns happen by calling [`Scheduler::tick`] and
//! [`Scheduler::run_idle`]; tests usually call [`Scheduler::run_until_idle`]
//! to settle everything.
//!
//! # Invariants
//!
//! 1. Draining a lane takes a snapshot first: tasks scheduled *while* the
//!    lane runs land in the next drain, so a self-rescheduling task cannot
//!    starve the loop.
//! 2. Tasks within one lane run in FIFO order.
//! 3. Scheduling from inside a running task is always legal (no re-entrant
//!    borrow of the queues is held while tasks execute).
//! 4. Dropping the last handle drops pending tasks without running them.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Handle to a pair of cooperative task queues.
///
/// Clones share the same queues. Single-threaded; tasks run on whichever
/// call drains their lane.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<Lanes>>,
}

struct Lanes {
    tick: VecDeque<Task>,
    idle: VecDeque<Task>,
}

impl Scheduler {
    /// Create a scheduler with empty lanes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Lanes {
                tick: VecDeque::new(),
                idle: VecDeque::new(),
            })),
        }
    }

    /// Queue `task` to run on the next turn.
    pub fn schedule(&self, task: impl FnOnce() + 'static) {
        self.inner.borrow_mut().tick.push_back(Box::new(task));
    }

    /// Queue `task` to run when the host is idle.
    pub fn schedule_idle(&self, task: impl FnOnce() + 'static) {
        self.inner.borrow_mut().idle.push_back(Box::new(task));
    }

    /// Run one turn: drain the tick lane as it stood on entry.
    ///
    /// Returns the number of tasks run.
    pub fn tick(&self) -> usize {
        let batch = std::mem::take(&mut self.inner.borrow_mut().tick);
        self.run_batch(batch)
    }

    /// Drain the idle lane as it stood on entry.
    ///
    /// Returns the number of tasks run.
    pub fn run_idle(&self) -> usize {
        let batch = std::mem::take(&mut self.inner.borrow_mut().idle);
        self.run_batch(batch)
    }

    /// Alternate tick and idle drains until both lanes are empty.
    ///
    /// Returns the total number of tasks run. Idle tasks only run once the
    /// tick lane is exhausted, matching the "when nothing more urgent"
    /// contract.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let ticked = self.tick();
            ran += ticked;
            if ticked > 0 {
                continue;
            }
            let idled = self.run_idle();
            ran += idled;
            if idled == 0 {
                return ran;
            }
        }
    }

    /// Number of tasks waiting in the tick lane.
    #[must_use]
    pub fn pending_ticks(&self) -> usize {
        self.inner.borrow().tick.len()
    }

    /// Number of tasks waiting in the idle lane.
    #[must_use]
    pub fn pending_idle(&self) -> usize {
        self.inner.borrow().idle.len()
    }

    /// True when both lanes are empty.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        let lanes = self.inner.borrow();
        lanes.tick.is_empty() && lanes.idle.is_empty()
    }

    fn run_batch(&self, batch: VecDeque<Task>) -> usize {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("scheduler_drain", tasks = batch.len()).entered();
        let count = batch.len();
        for task in batch {
            task();
        }
        count
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lanes = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("pending_ticks", &lanes.tick.len())
            .field("pending_idle", &lanes.idle.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn tick_runs_queued_tasks_in_order() {
        let sched = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = Rc::clone(&log);
            sched.schedule(move || log.borrow_mut().push(i));
        }
        assert_eq!(sched.pending_ticks(), 3);
        assert_eq!(sched.tick(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(sched.is_settled());
    }

    #[test]
    fn task_scheduled_during_tick_waits_for_next_tick() {
        let sched = Scheduler::new();
        let ran = Rc::new(Cell::new(false));

        let inner_sched = sched.clone();
        let inner_ran = Rc::clone(&ran);
        sched.schedule(move || {
            let r = Rc::clone(&inner_ran);
            inner_sched.schedule(move || r.set(true));
        });

        assert_eq!(sched.tick(), 1);
        assert!(!ran.get(), "nested task must not run in the same turn");
        assert_eq!(sched.tick(), 1);
        assert!(ran.get());
    }

    #[test]
    fn idle_lane_is_independent_of_tick_lane() {
        let sched = Scheduler::new();
        let idle_ran = Rc::new(Cell::new(false));

        let r = Rc::clone(&idle_ran);
        sched.schedule_idle(move || r.set(true));
        sched.schedule(|| {});

        assert_eq!(sched.tick(), 1);
        assert!(!idle_ran.get(), "tick must not drain the idle lane");
        assert_eq!(sched.run_idle(), 1);
        assert!(idle_ran.get());
    }

    #[test]
    fn run_until_idle_settles_interleaved_work() {
        let sched = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        // An idle task that schedules a tick task, which schedules another
        // idle task. run_until_idle must chase the whole chain.
        let s1 = sched.clone();
        let l1 = Rc::clone(&log);
        sched.schedule_idle(move || {
            l1.borrow_mut().push("idle-1");
            let s2 = s1.clone();
            let l2 = Rc::clone(&l1);
            s1.schedule(move || {
                l2.borrow_mut().push("tick-2");
                let l3 = Rc::clone(&l2);
                s2.schedule_idle(move || l3.borrow_mut().push("idle-3"));
            });
        });

        assert_eq!(sched.run_until_idle(), 3);
        assert_eq!(*log.borrow(), vec!["idle-1", "tick-2", "idle-3"]);
        assert!(sched.is_settled());
    }

    #[test]
    fn ticks_drain_before_idle_in_run_until_idle() {
        let sched = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = Rc::clone(&log);
        sched.schedule_idle(move || l.borrow_mut().push("idle"));
        let l = Rc::clone(&log);
        sched.schedule(move || l.borrow_mut().push("tick"));

        sched.run_until_idle();
        assert_eq!(*log.borrow(), vec!["tick", "idle"]);
    }

    #[test]
    fn clones_share_queues() {
        let a = Scheduler::new();
        let b = a.clone();
        let ran = Rc::new(Cell::new(false));

        let r = Rc::clone(&ran);
        a.schedule(move || r.set(true));
        assert_eq!(b.pending_ticks(), 1);
        b.tick();
        assert!(ran.get());
    }

    #[test]
    fn debug_reports_pending_counts() {
        let sched = Scheduler::new();
        sched.schedule(|| {});
        sched.schedule_idle(|| {});
        sched.schedule_idle(|| {});
        let debug = format!("{sched:?}");
        assert!(debug.contains("pending_ticks: 1"));
        assert!(debug.contains("pending_idle: 2"));
    }
}
