//! Owned poll tasks for backends that cannot block.
//!
//! Each task is a closure polled at its own interval until it reports
//! [`TaskStatus::Done`], at which point the scheduler drops it. Nothing frees
//! itself from inside its own callback.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Done,
}

impl From<bool> for TaskStatus {
    fn from(done: bool) -> Self {
        if done {
            TaskStatus::Done
        } else {
            TaskStatus::Pending
        }
    }
}

struct Task {
    interval: Duration,
    next_due: Instant,
    poll: Box<dyn FnMut() -> TaskStatus>,
}

#[derive(Default)]
struct SchedulerState {
    next_id: u64,
    tasks: BTreeMap<TaskId, Task>,
    /// Tasks taken out for the tick in progress.
    running: BTreeSet<TaskId>,
    /// Running tasks cancelled by another task during the same tick.
    cancelled: BTreeSet<TaskId>,
}

/// Handle to a single-threaded poll scheduler. Clones share the same tasks.
///
/// Polls may schedule or cancel tasks, including themselves; `tick` takes the
/// due tasks out before polling them so no borrow is held across a poll.
#[derive(Clone, Default)]
pub struct Scheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task that is first polled one `interval` from now.
    pub fn schedule(
        &self,
        interval: Duration,
        poll: impl FnMut() -> TaskStatus + 'static,
    ) -> TaskId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = TaskId(state.next_id);
        state.tasks.insert(
            id,
            Task {
                interval,
                next_due: Instant::now() + interval,
                poll: Box::new(poll),
            },
        );
        log::debug!("scheduled {id} every {interval:?}");
        id
    }

    /// Removes a task. Returns `false` if it had already finished.
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.state.borrow_mut();
        if state.tasks.remove(&id).is_some() {
            log::debug!("cancelled {id}");
            return true;
        }

        if state.running.contains(&id) {
            state.cancelled.insert(id);
            log::debug!("cancelled {id} while running");
            return true;
        }

        false
    }

    pub fn is_scheduled(&self, id: TaskId) -> bool {
        let state = self.state.borrow();
        (state.tasks.contains_key(&id) || state.running.contains(&id))
            && !state.cancelled.contains(&id)
    }

    pub fn len(&self) -> usize {
        let state = self.state.borrow();
        state.tasks.len() + state.running.len() - state.cancelled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Earliest instant at which some task is due.
    pub fn next_due(&self) -> Option<Instant> {
        self.state
            .borrow()
            .tasks
            .values()
            .map(|task| task.next_due)
            .min()
    }

    /// Polls every task due at `now` once, in id order. Returns how many
    /// tasks finished.
    pub fn tick(&self, now: Instant) -> usize {
        let due: Vec<(TaskId, Task)> = {
            let mut state = self.state.borrow_mut();
            let ids: Vec<TaskId> = state
                .tasks
                .iter()
                .filter(|(_, task)| task.next_due <= now)
                .map(|(id, _)| *id)
                .collect();

            let mut due = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(task) = state.tasks.remove(&id) {
                    state.running.insert(id);
                    due.push((id, task));
                }
            }
            due
        };

        let mut finished = 0;
        for (id, mut task) in due {
            let cancelled_before = self.state.borrow().cancelled.contains(&id);
            let status = if cancelled_before {
                TaskStatus::Done
            } else {
                (task.poll)()
            };

            let mut state = self.state.borrow_mut();
            state.running.remove(&id);
            let cancelled = state.cancelled.remove(&id);

            match status {
                TaskStatus::Done => {
                    if !cancelled {
                        finished += 1;
                        log::debug!("{id} finished");
                    }
                }
                TaskStatus::Pending if cancelled => {}
                TaskStatus::Pending => {
                    task.next_due = now + task.interval;
                    state.tasks.insert(id, task);
                }
            }
        }

        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn later(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[test]
    fn task_runs_until_done_then_is_dropped() {
        let scheduler = Scheduler::new();
        let polls = Rc::new(Cell::new(0));
        let counter = polls.clone();

        let id = scheduler.schedule(Duration::from_millis(10), move || {
            counter.set(counter.get() + 1);
            TaskStatus::from(counter.get() == 3)
        });

        assert_eq!(scheduler.tick(Instant::now()), 0, "not due yet");
        assert_eq!(polls.get(), 0);

        assert_eq!(scheduler.tick(later(1_000)), 0);
        assert_eq!(scheduler.tick(later(2_000)), 0);
        assert_eq!(scheduler.tick(later(3_000)), 1);
        assert_eq!(polls.get(), 3);
        assert!(!scheduler.is_scheduled(id));
        assert!(scheduler.is_empty());

        assert_eq!(scheduler.tick(later(4_000)), 0);
        assert_eq!(polls.get(), 3);
    }

    #[test]
    fn cancel_removes_pending_task() {
        let scheduler = Scheduler::new();
        let id = scheduler.schedule(Duration::ZERO, || TaskStatus::Pending);
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert_eq!(scheduler.tick(later(10)), 0);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn tasks_may_schedule_and_cancel_during_tick() {
        let scheduler = Scheduler::new();
        let spawned = Rc::new(Cell::new(false));

        let victim = scheduler.schedule(Duration::ZERO, || TaskStatus::Pending);
        let inner = scheduler.clone();
        let flag = spawned.clone();
        scheduler.schedule(Duration::ZERO, move || {
            inner.cancel(victim);
            inner.schedule(Duration::ZERO, || TaskStatus::Done);
            flag.set(true);
            TaskStatus::Done
        });

        assert_eq!(scheduler.tick(later(10)), 1);
        assert!(spawned.get());
        assert!(!scheduler.is_scheduled(victim));
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.tick(later(20)), 1);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn task_cancelling_itself_is_not_counted() {
        let scheduler = Scheduler::new();
        let handle = scheduler.clone();
        let own_id: Rc<Cell<Option<TaskId>>> = Rc::new(Cell::new(None));
        let lookup = own_id.clone();

        let id = scheduler.schedule(Duration::ZERO, move || {
            if let Some(id) = lookup.get() {
                handle.cancel(id);
            }
            TaskStatus::Pending
        });
        own_id.set(Some(id));

        assert_eq!(scheduler.tick(later(10)), 0);
        assert!(scheduler.is_empty());
    }
}
