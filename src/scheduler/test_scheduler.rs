//! Test Scheduler for deterministic testing of time-based operators.
//!
//! Provides virtual time that only advances when explicitly instructed,
//! enabling deterministic testing of timers, throttles and resubscription.
//!
//! # Features
//!
//! - **Virtual Time**: Simulated time that only advances when explicitly
//!   instructed
//! - **Synchronous Execution**: Tasks execute synchronously on the thread that
//!   advances the time
//! - **Suspension**: `suspend()` / `resume()` model a frozen host process.
//!   Tasks falling due while suspended are dropped; periodic tasks keep their
//!   grid and fire again after resume
//!
//! # Usage
//!
//! ```rust
//! use rxwake::prelude::*;
//!
//! let scheduler = TestScheduler::new();
//! let fired = MutArc::own(false);
//! let f = fired.clone();
//! scheduler.schedule(move || *f.rc_deref_mut() = true, Some(Duration::from_millis(100)));
//!
//! scheduler.advance_by(Duration::from_millis(99));
//! assert!(!*fired.rc_deref());
//! scheduler.advance_by(Duration::from_millis(1));
//! assert!(*fired.rc_deref());
//! ```
//!
//! Every instance owns its clock and queue; clones share them.

use std::{cmp::Ordering, collections::BinaryHeap};

use super::{Duration, ExecutionTag, Scheduler, TaskHandle};
use crate::{
  rc::{MutArc, RcDeref, RcDerefMut},
  subscription::Subscription,
};

// ==================== Internal State ====================

#[derive(Default)]
struct TestSchedulerState {
  virtual_time: Duration,
  task_queue: BinaryHeap<ScheduledTask>,
  next_task_id: usize,
  suspended: bool,
}

enum TaskKind {
  Once(Box<dyn FnOnce() + Send>),
  Periodic { period: Duration, task: Box<dyn FnMut() + Send> },
}

struct ScheduledTask {
  scheduled_time: Duration,
  task_id: usize,
  kind: TaskKind,
  handle: TaskHandle,
}

impl PartialEq for ScheduledTask {
  fn eq(&self, other: &Self) -> bool {
    self.scheduled_time == other.scheduled_time && self.task_id == other.task_id
  }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ScheduledTask {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by task_id
    other
      .scheduled_time
      .cmp(&self.scheduled_time)
      .then_with(|| other.task_id.cmp(&self.task_id))
  }
}

impl TestSchedulerState {
  fn push(&mut self, scheduled_time: Duration, kind: TaskKind, handle: TaskHandle) {
    let task_id = self.next_task_id;
    self.next_task_id += 1;
    self
      .task_queue
      .push(ScheduledTask { scheduled_time, task_id, kind, handle });
  }
}

// ==================== TestScheduler ====================

/// A virtual time scheduler for deterministic testing.
#[derive(Clone)]
pub struct TestScheduler {
  state: MutArc<TestSchedulerState>,
  tag: ExecutionTag,
}

impl Default for TestScheduler {
  fn default() -> Self { Self::new() }
}

impl TestScheduler {
  /// A scheduler at virtual time zero with an empty queue.
  pub fn new() -> Self {
    Self { state: MutArc::own(TestSchedulerState::default()), tag: ExecutionTag::unique() }
  }

  /// Get the number of pending tasks in the queue, cancelled ones included.
  pub fn pending_count(&self) -> usize { self.state.rc_deref().task_queue.len() }

  /// Number of pending tasks that can still run.
  pub fn active_count(&self) -> usize {
    self
      .state
      .rc_deref()
      .task_queue
      .iter()
      .filter(|t| !t.handle.is_closed())
      .count()
  }

  /// Check if there are no pending tasks.
  pub fn is_empty(&self) -> bool { self.state.rc_deref().task_queue.is_empty() }

  /// Freeze the simulated host: tasks falling due from now on are dropped
  /// until [`resume`](Self::resume).
  pub fn suspend(&self) { self.state.rc_deref_mut().suspended = true; }

  pub fn resume(&self) { self.state.rc_deref_mut().suspended = false; }

  pub fn is_suspended(&self) -> bool { self.state.rc_deref().suspended }

  /// Advance virtual time by the specified duration and execute due tasks.
  ///
  /// Tasks are executed in order of their scheduled time, with FIFO ordering
  /// for tasks scheduled at the same time. Tasks scheduled by running tasks
  /// are picked up in the same call when they fall due before the target.
  pub fn advance_by(&self, duration: Duration) {
    let target = self.state.rc_deref().virtual_time + duration;
    self.advance_to(target);
  }

  /// Advance virtual time to `target` and execute due tasks. A target in the
  /// past only runs the tasks that are already due.
  pub fn advance_to(&self, target: Duration) {
    self.execute_tasks_until(target);
    let mut state = self.state.rc_deref_mut();
    if state.virtual_time < target {
      state.virtual_time = target;
    }
  }

  fn execute_tasks_until(&self, target: Duration) {
    loop {
      let next = {
        let mut state = self.state.rc_deref_mut();
        let due = state
          .task_queue
          .peek()
          .is_some_and(|peek| peek.scheduled_time <= target);
        if !due {
          break;
        }
        state.task_queue.pop().map(|task| {
          if state.virtual_time < task.scheduled_time {
            state.virtual_time = task.scheduled_time;
          }
          (task, state.suspended)
        })
      };

      let Some((task, suspended)) = next else {
        break;
      };
      self.run(task, suspended);
    }
  }

  fn run(&self, task: ScheduledTask, suspended: bool) {
    let ScheduledTask { scheduled_time, kind, handle, .. } = task;
    if handle.is_closed() {
      return;
    }

    match kind {
      TaskKind::Once(task) => {
        if !suspended {
          let _tag = self.tag.enter();
          task();
        }
        handle.mark_finished();
      }
      TaskKind::Periodic { period, mut task } => {
        if !suspended {
          let _tag = self.tag.enter();
          task();
        }
        if !handle.is_closed() {
          self.state.rc_deref_mut().push(
            scheduled_time + period,
            TaskKind::Periodic { period, task },
            handle,
          );
        }
      }
    }
  }
}

impl Scheduler for TestScheduler {
  fn now(&self) -> Duration { self.state.rc_deref().virtual_time }

  fn schedule<F>(&self, task: F, delay: Option<Duration>) -> TaskHandle
  where
    F: FnOnce() + Send + 'static,
  {
    let handle = TaskHandle::new();
    let mut state = self.state.rc_deref_mut();
    let at = state.virtual_time + delay.unwrap_or(Duration::ZERO);
    state.push(at, TaskKind::Once(Box::new(task)), handle.clone());
    handle
  }

  /// # Panics
  ///
  /// Panics if `period` is zero.
  fn schedule_periodic<F>(&self, start_after: Duration, period: Duration, task: F) -> TaskHandle
  where
    F: FnMut() + Send + 'static,
  {
    assert!(!period.is_zero(), "periodic task requires a non-zero period");
    let handle = TaskHandle::new();
    let mut state = self.state.rc_deref_mut();
    let at = state.virtual_time + start_after;
    state.push(at, TaskKind::Periodic { period, task: Box::new(task) }, handle.clone());
    handle
  }

  fn tag(&self) -> ExecutionTag { self.tag }
}
