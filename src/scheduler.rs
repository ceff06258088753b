//! Scheduling capability consumed by the time-based operators.
//!
//! A [`Scheduler`] can tell the time, run a task now or after a delay, and
//! run a task periodically. Every task runs with the scheduler's
//! [`ExecutionTag`] entered on the executing thread, which lets operators
//! detect that they are being driven from the same context that executes
//! their work.
//!
//! Two schedulers ship with the crate:
//!
//! - [`TestScheduler`]: virtual time, advanced explicitly. It can also simulate
//!   a suspended host process.
//! - [`TokioScheduler`] (feature `tokio-scheduler`): real time on a tokio
//!   runtime.

use std::{
  cell::Cell,
  sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, PoisonError,
  },
};

use futures::future::AbortHandle;
pub use std::time::Duration;

use crate::subscription::Subscription;

pub mod test_scheduler;
#[cfg(feature = "tokio-scheduler")]
pub mod tokio_scheduler;

pub use test_scheduler::TestScheduler;
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

/// A Scheduler is an object to order tasks and schedule their execution.
///
/// Time is reported as the [`Duration`] elapsed since the scheduler's own
/// epoch. Only differences between two readings of the same scheduler are
/// meaningful.
pub trait Scheduler: Clone + Send + Sync + 'static {
  /// Current time of this scheduler.
  fn now(&self) -> Duration;

  /// Run `task` once, after `delay` if given, otherwise as soon as possible.
  fn schedule<F>(&self, task: F, delay: Option<Duration>) -> TaskHandle
  where
    F: FnOnce() + Send + 'static;

  /// Run `task` first after `start_after` and then every `period`.
  ///
  /// Occurrences stay on the grid `start + n * period`; an occurrence that
  /// cannot run in time is skipped rather than bunched up.
  fn schedule_periodic<F>(&self, start_after: Duration, period: Duration, task: F) -> TaskHandle
  where
    F: FnMut() + Send + 'static;

  /// The tag entered while this scheduler executes a task.
  fn tag(&self) -> ExecutionTag;

  /// Whether the calling code runs inside a task of this scheduler.
  fn is_current(&self) -> bool { self.tag().is_current() }
}

// ==================== TaskHandle ====================

/// Cancellation handle of a scheduled task.
///
/// Clones share the same state. Unsubscribing prevents every future run of
/// the task; a run that already started is not interrupted.
#[derive(Clone, Default)]
pub struct TaskHandle(Arc<HandleState>);

#[derive(Default)]
struct HandleState {
  closed: AtomicBool,
  abort: Mutex<Option<AbortHandle>>,
}

impl TaskHandle {
  pub fn new() -> Self { Self::default() }

  /// A handle for a task that already ran to completion.
  pub fn finished() -> Self {
    let handle = Self::new();
    handle.mark_finished();
    handle
  }

  /// Marks the task as done without cancelling anything.
  pub fn mark_finished(&self) { self.0.closed.store(true, Ordering::Release); }

  /// Attaches the abort handle of the future driving the task. If the handle
  /// is already closed the future is aborted right away.
  pub fn set_abort(&self, abort: AbortHandle) {
    if self.is_closed() {
      abort.abort();
      return;
    }
    *self
      .0
      .abort
      .lock()
      .unwrap_or_else(PoisonError::into_inner) = Some(abort);
  }

  /// Same as `unsubscribe`, callable on a shared reference.
  pub fn cancel(&self) {
    self.0.closed.store(true, Ordering::Release);
    let abort = self
      .0
      .abort
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    if let Some(abort) = abort {
      abort.abort();
    }
  }
}

impl Subscription for TaskHandle {
  #[inline]
  fn unsubscribe(self) { self.cancel() }

  #[inline]
  fn is_closed(&self) -> bool { self.0.closed.load(Ordering::Acquire) }
}

// ==================== ExecutionTag ====================

static NEXT_TAG: AtomicUsize = AtomicUsize::new(1);

thread_local! {
  static CURRENT_TAG: Cell<usize> = const { Cell::new(0) };
}

/// Identifies one execution context.
///
/// A scheduler owns one tag; every clone of the scheduler shares it. While a
/// task runs, the tag is entered on the executing thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExecutionTag(usize);

impl ExecutionTag {
  /// A tag no other context uses.
  pub fn unique() -> Self { Self(NEXT_TAG.fetch_add(1, Ordering::Relaxed)) }

  /// Marks the current thread as running inside this context until the guard
  /// is dropped. Nested entries restore the outer tag.
  pub fn enter(self) -> TagGuard {
    let previous = CURRENT_TAG.with(|cell| cell.replace(self.0));
    TagGuard { previous }
  }

  pub fn is_current(self) -> bool { CURRENT_TAG.with(|cell| cell.get() == self.0) }
}

/// Restores the previously entered tag on drop.
#[must_use]
pub struct TagGuard {
  previous: usize,
}

impl Drop for TagGuard {
  fn drop(&mut self) { CURRENT_TAG.with(|cell| cell.set(self.previous)); }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn handle_clones_share_closed_state() {
    let handle = TaskHandle::new();
    let clone = handle.clone();
    assert!(!clone.is_closed());
    handle.unsubscribe();
    assert!(clone.is_closed());
    assert!(TaskHandle::finished().is_closed());
  }

  #[test]
  fn abort_attached_after_cancel_fires_immediately() {
    let handle = TaskHandle::new();
    handle.cancel();
    let (abort, registration) = AbortHandle::new_pair();
    let fut = futures::future::Abortable::new(async {}, registration);
    handle.set_abort(abort);
    assert!(futures::executor::block_on(fut).is_err());
  }

  #[test]
  fn tags_nest_and_restore() {
    let outer = ExecutionTag::unique();
    let inner = ExecutionTag::unique();
    assert_ne!(outer, inner);
    assert!(!outer.is_current());
    {
      let _o = outer.enter();
      assert!(outer.is_current());
      {
        let _i = inner.enter();
        assert!(inner.is_current());
        assert!(!outer.is_current());
      }
      assert!(outer.is_current());
    }
    assert!(!outer.is_current());
  }

  #[test]
  fn tags_are_per_thread() {
    let tag = ExecutionTag::unique();
    let _guard = tag.enter();
    let seen = std::thread::spawn(move || tag.is_current()).join().unwrap();
    assert!(!seen);
    assert!(tag.is_current());
  }
}
