//! Real-time scheduler backed by a tokio runtime.

use futures::future::abortable;
use tokio::{
  runtime::Handle,
  time::{self, Instant, MissedTickBehavior},
};

use super::{Duration, ExecutionTag, Scheduler, TaskHandle};
use crate::{error::SchedulerError, subscription::Subscription};

/// Horizon for offsets too large to add to an `Instant`, the same thirty
/// years tokio's `sleep` clamps to.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// The instant `after` from now, clamped to [`FAR_FUTURE`].
fn deadline(after: Duration) -> Instant {
  let now = Instant::now();
  now.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Spawns every task onto a tokio runtime.
///
/// Time is measured from the moment the scheduler was created.
#[derive(Clone)]
pub struct TokioScheduler {
  handle: Handle,
  epoch: Instant,
  tag: ExecutionTag,
}

impl TokioScheduler {
  /// Scheduler on the runtime the caller is running in.
  pub fn current() -> Result<Self, SchedulerError> {
    let handle = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
    Ok(Self::with_handle(handle))
  }

  pub fn with_handle(handle: Handle) -> Self {
    let epoch = {
      let _rt = handle.enter();
      Instant::now()
    };
    Self { handle, epoch, tag: ExecutionTag::unique() }
  }
}

impl Scheduler for TokioScheduler {
  fn now(&self) -> Duration { Instant::now().saturating_duration_since(self.epoch) }

  fn schedule<F>(&self, task: F, delay: Option<Duration>) -> TaskHandle
  where
    F: FnOnce() + Send + 'static,
  {
    let handle = TaskHandle::new();
    let tag = self.tag;
    let done = handle.clone();
    let (fut, abort) = abortable(async move {
      if let Some(delay) = delay {
        time::sleep(delay).await;
      }
      if done.is_closed() {
        return;
      }
      {
        let _tag = tag.enter();
        task();
      }
      done.mark_finished();
    });
    handle.set_abort(abort);
    self.handle.spawn(fut);
    handle
  }

  /// # Panics
  ///
  /// Panics if `period` is zero.
  fn schedule_periodic<F>(&self, start_after: Duration, period: Duration, mut task: F) -> TaskHandle
  where
    F: FnMut() + Send + 'static,
  {
    let handle = TaskHandle::new();
    let tag = self.tag;
    let alive = handle.clone();
    let start = {
      let _rt = self.handle.enter();
      deadline(start_after)
    };
    let mut interval = time::interval_at(start, period.min(FAR_FUTURE));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let (fut, abort) = abortable(async move {
      loop {
        interval.tick().await;
        if alive.is_closed() {
          break;
        }
        let _tag = tag.enter();
        task();
      }
    });
    handle.set_abort(abort);
    self.handle.spawn(fut);
    handle
  }

  fn tag(&self) -> ExecutionTag { self.tag }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use super::*;

  #[test]
  fn outside_runtime_is_an_error() {
    assert!(matches!(TokioScheduler::current(), Err(SchedulerError::NoRuntime)));
  }

  #[tokio::test(start_paused = true)]
  async fn delayed_task_runs_in_context() {
    let scheduler = TokioScheduler::current().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();
    let s = scheduler.clone();
    scheduler.schedule(
      move || {
        let _ = tx.send((s.is_current(), s.now()));
      },
      Some(Duration::from_secs(5)),
    );
    let (in_context, at) = rx.await.unwrap();
    assert!(in_context);
    assert!(at >= Duration::from_secs(5));
    assert!(!scheduler.is_current());
  }

  #[tokio::test(start_paused = true)]
  async fn cancelled_task_never_runs() {
    let scheduler = TokioScheduler::current().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let handle = scheduler.schedule(
      move || {
        h.fetch_add(1, Ordering::SeqCst);
      },
      Some(Duration::from_secs(1)),
    );
    handle.unsubscribe();
    time::sleep(Duration::from_secs(2)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn periodic_ticks_until_cancelled() {
    let scheduler = TokioScheduler::current().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let handle = scheduler.schedule_periodic(
      Duration::from_millis(100),
      Duration::from_millis(100),
      move || {
        h.fetch_add(1, Ordering::SeqCst);
      },
    );
    time::sleep(Duration::from_millis(350)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    handle.unsubscribe();
    time::sleep(Duration::from_millis(500)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn unreachable_start_is_clamped() {
    let scheduler = TokioScheduler::current().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let handle = scheduler.schedule_periodic(Duration::MAX / 2, Duration::MAX / 4, move || {
      h.fetch_add(1, Ordering::SeqCst);
    });
    time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(!handle.is_closed());
    handle.unsubscribe();
  }

  #[test]
  fn deadline_saturates() {
    let before = Instant::now();
    assert!(deadline(Duration::from_secs(1)) >= before + Duration::from_secs(1));
    assert!(deadline(Duration::MAX) >= before + FAR_FUTURE);
  }
}
