//! Timer that survives host suspension.
//!
//! A regular timer relies on the scheduler noticing that its due time has
//! passed. When the whole process is frozen (a mobile app in the background,
//! a laptop lid closed) the underlying clock keeps running but the scheduler
//! does not, and after resuming the pending timer may fire late or never.
//!
//! [`wake_aware_timer`] listens to a wake signal, an external event that is
//! believed to follow a resume, and on every occurrence rebuilds its pending
//! tick from the anchor taken at subscription:
//!
//! - due time not reached yet: wait for the remaining time;
//! - due time passed without a tick: tick right away;
//! - a periodic tick was missed: tick right away, then continue on the grid
//!   `anchor + due_time + n * period`.
//!
//! A one-shot timer completes after its tick and stops listening to the wake
//! signal.

use std::{convert::Infallible, mem, sync::Arc};

use smallvec::SmallVec;

use crate::{
  config::TimerSpec,
  diagnostic::{default_sink, Diagnostic, SharedSink},
  observable::Observable,
  observer::{FnMutObserver, Observer},
  rc::{MutArc, RcDeref, RcDerefMut},
  scheduler::{Duration, Scheduler, TaskHandle},
  subscription::{BoxedSubscription, Subscription},
};

/// Returns an observable of ticks following `spec`, kept on time across host
/// suspensions reported by `wake`.
///
/// # Examples
///
/// ```
/// use rxwake::prelude::*;
///
/// let scheduler = TestScheduler::new();
/// let wake = Subject::<(), Infallible>::new();
/// let ticks = MutArc::own(0);
/// let t = ticks.clone();
/// observable::wake_aware_timer(TimerSpec::periodic(Duration::from_secs(1), Duration::from_secs(5)), wake, scheduler.clone())
///   .subscribe(move |_| *t.rc_deref_mut() += 1);
///
/// scheduler.advance_to(Duration::from_secs(11));
/// assert_eq!(*ticks.rc_deref(), 3);
/// ```
pub fn wake_aware_timer<W, S>(spec: TimerSpec, wake: W, scheduler: S) -> WakeAwareTimer<W, S> {
  WakeAwareTimer { spec, wake, scheduler, sink: default_sink() }
}

#[derive(Clone)]
pub struct WakeAwareTimer<W, S> {
  spec: TimerSpec,
  wake: W,
  scheduler: S,
  sink: SharedSink,
}

impl<W, S> WakeAwareTimer<W, S> {
  /// Report misuse to `sink` instead of the default tracing sink.
  pub fn with_diagnostics(mut self, sink: SharedSink) -> Self {
    self.sink = sink;
    self
  }
}

// ==================== Rescheduling ====================

/// What one wake occurrence asks the timer to do.
#[derive(Debug, Clone, PartialEq)]
struct Plan {
  emit_now: bool,
  /// Offset of the next regular tick; periodic from there when the spec is.
  schedule: Option<Duration>,
  diagnostic: Option<Diagnostic>,
}

fn plan(
  spec: &TimerSpec, anchor: Duration, last_fire: Option<Duration>, now: Duration,
) -> Plan {
  let due_at = anchor.saturating_add(spec.due_time);
  if let Some(remaining) = due_at.checked_sub(now) {
    return Plan { emit_now: false, schedule: Some(remaining), diagnostic: None };
  }

  let overdue = now - due_at;
  let emit_now = match (last_fire, spec.period) {
    (None, _) => true,
    (Some(last), Some(period)) => now.saturating_sub(last) >= period,
    (Some(_), None) => false,
  };
  match spec.period {
    Some(period) => Plan { emit_now, schedule: Some(realign(overdue, period)), diagnostic: None },
    None if emit_now => Plan { emit_now, schedule: None, diagnostic: None },
    None => Plan {
      emit_now: false,
      schedule: None,
      diagnostic: Some(Diagnostic::UnexpectedTimerReschedule {
        due_time: spec.due_time,
        period: spec.period,
        anchor,
        now,
      }),
    },
  }
}

/// Offset from now to the next grid point, when now is `overdue` past the
/// first one. The remainder is exact, a misaligned wake still lands on the
/// grid.
fn realign(overdue: Duration, period: Duration) -> Duration {
  const NANOS_PER_SEC: u128 = 1_000_000_000;
  let rem = overdue.as_nanos() % period.as_nanos();
  // rem < period, so the seconds fit
  period - Duration::new((rem / NANOS_PER_SEC) as u64, (rem % NANOS_PER_SEC) as u32)
}

// ==================== Subscription State ====================

struct TimerState {
  anchor: Duration,
  last_fire: Option<Duration>,
  pending: SmallVec<[TaskHandle; 2]>,
  wake: Option<BoxedSubscription>,
  closed: bool,
}

struct TimerCore<S, O> {
  spec: TimerSpec,
  scheduler: S,
  sink: SharedSink,
  state: MutArc<TimerState>,
  observer: MutArc<Option<O>>,
}

impl<S, O> TimerCore<S, O>
where
  S: Scheduler,
  O: Observer<(), Infallible> + Send + 'static,
{
  fn on_wake(self: &Arc<Self>) {
    let now = self.scheduler.now();
    let (stale, diagnostic) = {
      let mut state = self.state.rc_deref_mut();
      if state.closed {
        return;
      }
      let plan = plan(&self.spec, state.anchor, state.last_fire, now);
      let stale = mem::take(&mut state.pending);

      if plan.emit_now {
        let core = self.clone();
        let handle = self.scheduler.schedule(move || core.fire(), None);
        state.pending.push(handle);
      }
      if let Some(offset) = plan.schedule {
        tracing::trace!(?offset, period = ?self.spec.period, emit_now = plan.emit_now, "scheduling wake-aware timer");
        let core = self.clone();
        let handle = match self.spec.period {
          Some(period) => self
            .scheduler
            .schedule_periodic(offset, period, move || core.fire()),
          None => self.scheduler.schedule(move || core.fire(), Some(offset)),
        };
        state.pending.push(handle);
      }
      (stale, plan.diagnostic)
    };

    stale.iter().for_each(TaskHandle::cancel);
    if let Some(diagnostic) = diagnostic {
      self.sink.report(&diagnostic);
    }
  }

  fn fire(&self) {
    let now = self.scheduler.now();
    let finished = {
      let mut state = self.state.rc_deref_mut();
      if state.closed {
        return;
      }
      if state.last_fire.is_none_or(|last| last <= now) {
        state.last_fire = Some(now);
      }
      if self.spec.period.is_some() {
        None
      } else {
        state.closed = true;
        Some((mem::take(&mut state.pending), state.wake.take()))
      }
    };

    match finished {
      None => {
        if let Some(observer) = self.observer.rc_deref_mut().as_mut() {
          observer.next(());
        }
      }
      Some((pending, wake)) => {
        pending.iter().for_each(TaskHandle::cancel);
        wake.unsubscribe();
        let observer = self.observer.rc_deref_mut().take();
        if let Some(mut observer) = observer {
          observer.next(());
          observer.complete();
        }
      }
    }
  }
}

impl<W, S> Observable<(), Infallible> for WakeAwareTimer<W, S>
where
  W: Observable<(), Infallible>,
  S: Scheduler,
{
  type Unsub = WakeTimerSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<(), Infallible> + Send + 'static,
  {
    let state = MutArc::own(TimerState {
      anchor: self.scheduler.now(),
      last_fire: None,
      pending: SmallVec::new(),
      wake: None,
      closed: false,
    });
    let core = Arc::new(TimerCore {
      spec: self.spec.normalized(),
      scheduler: self.scheduler,
      sink: self.sink,
      state: state.clone(),
      observer: MutArc::own(Some(observer)),
    });

    // the initial wake
    core.on_wake();

    let c = core.clone();
    let wake = self
      .wake
      .actual_subscribe(FnMutObserver(move |_: ()| c.on_wake()));
    let mut guard = state.rc_deref_mut();
    if guard.closed {
      drop(guard);
      wake.unsubscribe();
    } else {
      guard.wake = Some(BoxedSubscription::new(wake));
      drop(guard);
    }

    WakeTimerSubscription { state }
  }
}

/// Cancels the pending tick and the wake subscription.
pub struct WakeTimerSubscription {
  state: MutArc<TimerState>,
}

impl Subscription for WakeTimerSubscription {
  fn unsubscribe(self) {
    let (pending, wake) = {
      let mut state = self.state.rc_deref_mut();
      if state.closed {
        return;
      }
      state.closed = true;
      (mem::take(&mut state.pending), state.wake.take())
    };
    pending.iter().for_each(TaskHandle::cancel);
    wake.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.state.rc_deref().closed }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{observable, prelude::*};

  fn secs(s: u64) -> Duration { Duration::from_secs(s) }

  #[derive(Debug, Clone, Copy, PartialEq)]
  enum Event {
    Tick(Duration),
    Complete(Duration),
  }

  fn record<W>(
    timer: WakeAwareTimer<W, TestScheduler>, scheduler: &TestScheduler,
  ) -> (MutArc<Vec<Event>>, WakeTimerSubscription)
  where
    W: Observable<(), Infallible>,
  {
    let events = MutArc::own(Vec::new());
    let e = events.clone();
    let c = events.clone();
    let s1 = scheduler.clone();
    let s2 = scheduler.clone();
    let sub = timer.subscribe_all(
      move |_| e.rc_deref_mut().push(Event::Tick(s1.now())),
      |_| {},
      move || c.rc_deref_mut().push(Event::Complete(s2.now())),
    );
    (events, sub)
  }

  fn ticks(events: &MutArc<Vec<Event>>) -> Vec<Duration> {
    events
      .rc_deref()
      .iter()
      .filter_map(|e| match e {
        Event::Tick(at) => Some(*at),
        Event::Complete(_) => None,
      })
      .collect()
  }

  #[test]
  fn one_shot_without_wake_fires_once_and_completes() {
    let scheduler = TestScheduler::new();
    let wake = Subject::<(), Infallible>::new();
    let timer = observable::wake_aware_timer(TimerSpec::once(secs(2)), wake.clone(), scheduler.clone());
    let (events, sub) = record(timer, &scheduler);

    scheduler.advance_to(secs(10));
    assert_eq!(*events.rc_deref(), vec![Event::Tick(secs(2)), Event::Complete(secs(2))]);
    assert!(sub.is_closed());
    assert_eq!(wake.subscriber_count(), 0);
  }

  #[test]
  fn missed_initial_tick_fires_on_wake() {
    let scheduler = TestScheduler::new();
    let mut wake = Subject::<(), Infallible>::new();
    let timer = observable::wake_aware_timer(TimerSpec::once(secs(2)), wake.clone(), scheduler.clone());
    let (events, _sub) = record(timer, &scheduler);

    scheduler.suspend();
    scheduler.advance_to(secs(201));
    scheduler.resume();
    assert!(events.rc_deref().is_empty());

    wake.next(());
    scheduler.advance_by(Duration::ZERO);
    assert_eq!(*events.rc_deref(), vec![Event::Tick(secs(201)), Event::Complete(secs(201))]);

    wake.next(());
    scheduler.advance_to(secs(400));
    assert_eq!(events.rc_deref().len(), 2);
  }

  #[test]
  fn missed_periodic_tick_keeps_grid() {
    let scheduler = TestScheduler::new();
    let mut wake = Subject::<(), Infallible>::new();
    scheduler.advance_to(secs(200));
    let timer =
      observable::wake_aware_timer(TimerSpec::periodic(secs(2), secs(300)), wake.clone(), scheduler.clone());
    let (events, _sub) = record(timer, &scheduler);

    scheduler.advance_to(secs(300));
    scheduler.suspend();
    scheduler.advance_to(secs(600));
    scheduler.resume();
    wake.next(());
    scheduler.advance_to(secs(1000));

    assert_eq!(ticks(&events), vec![secs(202), secs(600), secs(802)]);
  }

  #[test]
  fn missed_first_periodic_tick_fires_on_wake() {
    let scheduler = TestScheduler::new();
    let mut wake = Subject::<(), Infallible>::new();
    scheduler.advance_to(secs(200));
    let timer =
      observable::wake_aware_timer(TimerSpec::periodic(secs(100), secs(300)), wake.clone(), scheduler.clone());
    let (events, _sub) = record(timer, &scheduler);

    scheduler.advance_to(secs(250));
    scheduler.suspend();
    scheduler.advance_to(secs(400));
    scheduler.resume();
    wake.next(());
    scheduler.advance_to(secs(1000));

    assert_eq!(ticks(&events), vec![secs(400), secs(600), secs(900)]);
  }

  #[test]
  fn wakes_without_suspension_keep_the_grid() {
    let scheduler = TestScheduler::new();
    let mut wake = Subject::<(), Infallible>::new();
    scheduler.advance_to(secs(200));
    let timer =
      observable::wake_aware_timer(TimerSpec::periodic(secs(50), secs(100)), wake.clone(), scheduler.clone());
    let (events, _sub) = record(timer, &scheduler);

    for at in [225, 275, 325] {
      scheduler.advance_to(secs(at));
      wake.next(());
    }
    scheduler.advance_to(secs(460));

    assert_eq!(ticks(&events), vec![secs(250), secs(350), secs(450)]);
  }

  #[test]
  fn unsubscribe_cancels_pending_ticks() {
    let scheduler = TestScheduler::new();
    let mut wake = Subject::<(), Infallible>::new();
    let timer =
      observable::wake_aware_timer(TimerSpec::periodic(secs(1), secs(1)), wake.clone(), scheduler.clone());
    let (events, sub) = record(timer, &scheduler);

    scheduler.advance_to(secs(2));
    sub.unsubscribe();
    wake.next(());
    scheduler.advance_to(secs(10));

    assert_eq!(ticks(&events), vec![secs(1), secs(2)]);
    assert_eq!(wake.subscriber_count(), 0);
    assert_eq!(scheduler.active_count(), 0);
  }

  #[test]
  fn every_subscription_takes_a_fresh_anchor() {
    let scheduler = TestScheduler::new();
    let wake = Subject::<(), Infallible>::new();
    let timer = observable::wake_aware_timer(TimerSpec::once(secs(2)), wake, scheduler.clone());

    let (first, _) = record(timer.clone(), &scheduler);
    scheduler.advance_to(secs(10));
    let (second, _) = record(timer, &scheduler);
    scheduler.advance_by(Duration::ZERO);
    assert!(second.rc_deref().is_empty());

    scheduler.advance_to(secs(20));
    assert_eq!(ticks(&first), vec![secs(2)]);
    assert_eq!(*second.rc_deref(), vec![Event::Tick(secs(12)), Event::Complete(secs(12))]);
  }

  #[test]
  fn zero_period_behaves_as_one_shot() {
    let scheduler = TestScheduler::new();
    let timer = observable::wake_aware_timer(
      TimerSpec::periodic(secs(3), Duration::ZERO),
      observable::never(),
      scheduler.clone(),
    );
    let (events, _) = record(timer, &scheduler);
    scheduler.advance_to(secs(10));
    assert_eq!(*events.rc_deref(), vec![Event::Tick(secs(3)), Event::Complete(secs(3))]);
  }

  #[test]
  fn rescheduling_a_fired_one_shot_is_reported() {
    let spec = TimerSpec::once(secs(2));
    let plan = plan(&spec, Duration::ZERO, Some(secs(2)), secs(5));
    assert!(!plan.emit_now);
    assert_eq!(plan.schedule, None);
    assert_eq!(
      plan.diagnostic,
      Some(Diagnostic::UnexpectedTimerReschedule {
        due_time: secs(2),
        period: None,
        anchor: Duration::ZERO,
        now: secs(5),
      })
    );
  }

  #[test]
  fn plan_before_due_time_only_waits() {
    let spec = TimerSpec::periodic(secs(10), secs(3));
    let plan = plan(&spec, secs(5), None, secs(7));
    assert_eq!(plan, Plan { emit_now: false, schedule: Some(secs(8)), diagnostic: None });
  }

  #[test]
  fn realign_is_exact_for_fractional_offsets() {
    assert_eq!(realign(Duration::from_millis(1250), Duration::from_millis(500)), Duration::from_millis(250));
    assert_eq!(realign(Duration::ZERO, secs(3)), secs(3));
    assert_eq!(realign(secs(398), secs(300)), secs(202));
  }
}
