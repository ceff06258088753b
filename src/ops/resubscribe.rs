//! Resubscription on wake signals.
//!
//! Some sources silently stall when the host is suspended: a socket is closed
//! under the hood, a platform callback is never delivered. [`Resubscribe`]
//! keeps such a source alive by throwing the subscription away and creating a
//! new one every time a wake signal passes its throttle.
//!
//! Known imperfections, inherent to resubscription:
//!
//! - a source that replays its current value on subscription delivers it
//!   again after each resubscription;
//! - values the source emits while the old subscription is torn down and
//!   the new one is being built are lost.
//!
//! Consumers that need exactly-once delivery have to deduplicate.

use std::{convert::Infallible, marker::PhantomData, sync::Arc};

use crate::{
  config::ResubscribeConfig,
  observable::Observable,
  observer::{FnMutObserver, Observer},
  rc::{MutArc, RcDeref, RcDerefMut},
  scheduler::{Duration, Scheduler},
  subscription::{BoxedSubscription, Subscription},
};

/// Keeps `source` subscribed, re-subscribing whenever `wake` fires.
///
/// The control stream is one synthetic signal at subscription followed by
/// every wake occurrence, hopped onto `scheduler`. It is throttled on the
/// leading edge: a signal passes only if at least
/// [`min_interval`](ResubscribeConfig::min_interval) elapsed since the last
/// one that passed; the others are dropped. Each signal that passes cancels
/// the current inner subscription and opens a new one, so at most one is
/// active at a time. Values of a cancelled subscription are ignored.
///
/// When the source completes or fails, the terminal notification is
/// forwarded and no further resubscription happens.
#[derive(Clone)]
pub struct Resubscribe<Src, W, S> {
  source: Src,
  wake: W,
  scheduler: S,
  config: ResubscribeConfig,
}

impl<Src, W, S> Resubscribe<Src, W, S> {
  pub(crate) fn new(source: Src, wake: W, scheduler: S, config: ResubscribeConfig) -> Self {
    Self { source, wake, scheduler, config }
  }
}

struct ResubscribeState {
  generation: u64,
  last_pass: Option<Duration>,
  inner: Option<BoxedSubscription>,
  control: Option<BoxedSubscription>,
  closed: bool,
}

struct ResubscribeCore<Src, S, O, Item, Err> {
  source: MutArc<Src>,
  scheduler: S,
  config: ResubscribeConfig,
  state: MutArc<ResubscribeState>,
  observer: MutArc<Option<O>>,
  _marker: PhantomData<fn(Item, Err)>,
}

impl<Src, S, O, Item, Err> ResubscribeCore<Src, S, O, Item, Err> {
  fn is_current(&self, generation: u64) -> bool {
    let state = self.state.rc_deref();
    !state.closed && state.generation == generation
  }

  fn label(&self) -> &str { self.config.label.as_deref().unwrap_or("unnamed") }
}

impl<Src, S, O, Item, Err> ResubscribeCore<Src, S, O, Item, Err>
where
  Src: Observable<Item, Err> + Clone + Send + 'static,
  S: Scheduler,
  O: Observer<Item, Err> + Send + 'static,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn on_control(self: &Arc<Self>) {
    let now = self.scheduler.now();
    let (generation, stale) = {
      let mut state = self.state.rc_deref_mut();
      if state.closed {
        return;
      }
      let min_interval = self.config.min_interval;
      let throttled = state
        .last_pass
        .is_some_and(|last| !min_interval.is_zero() && now.saturating_sub(last) < min_interval);
      if throttled {
        return;
      }
      state.last_pass = Some(now);
      state.generation += 1;
      (state.generation, state.inner.take())
    };

    stale.unsubscribe();
    if generation == 1 {
      tracing::debug!(label = self.label(), "performing initial subscription");
    } else {
      tracing::debug!(label = self.label(), generation, "performing resubscribe");
    }

    let source = self.source.rc_deref().clone();
    let inner = source.actual_subscribe(InnerObserver { core: self.clone(), generation });

    let mut state = self.state.rc_deref_mut();
    if state.closed || state.generation != generation {
      drop(state);
      inner.unsubscribe();
    } else {
      state.inner = Some(BoxedSubscription::new(inner));
    }
  }

  /// Ends the whole stream if `generation` is still the active one. Returns
  /// the observer to notify.
  fn finish(&self, generation: u64) -> Option<O> {
    let (inner, control) = {
      let mut state = self.state.rc_deref_mut();
      if state.closed || state.generation != generation {
        return None;
      }
      state.closed = true;
      (state.inner.take(), state.control.take())
    };
    control.unsubscribe();
    inner.unsubscribe();
    self.observer.rc_deref_mut().take()
  }
}

struct InnerObserver<Src, S, O, Item, Err> {
  core: Arc<ResubscribeCore<Src, S, O, Item, Err>>,
  generation: u64,
}

impl<Src, S, O, Item, Err> Observer<Item, Err> for InnerObserver<Src, S, O, Item, Err>
where
  Src: Observable<Item, Err> + Clone + Send + 'static,
  S: Scheduler,
  O: Observer<Item, Err> + Send + 'static,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn next(&mut self, value: Item) {
    if !self.core.is_current(self.generation) {
      return;
    }
    if let Some(observer) = self.core.observer.rc_deref_mut().as_mut() {
      observer.next(value);
    }
  }

  fn error(self, err: Err) {
    if let Some(observer) = self.core.finish(self.generation) {
      observer.error(err);
    }
  }

  fn complete(self) {
    if let Some(observer) = self.core.finish(self.generation) {
      observer.complete();
    }
  }

  fn is_closed(&self) -> bool { !self.core.is_current(self.generation) }
}

impl<Src, W, S, Item, Err> Observable<Item, Err> for Resubscribe<Src, W, S>
where
  Src: Observable<Item, Err> + Clone + Send + 'static,
  W: Observable<(), Infallible>,
  S: Scheduler,
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Unsub = ResubscribeSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let state = MutArc::own(ResubscribeState {
      generation: 0,
      last_pass: None,
      inner: None,
      control: None,
      closed: false,
    });
    let core = Arc::new(ResubscribeCore {
      source: MutArc::own(self.source),
      scheduler: self.scheduler.clone(),
      config: self.config,
      state: state.clone(),
      observer: MutArc::own(Some(observer)),
      _marker: PhantomData,
    });

    // the synthetic initial signal
    core.on_control();

    let c = core.clone();
    let scheduler = self.scheduler;
    let control = self.wake.actual_subscribe(FnMutObserver(move |_: ()| {
      let core = c.clone();
      scheduler.schedule(move || core.on_control(), None);
    }));

    let mut guard = state.rc_deref_mut();
    if guard.closed {
      drop(guard);
      control.unsubscribe();
    } else {
      guard.control = Some(BoxedSubscription::new(control));
      drop(guard);
    }

    ResubscribeSubscription { state }
  }
}

/// Cancels the active inner subscription and stops listening to wake
/// signals.
pub struct ResubscribeSubscription {
  state: MutArc<ResubscribeState>,
}

impl Subscription for ResubscribeSubscription {
  fn unsubscribe(self) {
    let (inner, control) = {
      let mut state = self.state.rc_deref_mut();
      if state.closed {
        return;
      }
      state.closed = true;
      (state.inner.take(), state.control.take())
    };
    control.unsubscribe();
    inner.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.state.rc_deref().closed }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use crate::{observable, prelude::*};

  fn secs(s: u64) -> Duration { Duration::from_secs(s) }

  /// A source that counts its subscriptions and exposes the latest emitter.
  #[derive(Clone)]
  struct Probe {
    subscriptions: Arc<AtomicUsize>,
    active: MutArc<Vec<(usize, bool)>>,
    emitter: MutArc<Option<Emitter<i32, &'static str>>>,
  }

  impl Probe {
    fn new() -> Self {
      Self {
        subscriptions: Arc::new(AtomicUsize::new(0)),
        active: MutArc::own(Vec::new()),
        emitter: MutArc::own(None),
      }
    }

    fn source(&self) -> BoxedObservableClone<i32, &'static str> {
      let probe = self.clone();
      BoxedObservableClone::new(observable::create(move |emitter: Emitter<i32, &'static str>| {
        let id = probe.subscriptions.fetch_add(1, Ordering::SeqCst);
        probe.active.rc_deref_mut().push((id, true));
        *probe.emitter.rc_deref_mut() = Some(emitter);
        ProbeSubscription { active: probe.active.clone(), id }
      }))
    }

    fn count(&self) -> usize { self.subscriptions.load(Ordering::SeqCst) }

    fn open(&self) -> usize { self.active.rc_deref().iter().filter(|(_, open)| *open).count() }

    fn with_emitter(&self, f: impl FnOnce(&mut Emitter<i32, &'static str>)) {
      let mut emitter = self.emitter.rc_deref_mut();
      if let Some(emitter) = emitter.as_mut() {
        f(emitter);
      }
    }
  }

  struct ProbeSubscription {
    active: MutArc<Vec<(usize, bool)>>,
    id: usize,
  }

  impl Subscription for ProbeSubscription {
    fn unsubscribe(self) {
      for entry in self.active.rc_deref_mut().iter_mut() {
        if entry.0 == self.id {
          entry.1 = false;
        }
      }
    }

    fn is_closed(&self) -> bool { false }
  }

  struct Recorded {
    values: MutArc<Vec<i32>>,
    terminal: MutArc<Option<Result<(), &'static str>>>,
  }

  fn record<Src>(source: Src) -> (Recorded, Src::Unsub)
  where
    Src: Observable<i32, &'static str>,
  {
    let values = MutArc::own(Vec::new());
    let terminal = MutArc::own(None);
    let v = values.clone();
    let e = terminal.clone();
    let c = terminal.clone();
    let sub = source.subscribe_all(
      move |x| v.rc_deref_mut().push(x),
      move |err| *e.rc_deref_mut() = Some(Err(err)),
      move || *c.rc_deref_mut() = Some(Ok(())),
    );
    (Recorded { values, terminal }, sub)
  }

  #[test]
  fn subscribes_once_initially() {
    let scheduler = TestScheduler::new();
    let wake = Subject::<(), Infallible>::new();
    let probe = Probe::new();
    let (recorded, _sub) = record(probe.source().resubscribe_on_wake(
      wake,
      scheduler.clone(),
      ResubscribeConfig::default(),
    ));

    assert_eq!(probe.count(), 1);
    probe.with_emitter(|e| e.next(1));
    assert_eq!(*recorded.values.rc_deref(), vec![1]);
  }

  #[test]
  fn wake_switches_to_a_fresh_subscription() {
    let scheduler = TestScheduler::new();
    let mut wake = Subject::<(), Infallible>::new();
    let probe = Probe::new();
    let (recorded, _sub) = record(probe.source().resubscribe_on_wake(
      wake.clone(),
      scheduler.clone(),
      ResubscribeConfig::default(),
    ));

    let stale = probe.emitter.rc_deref_mut().take();
    scheduler.advance_to(secs(61));
    wake.next(());
    assert_eq!(probe.count(), 1, "wake is hopped onto the scheduler");
    scheduler.advance_by(Duration::ZERO);
    assert_eq!(probe.count(), 2);
    assert_eq!(probe.open(), 1);

    if let Some(mut stale) = stale {
      stale.next(99);
    }
    probe.with_emitter(|e| e.next(2));
    assert_eq!(*recorded.values.rc_deref(), vec![2]);
  }

  #[test]
  fn wakes_inside_min_interval_are_dropped() {
    let scheduler = TestScheduler::new();
    let mut wake = Subject::<(), Infallible>::new();
    let probe = Probe::new();
    let _rec = record(probe.source().resubscribe_on_wake(
      wake.clone(),
      scheduler.clone(),
      ResubscribeConfig::default().with_min_interval(secs(60)),
    ));

    for at in [10, 30, 59] {
      scheduler.advance_to(secs(at));
      wake.next(());
      scheduler.advance_by(Duration::ZERO);
    }
    assert_eq!(probe.count(), 1);

    scheduler.advance_to(secs(60));
    wake.next(());
    scheduler.advance_by(Duration::ZERO);
    assert_eq!(probe.count(), 2);

    scheduler.advance_to(secs(100));
    wake.next(());
    scheduler.advance_by(Duration::ZERO);
    assert_eq!(probe.count(), 2);
  }

  #[test]
  fn zero_min_interval_disables_the_throttle() {
    let scheduler = TestScheduler::new();
    let mut wake = Subject::<(), Infallible>::new();
    let probe = Probe::new();
    let _rec = record(probe.source().resubscribe_on_wake(
      wake.clone(),
      scheduler.clone(),
      ResubscribeConfig::default().with_min_interval(Duration::ZERO),
    ));

    wake.next(());
    wake.next(());
    scheduler.advance_by(Duration::ZERO);
    assert_eq!(probe.count(), 3);
    assert_eq!(probe.open(), 1);
  }

  #[test]
  fn source_completion_ends_everything() {
    let scheduler = TestScheduler::new();
    let mut wake = Subject::<(), Infallible>::new();
    let probe = Probe::new();
    let (recorded, sub) = record(probe.source().resubscribe_on_wake(
      wake.clone(),
      scheduler.clone(),
      ResubscribeConfig::default().with_min_interval(Duration::ZERO),
    ));

    probe.with_emitter(|e| e.complete());
    assert_eq!(*recorded.terminal.rc_deref(), Some(Ok(())));
    assert!(sub.is_closed());
    assert_eq!(wake.subscriber_count(), 0);

    wake.next(());
    scheduler.advance_by(Duration::ZERO);
    assert_eq!(probe.count(), 1);
  }

  #[test]
  fn source_error_is_forwarded_once() {
    let scheduler = TestScheduler::new();
    let wake = Subject::<(), Infallible>::new();
    let (recorded, _sub) = record(
      observable::throw::<i32, _>("down").resubscribe_on_wake(
        wake.clone(),
        scheduler.clone(),
        ResubscribeConfig::default(),
      ),
    );
    assert_eq!(*recorded.terminal.rc_deref(), Some(Err("down")));
    assert!(recorded.values.rc_deref().is_empty());
    assert_eq!(wake.subscriber_count(), 0);
  }

  #[test]
  fn unsubscribe_releases_inner_and_wake() {
    let scheduler = TestScheduler::new();
    let mut wake = Subject::<(), Infallible>::new();
    let probe = Probe::new();
    let (_recorded, sub) = record(probe.source().resubscribe_on_wake(
      wake.clone(),
      scheduler.clone(),
      ResubscribeConfig::default().with_min_interval(Duration::ZERO),
    ));

    sub.unsubscribe();
    assert_eq!(probe.open(), 0);
    assert_eq!(wake.subscriber_count(), 0);
    wake.next(());
    scheduler.advance_by(Duration::ZERO);
    assert_eq!(probe.count(), 1);
  }

  #[test]
  fn every_subscription_starts_fresh() {
    let scheduler = TestScheduler::new();
    let wake = Subject::<(), Infallible>::new();
    let source = observable::of::<_, &'static str>(5).resubscribe_on_wake(
      wake,
      scheduler.clone(),
      ResubscribeConfig::default(),
    );
    let (first, _) = record(source.clone());
    let (second, _) = record(source);
    assert_eq!(*first.values.rc_deref(), vec![5]);
    assert_eq!(*second.values.rc_deref(), vec![5]);
    assert_eq!(*second.terminal.rc_deref(), Some(Ok(())));
  }
}
