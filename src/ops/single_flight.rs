//! Single-flight execution of work triggered by a stream.
//!
//! Each trigger asks for one unit of work. At most one unit runs at a time;
//! triggers arriving meanwhile are coalesced into a single pending slot where
//! the latest one wins. When the running unit completes, the pending trigger
//! (if any) is dispatched as a new scheduler task, so long bursts never nest
//! on the stack.

use std::{marker::PhantomData, mem, sync::Arc};

use crate::{
  diagnostic::{default_sink, Diagnostic, SharedSink},
  observable::Observable,
  observer::Observer,
  rc::{MutArc, RcDeref, RcDerefMut},
  scheduler::{Scheduler, TaskHandle},
  subscription::{Subscription, TupleSubscription},
};

/// Runs `selector` for the triggers of `source` on `scheduler`, one unit of
/// work at a time.
///
/// - A trigger that finds the operator idle is dispatched right away.
/// - A trigger that finds a unit running replaces the pending trigger.
/// - Every value produced by a unit is forwarded; when the unit completes the
///   pending trigger, if any, is dispatched next.
///
/// The output completes once the source completed and nothing is running or
/// pending. An error of the source or of a unit ends the output.
///
/// Triggers must not be produced on the scheduler that runs the work: the
/// dispatched unit would only start after the producer returns. Such a
/// trigger is reported as [`Diagnostic::SameExecutionContext`].
///
/// Unsubscribing stops every future dispatch; a unit already running is left
/// to finish and its values are dropped.
pub struct SingleFlight<Src, F, S, Item, Work> {
  source: Src,
  selector: F,
  scheduler: S,
  sink: SharedSink,
  _marker: PhantomData<fn(Item) -> Work>,
}

impl<Src, F, S, Item, Work> SingleFlight<Src, F, S, Item, Work> {
  pub(crate) fn new(source: Src, selector: F, scheduler: S) -> Self {
    Self { source, selector, scheduler, sink: default_sink(), _marker: PhantomData }
  }

  /// Report misuse to `sink` instead of the default tracing sink.
  pub fn with_diagnostics(mut self, sink: SharedSink) -> Self {
    self.sink = sink;
    self
  }
}

impl<Src: Clone, F: Clone, S: Clone, Item, Work> Clone for SingleFlight<Src, F, S, Item, Work> {
  fn clone(&self) -> Self {
    Self {
      source: self.source.clone(),
      selector: self.selector.clone(),
      scheduler: self.scheduler.clone(),
      sink: self.sink.clone(),
      _marker: PhantomData,
    }
  }
}

// ==================== Execution Slot ====================

struct SlotState<Item> {
  in_flight: bool,
  pending: Option<Item>,
  source_done: bool,
  closed: bool,
  dispatch: Option<TaskHandle>,
}

struct FlightCore<F, S, Item, Out, Err, O> {
  selector: MutArc<F>,
  scheduler: S,
  sink: SharedSink,
  slot: MutArc<SlotState<Item>>,
  observer: MutArc<Option<O>>,
  _marker: PhantomData<fn(Out, Err)>,
}

impl<F, S, Item, Out, Err, O> FlightCore<F, S, Item, Out, Err, O> {
  fn is_closed(&self) -> bool { self.slot.rc_deref().closed }

  /// Closes the slot and hands out the observer, unless already closed.
  fn close(&self) -> Option<O> {
    let dispatch = {
      let mut slot = self.slot.rc_deref_mut();
      if slot.closed {
        return None;
      }
      slot.closed = true;
      slot.pending = None;
      slot.dispatch.take()
    };
    dispatch.unsubscribe();
    self.observer.rc_deref_mut().take()
  }
}

impl<F, S, Item, Work, Out, Err, O> FlightCore<F, S, Item, Out, Err, O>
where
  F: FnMut(Item) -> Work + Send + 'static,
  Work: Observable<Out, Err>,
  S: Scheduler,
  Item: Send + 'static,
  Out: 'static,
  Err: 'static,
  O: Observer<Out, Err> + Send + 'static,
{
  fn dispatch(self: &Arc<Self>, item: Item) {
    let core = self.clone();
    let handle = self.scheduler.schedule(move || core.execute(item), None);
    let mut slot = self.slot.rc_deref_mut();
    if slot.closed {
      drop(slot);
      handle.unsubscribe();
    } else {
      slot.dispatch = Some(handle);
    }
  }

  fn execute(self: &Arc<Self>, item: Item) {
    if self.is_closed() {
      return;
    }
    let work = {
      let mut selector = self.selector.rc_deref_mut();
      (*selector)(item)
    };
    // the unit is never cancelled, so its subscription is not kept
    let _ = work.actual_subscribe(WorkObserver { core: self.clone() });
  }

  /// The running unit completed: dispatch the pending trigger or go idle.
  fn release(self: &Arc<Self>) {
    let next = {
      let mut slot = self.slot.rc_deref_mut();
      if slot.closed {
        return;
      }
      match slot.pending.take() {
        Some(item) => Some(item),
        None => {
          slot.in_flight = false;
          slot.dispatch = None;
          None
        }
      }
    };
    match next {
      Some(item) => self.dispatch(item),
      None => {
        let finished = {
          let slot = self.slot.rc_deref();
          slot.source_done && !slot.in_flight
        };
        if finished {
          if let Some(observer) = self.close() {
            observer.complete();
          }
        }
      }
    }
  }
}

// ==================== Observers ====================

struct TriggerObserver<F, S, Item, Out, Err, O> {
  core: Arc<FlightCore<F, S, Item, Out, Err, O>>,
}

impl<F, S, Item, Work, Out, Err, O> Observer<Item, Err> for TriggerObserver<F, S, Item, Out, Err, O>
where
  F: FnMut(Item) -> Work + Send + 'static,
  Work: Observable<Out, Err>,
  S: Scheduler,
  Item: Send + 'static,
  Out: 'static,
  Err: 'static,
  O: Observer<Out, Err> + Send + 'static,
{
  fn next(&mut self, item: Item) {
    let core = &self.core;
    if core.scheduler.is_current() {
      core
        .sink
        .report(&Diagnostic::SameExecutionContext { tag: core.scheduler.tag() });
    }

    let idle_item = {
      let mut slot = core.slot.rc_deref_mut();
      if slot.closed {
        return;
      }
      if slot.in_flight {
        slot.pending = Some(item);
        None
      } else {
        slot.in_flight = true;
        Some(item)
      }
    };
    if let Some(item) = idle_item {
      core.dispatch(item);
    }
  }

  fn error(self, err: Err) {
    if let Some(observer) = self.core.close() {
      observer.error(err);
    }
  }

  fn complete(self) {
    let finished = {
      let mut slot = self.core.slot.rc_deref_mut();
      slot.source_done = true;
      !slot.in_flight
    };
    if finished {
      if let Some(observer) = self.core.close() {
        observer.complete();
      }
    }
  }

  fn is_closed(&self) -> bool { self.core.is_closed() }
}

struct WorkObserver<F, S, Item, Out, Err, O> {
  core: Arc<FlightCore<F, S, Item, Out, Err, O>>,
}

impl<F, S, Item, Work, Out, Err, O> Observer<Out, Err> for WorkObserver<F, S, Item, Out, Err, O>
where
  F: FnMut(Item) -> Work + Send + 'static,
  Work: Observable<Out, Err>,
  S: Scheduler,
  Item: Send + 'static,
  Out: 'static,
  Err: 'static,
  O: Observer<Out, Err> + Send + 'static,
{
  fn next(&mut self, value: Out) {
    if self.core.is_closed() {
      return;
    }
    if let Some(observer) = self.core.observer.rc_deref_mut().as_mut() {
      observer.next(value);
    }
  }

  fn error(self, err: Err) {
    if let Some(observer) = self.core.close() {
      observer.error(err);
    }
  }

  fn complete(self) { self.core.release(); }

  fn is_closed(&self) -> bool { self.core.is_closed() }
}

// ==================== Observable ====================

impl<Src, F, S, Item, Work, Out, Err> Observable<Out, Err> for SingleFlight<Src, F, S, Item, Work>
where
  Src: Observable<Item, Err>,
  F: FnMut(Item) -> Work + Send + 'static,
  Work: Observable<Out, Err>,
  S: Scheduler,
  Item: Send + 'static,
  Out: 'static,
  Err: 'static,
{
  type Unsub = TupleSubscription<Src::Unsub, FlightSubscription<Item>>;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Out, Err> + Send + 'static,
  {
    let slot = MutArc::own(SlotState {
      in_flight: false,
      pending: None,
      source_done: false,
      closed: false,
      dispatch: None,
    });
    let core = Arc::new(FlightCore {
      selector: MutArc::own(self.selector),
      scheduler: self.scheduler,
      sink: self.sink,
      slot: slot.clone(),
      observer: MutArc::own(Some(observer)),
      _marker: PhantomData,
    });
    let source = self.source.actual_subscribe(TriggerObserver { core });
    TupleSubscription::new(source, FlightSubscription { slot })
  }
}

/// Stops future dispatches of a single-flight operator.
pub struct FlightSubscription<Item> {
  slot: MutArc<SlotState<Item>>,
}

impl<Item> Subscription for FlightSubscription<Item> {
  fn unsubscribe(self) {
    let (dispatch, pending) = {
      let mut slot = self.slot.rc_deref_mut();
      slot.closed = true;
      (slot.dispatch.take(), mem::take(&mut slot.pending))
    };
    dispatch.unsubscribe();
    drop(pending);
  }

  fn is_closed(&self) -> bool { self.slot.rc_deref().closed }
}
