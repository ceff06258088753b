//! The producer side of the push contract.
//!
//! An [`Observable`] is a cold description of a stream: nothing happens until
//! it is subscribed, and every subscription gets its own state. Sources that
//! are re-subscribed (by [`resubscribe_on_wake`](ObservableExt::resubscribe_on_wake)
//! for instance) are therefore required to be `Clone`.

use std::{convert::Infallible, marker::PhantomData};

use crate::{
  config::ResubscribeConfig,
  observer::{AllObserver, FnMutObserver, Observer},
  ops::{
    ignore_elements::IgnoreElementsOp, resubscribe::Resubscribe, single_flight::SingleFlight,
  },
  scheduler::Scheduler,
  subscription::Subscription,
};

mod boxed;
mod create;
mod of;
mod timer;
mod trivial;
mod wake_timer;

pub use boxed::*;
pub use create::*;
pub use of::*;
pub use timer::*;
pub use trivial::*;
pub use wake_timer::*;

/// A source of `Item`s that may fail with `Err`.
pub trait Observable<Item, Err>: Sized {
  /// Handle returned by `actual_subscribe`.
  type Unsub: Subscription + Send + 'static;

  /// Start the stream, pushing its notifications into `observer`.
  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static;
}

pub trait ObservableExt<Item, Err>: Observable<Item, Err> {
  /// Invokes a closure for every value. Only streams that cannot fail can be
  /// subscribed this way.
  fn subscribe<F>(self, next: F) -> Self::Unsub
  where
    F: FnMut(Item) + Send + 'static,
    FnMutObserver<F>: Observer<Item, Err>,
  {
    self.actual_subscribe(FnMutObserver(next))
  }

  /// Invokes one closure per kind of notification.
  fn subscribe_all<N, E, C>(self, next: N, error: E, complete: C) -> Self::Unsub
  where
    N: FnMut(Item) + Send + 'static,
    E: FnOnce(Err) + Send + 'static,
    C: FnOnce() + Send + 'static,
  {
    self.actual_subscribe(AllObserver { next, error, complete })
  }

  #[inline]
  fn subscribe_with<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    self.actual_subscribe(observer)
  }

  /// Type-erase this observable.
  fn box_it(self) -> BoxedObservable<Item, Err>
  where
    Self: Send + 'static,
    Item: 'static,
    Err: 'static,
  {
    BoxedObservable::new(self)
  }

  /// Drop every value and only forward the terminal notification.
  fn ignore_elements(self) -> IgnoreElementsOp<Self, Item> {
    IgnoreElementsOp { source: self, _marker: PhantomData }
  }

  /// Keep this source subscribed, rebuilding the subscription whenever
  /// `wake` signals that the host may have been suspended.
  ///
  /// See [`Resubscribe`] for the exact semantics.
  fn resubscribe_on_wake<W, S>(
    self, wake: W, scheduler: S, config: ResubscribeConfig,
  ) -> Resubscribe<Self, W, S>
  where
    Self: Clone,
    W: Observable<(), Infallible>,
    S: Scheduler,
  {
    Resubscribe::new(self, wake, scheduler, config)
  }

  /// Run `selector` for the triggers of this stream, one at a time on
  /// `scheduler`, coalescing the triggers that arrive meanwhile.
  ///
  /// See [`SingleFlight`] for the exact semantics.
  fn single_flight<F, Work, Out, S>(
    self, selector: F, scheduler: S,
  ) -> SingleFlight<Self, F, S, Item, Work>
  where
    F: FnMut(Item) -> Work + Send + 'static,
    Work: Observable<Out, Err>,
    S: Scheduler,
  {
    SingleFlight::new(self, selector, scheduler)
  }

  /// Same discipline as [`single_flight`](Self::single_flight), for work run
  /// only for its side effects. The returned stream emits no values and ends
  /// when this stream ends.
  fn single_flight_completion<F, Work, Out, S>(
    self, selector: F, scheduler: S,
  ) -> IgnoreElementsOp<SingleFlight<Self, F, S, Item, Work>, Out>
  where
    F: FnMut(Item) -> Work + Send + 'static,
    Work: Observable<Out, Err>,
    S: Scheduler,
  {
    IgnoreElementsOp { source: SingleFlight::new(self, selector, scheduler), _marker: PhantomData }
  }
}

impl<T, Item, Err> ObservableExt<Item, Err> for T where T: Observable<Item, Err> {}
