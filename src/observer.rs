//! The consumer side of the push contract.
//!
//! Notifications arrive in the order `next* (error | complete)?`. Terminal
//! methods take the observer by value, so nothing can be delivered after them
//! without the type system noticing.

use std::convert::Infallible;

use crate::rc::{MutArc, RcDeref, RcDerefMut};

// ============================================================================
// Observer Trait
// ============================================================================

/// Receives the notifications of one subscription.
pub trait Observer<Item, Err> {
  fn next(&mut self, value: Item);

  /// The stream failed. No notification follows.
  fn error(self, err: Err);

  /// The stream ended. No notification follows.
  fn complete(self);

  /// Whether further notifications would be dropped anyway. Producers may
  /// use it to stop early.
  fn is_closed(&self) -> bool;
}

// ============================================================================
// DynObserver Trait - Object-safe Observer
// ============================================================================

/// Object-safe mirror of [`Observer`], whose terminal methods take `self`
/// by value and so cannot go through a vtable.
pub trait DynObserver<Item, Err> {
  fn box_next(&mut self, value: Item);
  fn box_error(self: Box<Self>, err: Err);
  fn box_complete(self: Box<Self>);
  fn box_is_closed(&self) -> bool;
}

impl<T, Item, Err> DynObserver<Item, Err> for T
where
  T: Observer<Item, Err>,
{
  fn box_next(&mut self, value: Item) { self.next(value); }
  fn box_error(self: Box<Self>, err: Err) { self.error(err); }
  fn box_complete(self: Box<Self>) { self.complete(); }
  fn box_is_closed(&self) -> bool { self.is_closed() }
}

/// Boxed observer. Every observer in this crate may be driven from a
/// scheduler thread, hence the `Send` bound.
pub type BoxedObserver<Item, Err> = Box<dyn DynObserver<Item, Err> + Send>;

impl<Item, Err> Observer<Item, Err> for BoxedObserver<Item, Err> {
  #[inline]
  fn next(&mut self, value: Item) { (**self).box_next(value) }

  #[inline]
  fn error(self, err: Err) { self.box_error(err) }

  #[inline]
  fn complete(self) { self.box_complete() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).box_is_closed() }
}

/// Converts a concrete observer into a [`BoxedObserver`].
pub fn box_observer<Item, Err, O>(observer: O) -> BoxedObserver<Item, Err>
where
  O: Observer<Item, Err> + Send + 'static,
{
  Box::new(observer)
}

// ============================================================================
// Closure adapters
// ============================================================================

/// Adapter that turns a closure into the `next` handler of an observer.
///
/// `error` and `complete` are ignored, so it is only an `Observer` for streams
/// that cannot fail.
#[derive(Clone)]
pub struct FnMutObserver<F>(pub F);

impl<F, Item> Observer<Item, Infallible> for FnMutObserver<F>
where
  F: FnMut(Item),
{
  #[inline]
  fn next(&mut self, v: Item) { (self.0)(v); }

  #[inline]
  fn error(self, _err: Infallible) {}

  #[inline]
  fn complete(self) {}

  #[inline]
  fn is_closed(&self) -> bool { false }
}

/// Observer assembled from three closures, one per notification.
pub struct AllObserver<N, E, C> {
  pub next: N,
  pub error: E,
  pub complete: C,
}

impl<Item, Err, N, E, C> Observer<Item, Err> for AllObserver<N, E, C>
where
  N: FnMut(Item),
  E: FnOnce(Err),
  C: FnOnce(),
{
  #[inline]
  fn next(&mut self, value: Item) { (self.next)(value); }

  #[inline]
  fn error(self, err: Err) { (self.error)(err); }

  #[inline]
  fn complete(self) { (self.complete)(); }

  #[inline]
  fn is_closed(&self) -> bool { false }
}

// ============================================================================
// Observer implementations for Option and shared Option wrappers
// ============================================================================

/// An empty slot drops every notification.
impl<O, Item, Err> Observer<Item, Err> for Option<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    if let Some(inner) = self {
      inner.next(value);
    }
  }

  fn error(self, err: Err) {
    if let Some(inner) = self {
      inner.error(err);
    }
  }

  fn complete(self) {
    if let Some(inner) = self {
      inner.complete();
    }
  }

  fn is_closed(&self) -> bool { self.as_ref().is_none_or(Observer::is_closed) }
}

/// A slot shared between a producer and its subscription handle.
///
/// Terminal notifications `take()` the inner observer, so every clone sees
/// the stream as closed afterwards. The lock is held while the inner
/// observer runs; downstream code must not re-enter the same slot.
impl<O, Item, Err> Observer<Item, Err> for MutArc<Option<O>>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) { self.rc_deref_mut().next(value); }

  fn error(self, err: Err) {
    let inner = self.rc_deref_mut().take();
    if let Some(inner) = inner {
      inner.error(err);
    }
  }

  fn complete(self) {
    let inner = self.rc_deref_mut().take();
    if let Some(inner) = inner {
      inner.complete();
    }
  }

  fn is_closed(&self) -> bool { self.rc_deref().is_closed() }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn closure_observer_only_sees_values() {
    let mut sum = 0;
    let mut observer = FnMutObserver(|v: i32| sum += v);
    observer.next(10);
    observer.next(20);
    assert!(!Observer::<i32, Infallible>::is_closed(&observer));
    Observer::<i32, Infallible>::complete(observer);
    assert_eq!(sum, 30);
  }

  #[test]
  fn boxed_observer_forwards_terminal() {
    let log = MutArc::own(Vec::new());
    let (n, e) = (log.clone(), log.clone());
    let mut boxed = box_observer(AllObserver {
      next: move |v: i32| n.rc_deref_mut().push(v.to_string()),
      error: move |err: &str| e.rc_deref_mut().push(err.to_string()),
      complete: || {},
    });
    boxed.next(1);
    boxed.error("lost");
    assert_eq!(*log.rc_deref(), vec!["1", "lost"]);
  }

  #[test]
  fn empty_slot_is_closed() {
    let slot: Option<FnMutObserver<fn(i32)>> = None;
    assert!(Observer::<i32, Infallible>::is_closed(&slot));
  }

  #[test]
  fn shared_slot_closes_for_every_clone() {
    let completed = MutArc::own(false);
    let c = completed.clone();
    let slot = MutArc::own(Some(AllObserver {
      next: |_: i32| {},
      error: |_: ()| {},
      complete: move || *c.rc_deref_mut() = true,
    }));
    let handle = slot.clone();
    assert!(!Observer::<i32, ()>::is_closed(&handle));
    Observer::<i32, ()>::complete(slot);
    assert!(*completed.rc_deref());
    assert!(Observer::<i32, ()>::is_closed(&handle));
  }
}
