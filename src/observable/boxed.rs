//! Boxed Observable types for type erasure
//!
//! Selectors that return different kinds of work, or sources stored in a
//! struct field, need one nameable type. The boxed forms are always `Send`
//! since every subscription in this crate may be driven from a scheduler
//! thread.

use crate::{
  observable::Observable,
  observer::{box_observer, BoxedObserver, Observer},
  subscription::BoxedSubscription,
};

// ============================================================================
// DynObservable Trait
// ============================================================================

/// Object-safe observable trait for type erasure.
pub trait DynObservable<Item, Err> {
  fn dyn_subscribe(self: Box<Self>, observer: BoxedObserver<Item, Err>) -> BoxedSubscription;
}

/// Object-safe clone support for type-erased observables.
pub trait DynObservableClone<Item, Err>: DynObservable<Item, Err> {
  fn clone_box(&self) -> Box<dyn DynObservableClone<Item, Err> + Send>;
}

impl<S, Item, Err> DynObservable<Item, Err> for S
where
  S: Observable<Item, Err>,
  Item: 'static,
  Err: 'static,
{
  fn dyn_subscribe(self: Box<Self>, observer: BoxedObserver<Item, Err>) -> BoxedSubscription {
    BoxedSubscription::new((*self).actual_subscribe(observer))
  }
}

impl<S, Item, Err> DynObservableClone<Item, Err> for S
where
  S: Observable<Item, Err> + Clone + Send + 'static,
  Item: 'static,
  Err: 'static,
{
  fn clone_box(&self) -> Box<dyn DynObservableClone<Item, Err> + Send> { Box::new(self.clone()) }
}

// ============================================================================
// Boxed Observables
// ============================================================================

pub struct BoxedObservable<Item, Err>(Box<dyn DynObservable<Item, Err> + Send>);

impl<Item, Err> BoxedObservable<Item, Err> {
  pub fn new<S>(source: S) -> Self
  where
    S: Observable<Item, Err> + Send + 'static,
    Item: 'static,
    Err: 'static,
  {
    Self(Box::new(source))
  }
}

impl<Item: 'static, Err: 'static> Observable<Item, Err> for BoxedObservable<Item, Err> {
  type Unsub = BoxedSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    self.0.dyn_subscribe(box_observer(observer))
  }
}

/// A boxed observable that can be subscribed more than once.
pub struct BoxedObservableClone<Item, Err>(Box<dyn DynObservableClone<Item, Err> + Send>);

impl<Item, Err> BoxedObservableClone<Item, Err> {
  pub fn new<S>(source: S) -> Self
  where
    S: Observable<Item, Err> + Clone + Send + 'static,
    Item: 'static,
    Err: 'static,
  {
    Self(Box::new(source))
  }
}

impl<Item, Err> Clone for BoxedObservableClone<Item, Err> {
  fn clone(&self) -> Self { Self(self.0.clone_box()) }
}

impl<Item: 'static, Err: 'static> Observable<Item, Err> for BoxedObservableClone<Item, Err> {
  type Unsub = BoxedSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    self.0.dyn_subscribe(box_observer(observer))
  }
}
