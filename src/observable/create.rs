use std::marker::PhantomData;

use crate::{
  observable::Observable,
  observer::{box_observer, BoxedObserver, Observer},
  subscription::Subscription,
};

/// Observable created from a function.
///
/// The function receives an [`Emitter`] it may keep around to push values
/// later, and returns the subscription that tears the producer down.
///
/// ```
/// use rxwake::prelude::*;
///
/// let source = observable::create(|mut emitter: Emitter<i32, Infallible>| {
///   emitter.next(1);
///   emitter.complete();
/// });
/// source.subscribe(|v| assert_eq!(v, 1));
/// ```
pub fn create<F, Item, Err, U>(f: F) -> Create<F, Item, Err>
where
  F: FnOnce(Emitter<Item, Err>) -> U,
  U: Subscription + Send + 'static,
{
  Create { f, _marker: PhantomData }
}

pub struct Create<F, Item, Err> {
  f: F,
  _marker: PhantomData<fn() -> (Item, Err)>,
}

impl<F: Clone, Item, Err> Clone for Create<F, Item, Err> {
  fn clone(&self) -> Self { Create { f: self.f.clone(), _marker: PhantomData } }
}

impl<F, Item, Err, U> Observable<Item, Err> for Create<F, Item, Err>
where
  F: FnOnce(Emitter<Item, Err>) -> U,
  U: Subscription + Send + 'static,
  Item: 'static,
  Err: 'static,
{
  type Unsub = U;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    (self.f)(Emitter(Some(box_observer(observer))))
  }
}

/// Owned handle used by [`create`] producers to push notifications.
///
/// Notifications after a terminal one are ignored.
pub struct Emitter<Item, Err>(Option<BoxedObserver<Item, Err>>);

impl<Item, Err> Emitter<Item, Err> {
  pub fn next(&mut self, value: Item) {
    if let Some(observer) = self.0.as_mut() {
      observer.next(value);
    }
  }

  pub fn error(&mut self, err: Err) {
    if let Some(observer) = self.0.take() {
      observer.error(err);
    }
  }

  pub fn complete(&mut self) {
    if let Some(observer) = self.0.take() {
      observer.complete();
    }
  }

  pub fn is_closed(&self) -> bool { self.0.as_ref().is_none_or(|o| o.is_closed()) }
}

#[cfg(test)]
mod tests {
  use crate::{observable, prelude::*};

  #[test]
  fn emitter_can_be_kept_for_later() {
    let parked: MutArc<Option<Emitter<i32, ()>>> = MutArc::own(None);
    let p = parked.clone();
    let seen = MutArc::own(Vec::new());
    let s = seen.clone();
    let done = seen.clone();
    observable::create(move |emitter| *p.rc_deref_mut() = Some(emitter)).subscribe_all(
      move |v| s.rc_deref_mut().push(v),
      |_| {},
      move || done.rc_deref_mut().push(0),
    );
    assert!(seen.rc_deref().is_empty());

    let mut emitter = parked.rc_deref_mut().take().unwrap();
    emitter.next(1);
    emitter.complete();
    emitter.next(2);
    assert!(emitter.is_closed());
    assert_eq!(*seen.rc_deref(), vec![1, 0]);
  }

  #[test]
  fn returned_subscription_is_handed_back() {
    let handle = TaskHandle::new();
    let h = handle.clone();
    let sub = observable::create(move |_: Emitter<(), Infallible>| h).subscribe(|_| {});
    sub.unsubscribe();
    assert!(handle.is_closed());
  }
}
