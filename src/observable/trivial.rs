use std::marker::PhantomData;

use crate::{observable::Observable, observer::Observer};

/// Creates an observable that produces no values.
///
/// Completes immediately. Never emits an error.
pub fn empty<Item, Err>() -> Empty<Item, Err> { Empty(PhantomData) }

/// Creates an observable that never emits anything and never terminates.
pub fn never<Item, Err>() -> Never<Item, Err> { Never(PhantomData) }

/// Creates an observable that emits no items, just terminates with an error.
pub fn throw<Item, Err>(e: Err) -> Throw<Item, Err> { Throw(e, PhantomData) }

pub struct Empty<Item, Err>(PhantomData<fn() -> (Item, Err)>);

pub struct Never<Item, Err>(PhantomData<fn() -> (Item, Err)>);

pub struct Throw<Item, Err>(Err, PhantomData<fn() -> Item>);

impl<Item, Err> Clone for Empty<Item, Err> {
  fn clone(&self) -> Self { empty() }
}

impl<Item, Err> Clone for Never<Item, Err> {
  fn clone(&self) -> Self { never() }
}

impl<Item, Err: Clone> Clone for Throw<Item, Err> {
  fn clone(&self) -> Self { throw(self.0.clone()) }
}

impl<Item, Err> Observable<Item, Err> for Empty<Item, Err> {
  type Unsub = ();

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    observer.complete();
  }
}

impl<Item, Err> Observable<Item, Err> for Never<Item, Err> {
  type Unsub = ();

  fn actual_subscribe<O>(self, _observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
  }
}

impl<Item, Err> Observable<Item, Err> for Throw<Item, Err> {
  type Unsub = ();

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    observer.error(self.0);
  }
}

#[cfg(test)]
mod tests {
  use crate::{observable, prelude::*};

  #[test]
  fn empty_completes_without_values() {
    let hits = MutArc::own((0, false));
    let n = hits.clone();
    let c = hits.clone();
    observable::empty::<i32, ()>().subscribe_all(
      move |_| n.rc_deref_mut().0 += 1,
      |_| {},
      move || c.rc_deref_mut().1 = true,
    );
    assert_eq!(*hits.rc_deref(), (0, true));
  }

  #[test]
  fn never_stays_silent() {
    let hits = MutArc::own(0);
    let h = hits.clone();
    let c = hits.clone();
    observable::never::<i32, ()>().subscribe_all(
      move |_| *h.rc_deref_mut() += 1,
      |_| {},
      move || *c.rc_deref_mut() += 1,
    );
    assert_eq!(*hits.rc_deref(), 0);
  }
}
