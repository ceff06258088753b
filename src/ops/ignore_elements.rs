use std::{convert::Infallible, marker::PhantomData};

use crate::{observable::Observable, observer::Observer};

pub struct IgnoreElementsOp<S, Item> {
  pub(crate) source: S,
  pub(crate) _marker: PhantomData<fn() -> Item>,
}

impl<S: Clone, Item> Clone for IgnoreElementsOp<S, Item> {
  fn clone(&self) -> Self { Self { source: self.source.clone(), _marker: PhantomData } }
}

impl<S, Item, Err> Observable<Infallible, Err> for IgnoreElementsOp<S, Item>
where
  S: Observable<Item, Err>,
{
  type Unsub = S::Unsub;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Infallible, Err> + Send + 'static,
  {
    self
      .source
      .actual_subscribe(IgnoreElementsObserver { observer })
  }
}

/// Drops every value and forwards only the terminal notification.
pub struct IgnoreElementsObserver<O> {
  observer: O,
}

impl<O, Item, Err> Observer<Item, Err> for IgnoreElementsObserver<O>
where
  O: Observer<Infallible, Err>,
{
  #[inline]
  fn next(&mut self, _value: Item) {}

  #[inline]
  fn error(self, err: Err) { self.observer.error(err) }

  #[inline]
  fn complete(self) { self.observer.complete() }

  #[inline]
  fn is_closed(&self) -> bool { self.observer.is_closed() }
}
