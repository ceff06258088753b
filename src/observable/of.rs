use std::marker::PhantomData;

use crate::{observable::Observable, observer::Observer};

/// Creates an observable producing a single value.
///
/// Completes immediately after emitting the value given. Never emits an error.
///
/// # Examples
///
/// ```
/// use rxwake::prelude::*;
///
/// observable::of(123).subscribe(|v| println!("{v}"));
/// ```
pub fn of<Item, Err>(v: Item) -> Of<Item, Err> { Of { value: v, _marker: PhantomData } }

pub struct Of<Item, Err> {
  value: Item,
  _marker: PhantomData<fn() -> Err>,
}

impl<Item: Clone, Err> Clone for Of<Item, Err> {
  fn clone(&self) -> Self { of(self.value.clone()) }
}

impl<Item, Err> Observable<Item, Err> for Of<Item, Err> {
  type Unsub = ();

  fn actual_subscribe<O>(self, mut observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    observer.next(self.value);
    observer.complete();
  }
}
