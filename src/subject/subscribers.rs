use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Mutex, PoisonError,
};

use smallvec::SmallVec;

use crate::observer::{BoxedObserver, Observer};

/// One subscribed observer.
///
/// The `closed` flag is flipped by unsubscription without touching the
/// observer lock, so an observer may unsubscribe itself while it is being
/// notified.
pub(crate) struct Slot<Item, Err> {
  closed: AtomicBool,
  observer: Mutex<Option<BoxedObserver<Item, Err>>>,
}

impl<Item, Err> Slot<Item, Err> {
  fn new(observer: BoxedObserver<Item, Err>) -> Self {
    Self { closed: AtomicBool::new(false), observer: Mutex::new(Some(observer)) }
  }

  pub(crate) fn close(&self) { self.closed.store(true, Ordering::Release); }

  pub(crate) fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }

  pub(crate) fn next(&self, value: Item) {
    if self.is_closed() {
      return;
    }
    let mut observer = self
      .observer
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    if let Some(observer) = observer.as_mut() {
      observer.next(value);
    }
  }

  fn take(&self) -> Option<BoxedObserver<Item, Err>> {
    if self.closed.swap(true, Ordering::AcqRel) {
      return None;
    }
    self
      .observer
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take()
  }

  pub(crate) fn error(&self, err: Err) {
    if let Some(observer) = self.take() {
      observer.error(err);
    }
  }

  pub(crate) fn complete(&self) {
    if let Some(observer) = self.take() {
      observer.complete();
    }
  }
}

/// Subscribers container with ID-based removal.
pub(crate) struct Subscribers<Item, Err> {
  next_id: usize,
  entries: SmallVec<[(usize, Arc<Slot<Item, Err>>); 2]>,
}

impl<Item, Err> Default for Subscribers<Item, Err> {
  fn default() -> Self { Self { next_id: 0, entries: SmallVec::new() } }
}

impl<Item, Err> Subscribers<Item, Err> {
  /// Add an observer and return its unique ID together with its slot.
  pub(crate) fn add(&mut self, observer: BoxedObserver<Item, Err>) -> (usize, Arc<Slot<Item, Err>>) {
    let id = self.next_id;
    self.next_id += 1;
    let slot = Arc::new(Slot::new(observer));
    self.entries.push((id, slot.clone()));
    (id, slot)
  }

  /// Remove an observer by ID.
  pub(crate) fn remove(&mut self, id: usize) {
    self.entries.retain(|(slot_id, _)| *slot_id != id);
  }

  pub(crate) fn len(&self) -> usize { self.entries.len() }

  /// The current slots, to be notified after the container lock is
  /// released.
  pub(crate) fn snapshot(&self) -> SmallVec<[Arc<Slot<Item, Err>>; 2]> {
    self
      .entries
      .iter()
      .map(|(_, slot)| slot.clone())
      .collect()
  }

  /// Empty the container, handing out every slot.
  pub(crate) fn drain(&mut self) -> SmallVec<[Arc<Slot<Item, Err>>; 2]> {
    self
      .entries
      .drain(..)
      .map(|(_, slot)| slot)
      .collect()
  }
}
