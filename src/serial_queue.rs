//! Reentrancy-safe serial delivery of events.

use std::{collections::VecDeque, convert::Infallible, thread};

use crate::{
  observable::Observable,
  observer::Observer,
  rc::{MutArc, RcDerefMut},
  subject::{Subject, SubjectSubscription},
};

struct EventQueue<Item> {
  events: VecDeque<Item>,
  draining: bool,
}

/// Held by the drain owner. A subscriber panicking mid-drain hands the drain
/// back, the events left behind go out with the next `add_event`.
struct DrainOwner<'a, Item>(&'a MutArc<EventQueue<Item>>);

impl<Item> Drop for DrainOwner<'_, Item> {
  fn drop(&mut self) {
    if thread::panicking() {
      self.0.rc_deref_mut().draining = false;
    }
  }
}

/// Delivers events to its subscribers strictly in arrival order.
///
/// Whichever caller of [`add_event`](Self::add_event) finds no drain running
/// becomes the drain owner and delivers every buffered event, including the
/// ones added while it delivers. Any other caller, whether it runs on another
/// thread or inside a subscriber handling a previous event, only appends.
///
/// ```
/// use rxwake::prelude::*;
///
/// let queue = SerialEventQueue::new();
/// let seen = MutArc::own(Vec::new());
/// let (q, s) = (queue.clone(), seen.clone());
/// queue.clone().subscribe(move |v: u32| {
///   s.rc_deref_mut().push(v);
///   if v == 1 {
///     q.add_event(2);
///   }
///   s.rc_deref_mut().push(v * 10);
/// });
///
/// queue.add_event(1);
/// assert_eq!(*seen.rc_deref(), vec![1, 10, 2, 20]);
/// ```
pub struct SerialEventQueue<Item> {
  queue: MutArc<EventQueue<Item>>,
  subject: Subject<Item, Infallible>,
}

impl<Item> Clone for SerialEventQueue<Item> {
  fn clone(&self) -> Self { Self { queue: self.queue.clone(), subject: self.subject.clone() } }
}

impl<Item> Default for SerialEventQueue<Item> {
  fn default() -> Self { Self::new() }
}

impl<Item> SerialEventQueue<Item> {
  pub fn new() -> Self {
    Self {
      queue: MutArc::own(EventQueue { events: VecDeque::new(), draining: false }),
      subject: Subject::new(),
    }
  }

  /// Events buffered and not yet delivered.
  pub fn len(&self) -> usize { self.queue.rc_deref_mut().events.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl<Item: Clone> SerialEventQueue<Item> {
  pub fn add_event(&self, event: Item) {
    {
      let mut queue = self.queue.rc_deref_mut();
      queue.events.push_back(event);
      if queue.draining {
        return;
      }
      queue.draining = true;
    }

    let _owner = DrainOwner(&self.queue);
    let mut subject = self.subject.clone();
    loop {
      let next = {
        let mut queue = self.queue.rc_deref_mut();
        let next = queue.events.pop_front();
        if next.is_none() {
          queue.draining = false;
        }
        next
      };
      match next {
        Some(event) => subject.next(event),
        None => break,
      }
    }
  }
}

impl<Item: Clone> Observer<Item, Infallible> for SerialEventQueue<Item> {
  fn next(&mut self, value: Item) { self.add_event(value); }

  fn error(self, _: Infallible) {}

  fn complete(self) {}

  fn is_closed(&self) -> bool { false }
}

impl<Item> Observable<Item, Infallible> for SerialEventQueue<Item>
where
  Item: Send + 'static,
{
  type Unsub = SubjectSubscription<Item, Infallible>;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Infallible> + Send + 'static,
  {
    self.subject.actual_subscribe(observer)
  }
}
