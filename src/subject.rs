//! Multicast hot source.
//!
//! A [`Subject`] is both an observer and an observable: every value pushed
//! into it is forwarded to all of its current subscribers. Wake signals are
//! usually modelled as a `Subject<(), Infallible>` fed by the platform.
//!
//! Once a subject has terminated, a late subscriber receives the terminal
//! notification right away.
//!
//! Pushing into a subject from inside one of its own subscribers' callbacks
//! is not supported. Route such events through a
//! [`SerialEventQueue`](crate::serial_queue::SerialEventQueue).

use std::sync::Arc;

use crate::{
  observable::Observable,
  observer::{box_observer, Observer},
  rc::{MutArc, RcDeref, RcDerefMut},
  subscription::Subscription,
};

mod subscribers;

use subscribers::{Slot, Subscribers};

enum Terminal<Err> {
  Completed,
  Errored(Err),
}

struct SubjectState<Item, Err> {
  subscribers: Subscribers<Item, Err>,
  terminal: Option<Terminal<Err>>,
}

pub struct Subject<Item, Err> {
  state: MutArc<SubjectState<Item, Err>>,
}

impl<Item, Err> Clone for Subject<Item, Err> {
  fn clone(&self) -> Self { Self { state: self.state.clone() } }
}

impl<Item, Err> Default for Subject<Item, Err> {
  fn default() -> Self { Self::new() }
}

impl<Item, Err> Subject<Item, Err> {
  pub fn new() -> Self {
    Self { state: MutArc::own(SubjectState { subscribers: Subscribers::default(), terminal: None }) }
  }

  /// Number of active subscribers.
  pub fn subscriber_count(&self) -> usize { self.state.rc_deref().subscribers.len() }

  pub fn is_terminated(&self) -> bool { self.state.rc_deref().terminal.is_some() }
}

impl<Item, Err> Observer<Item, Err> for Subject<Item, Err>
where
  Item: Clone,
  Err: Clone,
{
  fn next(&mut self, value: Item) {
    let slots = {
      let state = self.state.rc_deref();
      if state.terminal.is_some() {
        return;
      }
      state.subscribers.snapshot()
    };

    let mut iter = slots.iter().peekable();
    while let Some(slot) = iter.next() {
      if iter.peek().is_some() {
        slot.next(value.clone());
      } else {
        slot.next(value);
        break;
      }
    }
  }

  fn error(self, err: Err) {
    let slots = {
      let mut state = self.state.rc_deref_mut();
      if state.terminal.is_some() {
        return;
      }
      state.terminal = Some(Terminal::Errored(err.clone()));
      state.subscribers.drain()
    };
    for slot in slots {
      slot.error(err.clone());
    }
  }

  fn complete(self) {
    let slots = {
      let mut state = self.state.rc_deref_mut();
      if state.terminal.is_some() {
        return;
      }
      state.terminal = Some(Terminal::Completed);
      state.subscribers.drain()
    };
    for slot in slots {
      slot.complete();
    }
  }

  fn is_closed(&self) -> bool { self.is_terminated() }
}

impl<Item, Err> Observable<Item, Err> for Subject<Item, Err>
where
  Item: Send + 'static,
  Err: Clone + Send + 'static,
{
  type Unsub = SubjectSubscription<Item, Err>;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let mut state = self.state.rc_deref_mut();
    let replay = match &state.terminal {
      Some(Terminal::Completed) => Some(Ok(())),
      Some(Terminal::Errored(err)) => Some(Err(err.clone())),
      None => None,
    };
    match replay {
      Some(terminal) => {
        drop(state);
        match terminal {
          Ok(()) => observer.complete(),
          Err(err) => observer.error(err),
        }
        SubjectSubscription { subject: None }
      }
      None => {
        let (id, slot) = state.subscribers.add(box_observer(observer));
        drop(state);
        SubjectSubscription { subject: Some((self.state, id, slot)) }
      }
    }
  }
}

/// Subscription to a [`Subject`]. Removing the observer never waits for a
/// notification in progress.
pub struct SubjectSubscription<Item, Err> {
  #[allow(clippy::type_complexity)]
  subject: Option<(MutArc<SubjectState<Item, Err>>, usize, Arc<Slot<Item, Err>>)>,
}

impl<Item, Err> Subscription for SubjectSubscription<Item, Err> {
  fn unsubscribe(self) {
    if let Some((state, id, slot)) = self.subject {
      slot.close();
      state.rc_deref_mut().subscribers.remove(id);
    }
  }

  fn is_closed(&self) -> bool {
    self
      .subject
      .as_ref()
      .is_none_or(|(_, _, slot)| slot.is_closed())
  }
}
