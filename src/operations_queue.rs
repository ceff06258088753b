//! FIFO mutual exclusion for asynchronous operations.
//!
//! Every operation admitted to an [`AsyncMutexQueue`] takes a ticket. Only the
//! operation holding the head ticket runs; its ticket is released when it
//! completes or errors, which starts the operation behind it.
//!
//! A handle unsubscribed (or dropped unsubscribed) before its turn gives its
//! ticket back wherever it sits in the line, so an abandoned operation never
//! blocks the ones admitted after it.

use std::{
  collections::{HashMap, VecDeque},
  mem, thread,
};

use tracing::trace;

use crate::{
  observable::Observable,
  observer::Observer,
  rc::{MutArc, RcDeref, RcDerefMut},
  subscription::{BoxedSubscription, Subscription},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Ticket(u64);

type Starter = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct QueueState {
  next_ticket: u64,
  tickets: VecDeque<Ticket>,
  /// Operations subscribed but not yet at the head.
  waiting: HashMap<Ticket, Starter>,
  /// Operations whose turn came, in start order.
  ready: VecDeque<Starter>,
  draining: bool,
}

/// Runs admitted operations one at a time, in admission order.
///
/// ```
/// use rxwake::prelude::*;
///
/// let queue = AsyncMutexQueue::new();
/// let scheduler = TestScheduler::new();
/// let log = MutArc::own(Vec::new());
/// for (name, secs) in [("a", 3), ("b", 1)] {
///   let l = log.clone();
///   queue
///     .add_operation(observable::timer(name, Duration::from_secs(secs), scheduler.clone()))
///     .subscribe(move |v| l.rc_deref_mut().push(v));
/// }
///
/// scheduler.advance_by(Duration::from_secs(3));
/// assert_eq!(*log.rc_deref(), vec!["a"]);
/// scheduler.advance_by(Duration::from_secs(1));
/// assert_eq!(*log.rc_deref(), vec!["a", "b"]);
/// ```
#[derive(Clone, Default)]
pub struct AsyncMutexQueue {
  state: MutArc<QueueState>,
}

impl AsyncMutexQueue {
  pub fn new() -> Self { Self::default() }

  /// Admit `op`. The returned observable subscribes `op` once every operation
  /// admitted before it has finished, and mirrors its notifications.
  pub fn add_operation<Op>(&self, op: Op) -> QueuedOperation<Op> {
    let ticket = {
      let mut state = self.state.rc_deref_mut();
      let ticket = Ticket(state.next_ticket);
      state.next_ticket += 1;
      state.tickets.push_back(ticket);
      ticket
    };
    trace!(ticket = ticket.0, "operation admitted");
    QueuedOperation { op, guard: TicketGuard { ticket, queue: self.clone() } }
  }

  /// Tickets currently held, running operation included.
  pub fn len(&self) -> usize { self.state.rc_deref().tickets.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  fn enqueue(&self, ticket: Ticket, starter: Starter) {
    let rejected = {
      let mut state = self.state.rc_deref_mut();
      if state.tickets.front() == Some(&ticket) {
        state.ready.push_back(starter);
        None
      } else if state.tickets.contains(&ticket) {
        state.waiting.insert(ticket, starter);
        None
      } else {
        Some(starter)
      }
    };
    drop(rejected);
    self.drain();
  }

  fn release(&self, ticket: Ticket) {
    let abandoned = {
      let mut state = self.state.rc_deref_mut();
      state.tickets.retain(|t| *t != ticket);
      let abandoned = state.waiting.remove(&ticket);
      if let Some(head) = state.tickets.front().copied() {
        if let Some(starter) = state.waiting.remove(&head) {
          state.ready.push_back(starter);
        }
      }
      abandoned
    };
    trace!(ticket = ticket.0, "ticket released");
    drop(abandoned);
    self.drain();
  }

  /// Runs ready operations until none is left. Starts triggered while
  /// draining are picked up by the loop instead of nesting.
  fn drain(&self) {
    {
      let mut state = self.state.rc_deref_mut();
      if mem::replace(&mut state.draining, true) {
        return;
      }
    }
    let _owner = DrainOwner(self);
    loop {
      let starter = {
        let mut state = self.state.rc_deref_mut();
        let starter = state.ready.pop_front();
        if starter.is_none() {
          state.draining = false;
        }
        starter
      };
      match starter {
        Some(start) => start(),
        None => break,
      }
    }
  }
}

/// Held while draining. An operation panicking on start hands the drain
/// back, the next admission or release resumes it.
struct DrainOwner<'a>(&'a AsyncMutexQueue);

impl Drop for DrainOwner<'_> {
  fn drop(&mut self) {
    if thread::panicking() {
      self.0.state.rc_deref_mut().draining = false;
    }
  }
}

/// Gives its ticket back to the queue when dropped.
struct TicketGuard {
  ticket: Ticket,
  queue: AsyncMutexQueue,
}

impl Drop for TicketGuard {
  fn drop(&mut self) { self.queue.release(self.ticket); }
}

/// An operation waiting for its turn in an [`AsyncMutexQueue`].
pub struct QueuedOperation<Op> {
  op: Op,
  guard: TicketGuard,
}

struct OpRun {
  guard: Option<TicketGuard>,
  inner: Option<BoxedSubscription>,
  closed: bool,
}

impl<Op, Item, Err> Observable<Item, Err> for QueuedOperation<Op>
where
  Op: Observable<Item, Err> + Send + 'static,
  Item: 'static,
  Err: 'static,
{
  type Unsub = QueuedSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let QueuedOperation { op, guard } = self;
    let ticket = guard.ticket;
    let queue = guard.queue.clone();
    let run = MutArc::own(OpRun { guard: Some(guard), inner: None, closed: false });

    let starter = {
      let run = run.clone();
      move || {
        if run.rc_deref().closed {
          return;
        }
        trace!(ticket = ticket.0, "operation started");
        let observer = OpObserver { run: run.clone(), observer: MutArc::own(Some(observer)) };
        let inner = op.actual_subscribe(observer);
        let mut state = run.rc_deref_mut();
        if state.closed {
          drop(state);
          inner.unsubscribe();
        } else {
          state.inner = Some(BoxedSubscription::new(inner));
        }
      }
    };
    queue.enqueue(ticket, Box::new(starter));
    QueuedSubscription { run }
  }
}

struct OpObserver<O> {
  run: MutArc<OpRun>,
  observer: MutArc<Option<O>>,
}

impl<O> OpObserver<O> {
  fn finish(&self) -> Option<TicketGuard> {
    let mut run = self.run.rc_deref_mut();
    run.closed = true;
    run.guard.take()
  }
}

impl<Item, Err, O> Observer<Item, Err> for OpObserver<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    if !self.run.rc_deref().closed {
      self.observer.next(value);
    }
  }

  fn error(self, err: Err) {
    let guard = self.finish();
    self.observer.error(err);
    drop(guard);
  }

  fn complete(self) {
    let guard = self.finish();
    self.observer.complete();
    drop(guard);
  }

  fn is_closed(&self) -> bool { self.run.rc_deref().closed }
}

/// Subscription to a [`QueuedOperation`]. Unsubscribing cancels the
/// operation if it runs, or gives its ticket back if it still waits.
pub struct QueuedSubscription {
  run: MutArc<OpRun>,
}

impl Subscription for QueuedSubscription {
  fn unsubscribe(self) {
    let (inner, guard) = {
      let mut run = self.run.rc_deref_mut();
      run.closed = true;
      (run.inner.take(), run.guard.take())
    };
    inner.unsubscribe();
    drop(guard);
  }

  fn is_closed(&self) -> bool { self.run.rc_deref().closed }
}
