use crate::{
  observable::Observable,
  observer::Observer,
  scheduler::{Duration, Scheduler, TaskHandle},
};

/// Returns an observable which will emit a single `item` once after a given
/// `dur` using a given `scheduler`, then complete.
pub fn timer<Item, S>(item: Item, dur: Duration, scheduler: S) -> TimerObservable<Item, S> {
  TimerObservable { item, dur, scheduler }
}

#[derive(Clone)]
pub struct TimerObservable<Item, S> {
  item: Item,
  dur: Duration,
  scheduler: S,
}

impl<Item, Err, S> Observable<Item, Err> for TimerObservable<Item, S>
where
  Item: Send + 'static,
  S: Scheduler,
{
  type Unsub = TaskHandle;

  fn actual_subscribe<O>(self, mut observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let item = self.item;
    self.scheduler.schedule(
      move || {
        observer.next(item);
        observer.complete();
      },
      Some(self.dur),
    )
  }
}
