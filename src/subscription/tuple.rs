use super::Subscription;

/// Two subscriptions cancelled together, e.g. a source and the operator
/// state built around it.
pub struct TupleSubscription<A, B>(A, B);

impl<A, B> TupleSubscription<A, B> {
  pub fn new(a: A, b: B) -> Self { Self(a, b) }
}

impl<A: Subscription, B: Subscription> Subscription for TupleSubscription<A, B> {
  fn unsubscribe(self) {
    self.0.unsubscribe();
    self.1.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.0.is_closed() && self.1.is_closed() }
}
