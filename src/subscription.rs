//! Subscription trait and implementations
//!
//! A subscription is the control handle returned by `subscribe`. It is
//! consumed by `unsubscribe`, which makes double disposal impossible at the
//! type level; cloneable handles such as [`TaskHandle`] opt back into sharing.
//!
//! [`TaskHandle`]: crate::scheduler::TaskHandle

mod boxed;
mod tuple;

pub use boxed::*;
pub use tuple::*;

/// Handle used to cancel an active subscription.
pub trait Subscription {
  /// Stop receiving notifications and release the resources held for them.
  fn unsubscribe(self);

  fn is_closed(&self) -> bool;
}

/// The subscription of a source that has nothing to cancel.
impl Subscription for () {
  #[inline]
  fn unsubscribe(self) {}

  #[inline]
  fn is_closed(&self) -> bool { true }
}

impl<S: Subscription> Subscription for Option<S> {
  #[inline]
  fn unsubscribe(self) {
    if let Some(inner) = self {
      inner.unsubscribe();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.as_ref().is_none_or(Subscription::is_closed) }
}

/// An RAII implementation of a "scoped subscribed" of a subscription.
/// When this structure is dropped (falls out of scope), the subscription will
/// be unsubscribed.
///
/// If you want to drop it immediately, wrap it in its own scope
#[must_use]
pub struct SubscriptionGuard<T: Subscription>(Option<T>);

impl<T: Subscription> SubscriptionGuard<T> {
  /// Wraps an existing subscription with a guard to enable RAII behavior for
  /// it.
  pub fn new(subscription: T) -> SubscriptionGuard<T> { SubscriptionGuard(Some(subscription)) }

  /// Gives up the RAII behavior and returns the subscription.
  pub fn into_inner(mut self) -> Option<T> { self.0.take() }
}

impl<T: Subscription> Drop for SubscriptionGuard<T> {
  #[inline]
  fn drop(&mut self) {
    if let Some(subscription) = self.0.take() {
      subscription.unsubscribe();
    }
  }
}

/// Helper for subscriptions that can be turned into a drop guard.
pub trait SubscriptionLike: Subscription + Sized {
  /// Activates "RAII" behavior for this subscription. That means
  /// `unsubscribe()` will be called automatically as soon as the returned
  /// value goes out of scope.
  ///
  /// **Attention:** If you don't assign the return value to a variable,
  /// `unsubscribe()` is called immediately, which is probably not what you
  /// want!
  fn unsubscribe_when_dropped(self) -> SubscriptionGuard<Self> { SubscriptionGuard::new(self) }
}

impl<T: Subscription> SubscriptionLike for T {}
