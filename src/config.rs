//! Configuration of the wake-aware operators.
//!
//! Both structures derive serde traits so they can be loaded together with
//! the rest of an application's configuration. Durations use serde's
//! standard `{ "secs": .., "nanos": .. }` representation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Due time and optional period of a wake-aware timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSpec {
  /// Delay of the first tick, measured from subscription.
  pub due_time: Duration,
  /// Interval between ticks. Absent, zero or `Duration::MAX` means one-shot.
  #[serde(default)]
  pub period: Option<Duration>,
}

impl TimerSpec {
  pub fn once(due_time: Duration) -> Self { Self { due_time, period: None } }

  pub fn periodic(due_time: Duration, period: Duration) -> Self {
    Self { due_time, period: Some(period) }
  }

  /// The same spec with every "never repeats" spelling turned into `None`.
  pub fn normalized(self) -> Self {
    let period = self
      .period
      .filter(|p| !p.is_zero() && *p != Duration::MAX);
    Self { period, ..self }
  }

  pub fn is_periodic(&self) -> bool { self.normalized().period.is_some() }
}

/// Settings of `resubscribe_on_wake`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResubscribeConfig {
  /// Minimum scheduler time between two resubscriptions. Zero disables the
  /// throttle.
  pub min_interval: Duration,
  /// Name of the subscription in log events.
  pub label: Option<String>,
}

pub const DEFAULT_MIN_RESUBSCRIBE_INTERVAL: Duration = Duration::from_secs(60);

impl Default for ResubscribeConfig {
  fn default() -> Self { Self { min_interval: DEFAULT_MIN_RESUBSCRIBE_INTERVAL, label: None } }
}

impl ResubscribeConfig {
  pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
    self.min_interval = min_interval;
    self
  }

  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.label = Some(label.into());
    self
  }
}
