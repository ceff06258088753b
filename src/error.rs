//! Errors raised outside the push contract.
//!
//! Upstream failures travel through the `Err` channel of each observable and
//! misuse is reported as a [`Diagnostic`](crate::diagnostic::Diagnostic).
//! What is left are errors of setting things up.

use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
  /// A runtime-backed scheduler was requested outside of any runtime.
  #[error("no async runtime is running on the current thread")]
  NoRuntime,
}

impl SchedulerError {
  /// Returns a short stable label (snake_case) for use in logs.
  pub fn as_label(&self) -> &'static str {
    match self {
      SchedulerError::NoRuntime => "scheduler_no_runtime",
    }
  }
}
