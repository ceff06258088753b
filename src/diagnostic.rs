//! Non-fatal misuse reports.
//!
//! The coordination primitives never fail synchronously. When they notice a
//! situation that points at a programming error they describe it as a
//! [`Diagnostic`] and hand it to a [`DiagnosticSink`], then keep going.
//!
//! The default sink is [`TracingSink`], which emits a `tracing` error event
//! with the structured fields of the diagnostic. Any
//! `Fn(&Diagnostic) + Send + Sync` closure can stand in for it:
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxwake::prelude::*;
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let s = seen.clone();
//! let sink: SharedSink = Arc::new(move |d: &Diagnostic| s.lock().unwrap().push(d.as_label()));
//! sink.report(&Diagnostic::SameExecutionContext { tag: ExecutionTag::unique() });
//! assert_eq!(*seen.lock().unwrap(), vec!["same_execution_context"]);
//! ```

use std::{sync::Arc, time::Duration};

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::scheduler::ExecutionTag;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Diagnostic {
  /// A one-shot timer that already fired was asked to reschedule past its due
  /// time.
  #[error(
    "one-shot timer rescheduled after firing: due {due_time:?} from {anchor:?}, now {now:?}"
  )]
  UnexpectedTimerReschedule {
    due_time: Duration,
    period: Option<Duration>,
    anchor: Duration,
    now: Duration,
  },

  /// A trigger reached a single-flight operator from inside the context that
  /// runs its work, so the work is queued behind the caller.
  #[error("trigger delivered on the worker context {tag:?}; work will run after the caller returns")]
  SameExecutionContext { tag: ExecutionTag },
}

impl Diagnostic {
  /// Returns a short stable label (snake_case) for use in logs.
  pub fn as_label(&self) -> &'static str {
    match self {
      Diagnostic::UnexpectedTimerReschedule { .. } => "unexpected_timer_reschedule",
      Diagnostic::SameExecutionContext { .. } => "same_execution_context",
    }
  }
}

/// Receiver of [`Diagnostic`]s.
pub trait DiagnosticSink: Send + Sync {
  fn report(&self, diagnostic: &Diagnostic);
}

impl<F> DiagnosticSink for F
where
  F: Fn(&Diagnostic) + Send + Sync,
{
  #[inline]
  fn report(&self, diagnostic: &Diagnostic) { self(diagnostic) }
}

pub type SharedSink = Arc<dyn DiagnosticSink>;

/// Writes every diagnostic as a `tracing` error event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
  fn report(&self, diagnostic: &Diagnostic) {
    match diagnostic {
      Diagnostic::UnexpectedTimerReschedule { due_time, period, anchor, now } => {
        tracing::error!(
          label = diagnostic.as_label(),
          ?due_time,
          ?period,
          ?anchor,
          ?now,
          "{diagnostic}"
        );
      }
      Diagnostic::SameExecutionContext { tag } => {
        tracing::error!(label = diagnostic.as_label(), ?tag, "{diagnostic}");
      }
    }
  }
}

static DEFAULT_SINK: Lazy<SharedSink> = Lazy::new(|| Arc::new(TracingSink));

/// The sink used when none is configured.
pub fn default_sink() -> SharedSink { DEFAULT_SINK.clone() }
