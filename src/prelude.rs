//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

pub use std::convert::Infallible;

// Core traits
pub use crate::observable::{Observable, ObservableExt};
pub use crate::observer::Observer;
pub use crate::subscription::*;
// Creation and boxed observables
pub use crate::observable::{
  self, BoxedObservable, BoxedObservableClone, Emitter, TimerObservable, WakeAwareTimer,
  WakeTimerSubscription,
};
// Operators
pub use crate::ops::*;
// Components
pub use crate::operations_queue::{AsyncMutexQueue, QueuedOperation, QueuedSubscription};
pub use crate::serial_queue::SerialEventQueue;
pub use crate::subject::{Subject, SubjectSubscription};
// Scheduling
#[cfg(feature = "tokio-scheduler")]
pub use crate::scheduler::TokioScheduler;
pub use crate::scheduler::{Duration, ExecutionTag, Scheduler, TaskHandle, TestScheduler};
// Configuration and diagnostics
pub use crate::config::{ResubscribeConfig, TimerSpec};
pub use crate::diagnostic::{Diagnostic, DiagnosticSink, SharedSink, TracingSink};
pub use crate::error::SchedulerError;
pub use crate::rc::{MutArc, RcDeref, RcDerefMut};
