//! # rxwake: suspension-aware reactive primitives
//!
//! Small push-based building blocks for hosts that may be suspended at any
//! moment (a laptop lid closing, a mobile app going to the background). Timers
//! and subscriptions that silently stop while the process is frozen are
//! repaired by an explicit *wake signal*: any `Observable<(), Infallible>` the
//! application fires when it believes it may just have resumed.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxwake::prelude::*;
//!
//! let scheduler = TestScheduler::new();
//! let wake = Subject::<(), Infallible>::new();
//! let ticks = MutArc::own(Vec::new());
//!
//! let t = ticks.clone();
//! let sc = scheduler.clone();
//! observable::wake_aware_timer(
//!   TimerSpec::periodic(Duration::from_secs(2), Duration::from_secs(300)),
//!   wake.clone(),
//!   scheduler.clone(),
//! )
//! .subscribe(move |_| t.rc_deref_mut().push(sc.now().as_secs()));
//!
//! scheduler.advance_to(Duration::from_secs(302));
//! assert_eq!(*ticks.rc_deref(), vec![2, 302]);
//! ```
//!
//! ## Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`WakeAwareTimer`] | Timer that realigns to its original grid after a wake |
//! | [`Resubscribe`] | Rebuilds a subscription on wake, throttled |
//! | [`SingleFlight`] | At most one unit of work at a time, latest trigger wins |
//! | [`SerialEventQueue`] | Arrival-order delivery, safe to re-enter |
//! | [`AsyncMutexQueue`] | FIFO mutual exclusion for asynchronous operations |
//!
//! Every component takes its [`Scheduler`] explicitly. [`TestScheduler`]
//! drives virtual time and can simulate suspension in tests;
//! `TokioScheduler` runs on a tokio runtime.
//!
//! ## Feature Flags
//!
//! - **`tokio-scheduler`** (default): the tokio-backed scheduler
//!
//! [`WakeAwareTimer`]: observable::WakeAwareTimer
//! [`Resubscribe`]: ops::Resubscribe
//! [`SingleFlight`]: ops::SingleFlight
//! [`SerialEventQueue`]: serial_queue::SerialEventQueue
//! [`AsyncMutexQueue`]: operations_queue::AsyncMutexQueue
//! [`Scheduler`]: scheduler::Scheduler
//! [`TestScheduler`]: scheduler::TestScheduler

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod observable;
pub mod observer;
pub mod operations_queue;
pub mod ops;
pub mod prelude;
pub mod rc;
pub mod scheduler;
pub mod serial_queue;
pub mod subject;
pub mod subscription;
