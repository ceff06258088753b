pub mod ignore_elements;
pub mod resubscribe;
pub mod single_flight;

pub use ignore_elements::IgnoreElementsOp;
pub use resubscribe::{Resubscribe, ResubscribeSubscription};
pub use single_flight::{FlightSubscription, SingleFlight};
