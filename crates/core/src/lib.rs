//! Loadgauge core primitives.
//!
//! Identifiers, validated value types, and the notification and
//! scheduling primitives the progress tree is built on.

#![warn(missing_docs)]

mod emitter;
mod id;
mod scheduler;
mod value;

pub use emitter::Emitter;
pub use id::{NodeId, SubscriptionId};
pub use scheduler::{Deferred, Scheduler, TickScheduler, TokioScheduler};
pub use value::{Fraction, FractionError, Weight, WeightError};
