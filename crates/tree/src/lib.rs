//! Hierarchical weighted progress aggregation.
//!
//! A [`ProgressNode`] tracks fractional completion (0.0 to 1.0) of a task
//! that may be decomposed into a weighted tree of subtasks. Leaves are
//! fed values directly; every ancestor reports the weighted average of
//! its children, recomputed on read, and notifies its own subscribers at
//! most once per burst of updates.
//!
//! ```
//! use loadgauge_core::TickScheduler;
//! use loadgauge_tree::ProgressNode;
//! use std::sync::Arc;
//!
//! let tick = Arc::new(TickScheduler::new());
//! let total = ProgressNode::new(tick.clone());
//! let download = total.create_child(Some(8.0)).unwrap();
//! let unpack = total.create_child(Some(2.0)).unwrap();
//!
//! download.set_amount_loaded(0.5);
//! unpack.set_amount_loaded(1.0);
//! tick.run_until_idle();
//!
//! assert_eq!(total.amount_loaded(), 0.6);
//! ```

#![warn(missing_docs)]

mod node;
mod snapshot;

pub use node::ProgressNode;
pub use snapshot::{NodeSnapshot, ProgressSnapshot};
