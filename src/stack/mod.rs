//! Infrastructure stack lifecycle management.
//!
//! - [`waiter`]: polls long-running lifecycle transitions to a terminal state
//! - [`lifecycle`]: decides among create / update / recreate / dry-run
//! - [`preview`]: ephemeral change-set previews with guaranteed cleanup

pub mod lifecycle;
pub mod preview;
pub mod waiter;

pub use lifecycle::{ApplyMode, StackLevel, StackLifecycleManager, StackOutcome, StackSpec};
pub use preview::ChangeSetPreview;
pub use waiter::{CancelFlag, StackWaiter};
