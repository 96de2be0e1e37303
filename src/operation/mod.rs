//! Long-running operation tracking.
//!
//! Mutating calls against the control plane return an operation that is
//! polled to completion by the [`OperationWaiter`]. Transient polling
//! failures are retried inside the polling schedule; a finished operation
//! carrying errors fails with the server's codes; running out of time is
//! reported as its own error kind.

mod handle;
mod waiter;

pub use handle::{Operation, OperationHandle, OperationPoller, OperationScope, OperationStatus};
pub use waiter::{Backoff, OperationWaiter, WaitSettings};
