//! Handles to background execution contexts.
//!
//! A dedicated context belongs to exactly one owner and is torn down with
//! [`DedicatedContext::terminate`]. A shared context is reachable from many
//! owners by name; [`SharedContext::close`] only releases this owner's port.

use crate::error::Result;
use crate::messages::WorkerRequest;

/// A context owned by a single caller.
pub trait DedicatedContext: Send + Sync {
    /// Post a request. Delivery is asynchronous.
    fn post(&self, request: WorkerRequest) -> Result<()>;

    /// Stop the context. Pending and future posts are dropped.
    fn terminate(&self);
}

/// A context shared by every caller that connects under the same name.
pub trait SharedContext: Send + Sync {
    /// Post a request on this owner's port.
    fn post(&self, request: WorkerRequest) -> Result<()>;

    /// Close this owner's port.
    fn close(&self);
}
