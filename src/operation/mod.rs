//! Async operation reconciliation.
//!
//! A mutation is tagged with an [`OperationToken`] when it is issued. The
//! owning store re-arms its [`OperationSlot`] with that token, performs the
//! call, and records `success` or `error` under the same token. Observers
//! hold a [`PendingOperation`] and apply an outcome only when the slot's
//! token matches theirs, so stale or foreign results are never acted on.
//!
//! There is one slot per mutation kind: a newer attempt supersedes an older
//! one and the older outcome is dropped.

mod pending;
mod result;
mod slot;
mod token;

pub use pending::PendingOperation;
pub use result::{reconcile, OperationHandlers, OperationResult, OperationStatus};
pub use slot::OperationSlot;
pub use token::OperationToken;
