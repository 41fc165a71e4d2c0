//! Shared per-kind result slot.

use tokio::sync::watch;

use super::result::{OperationResult, OperationStatus};
use super::token::OperationToken;

/// Holds the latest outcome for one kind of mutation.
///
/// The owning store is the only writer. Observers read the current value or
/// subscribe to changes and reconcile against the token they hold.
#[derive(Debug)]
pub struct OperationSlot {
    tx: watch::Sender<OperationResult>,
}

impl Default for OperationSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationSlot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(OperationResult::idle());
        Self { tx }
    }

    pub fn current(&self) -> OperationResult {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every slot write
    pub fn subscribe(&self) -> watch::Receiver<OperationResult> {
        self.tx.subscribe()
    }

    /// Re-arm for a new attempt, discarding any leftover outcome
    pub(crate) fn arm(&self, token: OperationToken) {
        self.tx.send_replace(OperationResult::armed(token));
    }

    /// Record the outcome for `token`.
    ///
    /// Returns `false` and leaves the slot untouched when a newer attempt has
    /// re-armed the slot since `token` was issued. A slot that was reset
    /// while `token` was in flight still receives the outcome.
    pub(crate) fn resolve(&self, token: &OperationToken, status: OperationStatus) -> bool {
        self.tx.send_if_modified(|current| {
            if current.operation_id.as_ref().is_some_and(|owner| owner != token) {
                return false;
            }
            *current = OperationResult {
                status,
                operation_id: Some(token.clone()),
            };
            true
        })
    }

    /// Whether a different attempt has armed the slot since `token` was issued
    pub(crate) fn is_superseded(&self, token: &OperationToken) -> bool {
        self.tx
            .borrow()
            .operation_id
            .as_ref()
            .is_some_and(|owner| owner != token)
    }

    pub(crate) fn reset(&self) {
        self.tx.send_replace(OperationResult::idle());
    }
}
