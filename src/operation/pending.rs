//! Observer-side bookkeeping for a single awaited operation.

use std::cell::Cell;

use tokio::sync::watch;

use super::result::{reconcile, OperationHandlers, OperationResult, OperationStatus};
use super::token::OperationToken;

/// The token an observer is currently waiting for, if any.
///
/// Holds a copy of the token only; the slot it is compared against belongs
/// to the store. Once an outcome is applied the token is cleared so the same
/// result can never be applied twice.
#[derive(Debug, Default)]
pub struct PendingOperation {
    expected: Option<OperationToken>,
}

impl PendingOperation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a token for a new attempt and start waiting for it
    pub fn begin(&mut self) -> OperationToken {
        self.begin_with(OperationToken::mint())
    }

    /// Start waiting for a caller-supplied token
    pub fn begin_with(&mut self, token: OperationToken) -> OperationToken {
        self.expected = Some(token.clone());
        token
    }

    pub fn expected(&self) -> Option<&OperationToken> {
        self.expected.as_ref()
    }

    /// Whether an outcome is still awaited. Dialogs keep their close
    /// affordance locked while this holds.
    pub fn is_busy(&self) -> bool {
        self.expected.is_some()
    }

    /// Stop caring about the outcome; later results are ignored
    pub fn abandon(&mut self) {
        self.expected = None;
    }

    /// Reconcile `result` and clear the token when it was handled
    pub fn observe(&mut self, result: &OperationResult, handlers: OperationHandlers<'_>) -> bool {
        let handled = reconcile(result, self.expected.as_ref(), handlers);
        if handled {
            self.expected = None;
        }
        handled
    }

    /// Wait on a slot subscription until this observer's outcome arrives.
    ///
    /// Returns `None` when the observer is not waiting or the slot owner
    /// went away before an outcome was recorded.
    pub async fn settle(
        &mut self,
        updates: &mut watch::Receiver<OperationResult>,
    ) -> Option<OperationStatus> {
        loop {
            let result = updates.borrow_and_update().clone();
            let settled = {
                let outcome = Cell::new(None);
                let handlers = OperationHandlers::new(|| outcome.set(Some(OperationStatus::Success)))
                    .on_error(|| outcome.set(Some(OperationStatus::Error)));
                self.observe(&result, handlers).then(|| outcome.get()).flatten()
            };
            if settled.is_some() {
                return settled;
            }
            if !self.is_busy() {
                return None;
            }
            if updates.changed().await.is_err() {
                return None;
            }
        }
    }
}
