//! Operation results and the reconciliation guard.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::token::OperationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// No outcome has arrived for the current token
    #[default]
    Idle,
    Success,
    Error,
}

/// Latest outcome held by a slot, tagged with the token that produced it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub status: OperationStatus,
    pub operation_id: Option<OperationToken>,
}

impl OperationResult {
    /// Untagged idle slot
    pub fn idle() -> Self {
        Self::default()
    }

    /// Idle slot re-armed for a new attempt
    pub fn armed(token: OperationToken) -> Self {
        Self {
            status: OperationStatus::Idle,
            operation_id: Some(token),
        }
    }

    pub fn success(token: OperationToken) -> Self {
        Self {
            status: OperationStatus::Success,
            operation_id: Some(token),
        }
    }

    pub fn error(token: OperationToken) -> Self {
        Self {
            status: OperationStatus::Error,
            operation_id: Some(token),
        }
    }

    pub fn is_for(&self, token: &OperationToken) -> bool {
        self.operation_id.as_ref() == Some(token)
    }
}

/// Callbacks applied when a matching outcome is reconciled
pub struct OperationHandlers<'a> {
    on_success: Box<dyn FnOnce() + 'a>,
    on_error: Option<Box<dyn FnOnce() + 'a>>,
}

impl<'a> OperationHandlers<'a> {
    pub fn new(on_success: impl FnOnce() + 'a) -> Self {
        Self {
            on_success: Box::new(on_success),
            on_error: None,
        }
    }

    pub fn on_error(mut self, on_error: impl FnOnce() + 'a) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }
}

impl fmt::Debug for OperationHandlers<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHandlers")
            .field("on_error", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}

/// Apply `result` to the observer waiting on `expected`.
///
/// Returns `true` only when the result carries the expected token and a
/// terminal status; the matching handler has then run exactly once. An
/// observer that is not waiting (`None`), a result tagged with another
/// token, or an idle result are all ignored and yield `false`. The slot
/// itself is never touched.
pub fn reconcile(
    result: &OperationResult,
    expected: Option<&OperationToken>,
    handlers: OperationHandlers<'_>,
) -> bool {
    let Some(expected) = expected else {
        return false;
    };
    if !result.is_for(expected) {
        return false;
    }

    match result.status {
        OperationStatus::Success => {
            (handlers.on_success)();
            true
        }
        OperationStatus::Error => {
            if let Some(on_error) = handlers.on_error {
                on_error();
            }
            true
        }
        OperationStatus::Idle => false,
    }
}
