//! Client-side state for the ticket and device views.
//!
//! Each store wraps one data service, keeps its view state behind a lock and
//! owns the result slots for its mutations. Stores are passed around as
//! explicit `Arc` dependencies.

mod devices;
mod tickets;

pub use devices::{DevicesState, DevicesStore};
pub use tickets::{TicketsState, TicketsStore};

use std::sync::atomic::{AtomicU64, Ordering};

use crate::api::ApiError;

/// Sequence guard for loads: only the most recently started load may apply
/// its response.
#[derive(Debug, Default)]
pub(crate) struct Latest(AtomicU64);

impl Latest {
    pub fn begin(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, seq: u64) -> bool {
        self.0.load(Ordering::SeqCst) == seq
    }
}

/// Message recorded in a store's `error` field
pub(crate) fn error_message(err: &ApiError, fallback: &str) -> String {
    match err {
        ApiError::Network(_) => err.user_message(),
        _ => err.message().unwrap_or_else(|| fallback.to_string()),
    }
}
