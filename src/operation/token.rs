//! Operation token minting.
//!
//! Tokens are UUID v4 strings built from the OS secure random source. When
//! that source is unavailable a seeded non-cryptographic generator fills the
//! same `xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx` layout, so callers never see
//! a difference in shape.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const UUID_V4_TEMPLATE: &str = "xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx";

/// Opaque identifier correlating one mutation attempt with its outcome
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationToken(String);

impl OperationToken {
    /// Wrap an existing token value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Mint a fresh token for a new mutation attempt
    pub fn mint() -> Self {
        let mut bytes = [0u8; 16];
        match getrandom::getrandom(&mut bytes) {
            Ok(()) => Self(
                uuid::Builder::from_random_bytes(bytes)
                    .into_uuid()
                    .to_string(),
            ),
            Err(err) => {
                tracing::debug!(error = %err, "secure random source unavailable, using fallback token");
                Self(fallback_uuid())
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for OperationToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// UUID-v4-shaped string from a clock-and-counter seeded PRNG
fn fallback_uuid() -> String {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default();
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut rng = SmallRng::seed_from_u64(nanos ^ sequence.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    fallback_uuid_with(&mut rng)
}

fn fallback_uuid_with<R: Rng>(rng: &mut R) -> String {
    UUID_V4_TEMPLATE
        .chars()
        .map(|c| match c {
            'x' => hex_digit(rng.gen_range(0..16)),
            // variant bits 10xx
            'y' => hex_digit((rng.gen_range(0..16) & 0x3) | 0x8),
            other => other,
        })
        .collect()
}

fn hex_digit(value: u32) -> char {
    char::from_digit(value, 16).unwrap_or('0')
}
