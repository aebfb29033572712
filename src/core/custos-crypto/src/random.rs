//! Cryptographically secure random generation.
//!
//! Uses the operating system's CSPRNG for all random byte generation.

use std::fmt;

use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

/// Supplies cryptographically strong random byte sequences.
///
/// Implementations must be safe to draw from concurrently; several codec
/// instances may share one source.
pub trait RandomBytesSource: Send + Sync + fmt::Debug {
    /// Returns `len` random bytes.
    fn generate(&self, len: usize) -> Zeroizing<Vec<u8>>;
}

/// Random source backed by the operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomSource;

impl RandomBytesSource for OsRandomSource {
    fn generate(&self, len: usize) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(generate_bytes(len))
    }
}

/// Generates cryptographically secure random bytes.
///
/// # Arguments
///
/// * `len` - Number of random bytes to generate
pub fn generate_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
