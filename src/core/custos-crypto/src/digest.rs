//! Message digest provider.
//!
//! Digests are addressed by name so that the hash codec can take the
//! algorithm from configuration.

use std::fmt;

use sha2::{Digest, Sha224, Sha256, Sha384, Sha512, Sha512_256};
use sha3::{Sha3_256, Sha3_512};

use crate::error::CryptoError;

/// A source of message digests addressed by algorithm name.
pub trait DigestProvider: Send + Sync + fmt::Debug {
    /// Names of the supported digest algorithms.
    fn algorithms(&self) -> Vec<String>;

    /// Computes the digest of `data` with `algorithm`.
    fn digest(&self, algorithm: &str, data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Returns true if `algorithm` is in [`DigestProvider::algorithms`].
    fn supports(&self, algorithm: &str) -> bool {
        self.algorithms().iter().any(|a| a == algorithm)
    }
}

const ALGORITHMS: [&str; 7] = [
    "sha224",
    "sha256",
    "sha384",
    "sha512",
    "sha512/256",
    "sha3-256",
    "sha3-512",
];

/// Digest provider backed by the RustCrypto `sha2` and `sha3` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeDigestProvider;

impl DigestProvider for NativeDigestProvider {
    fn algorithms(&self) -> Vec<String> {
        ALGORITHMS.iter().map(ToString::to_string).collect()
    }

    fn digest(&self, algorithm: &str, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let bytes = match algorithm {
            "sha224" => Sha224::digest(data).to_vec(),
            "sha256" => Sha256::digest(data).to_vec(),
            "sha384" => Sha384::digest(data).to_vec(),
            "sha512" => Sha512::digest(data).to_vec(),
            "sha512/256" => Sha512_256::digest(data).to_vec(),
            "sha3-256" => Sha3_256::digest(data).to_vec(),
            "sha3-512" => Sha3_512::digest(data).to_vec(),
            _ => return Err(CryptoError::UnsupportedAlgorithm(algorithm.to_string())),
        };
        Ok(bytes)
    }
}
