//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur in the cipher, digest and padding primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The requested cipher or digest algorithm is not provided.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The requested block mode is not provided.
    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    /// Invalid key or IV for the selected cipher.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid input data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The trailing padding bytes do not describe a valid pad.
    #[error("corrupt padding: {0}")]
    CorruptPadding(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
}
