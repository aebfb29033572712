//! Codec error types.

use custos_crypto::CryptoError;
use thiserror::Error;

/// Errors that can occur in the codecs and their configuration.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A required setting (algorithm, mode, key, iv) is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The algorithm is not offered by the provider.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The block mode is not offered by the provider.
    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    /// The option name is not part of the codec's schema.
    #[error("unknown option: {0}")]
    UnknownOption(String),

    /// An argument or option value violates its constraints.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unpadding found an out-of-range pad length.
    #[error("corrupt padding: {0}")]
    CorruptPadding(String),

    /// The underlying cipher or digest call failed.
    #[error("crypto backend error: {0}")]
    CryptoBackend(#[source] CryptoError),
}

/// Maps argument-level primitive errors (key setup, padding) onto codec
/// variants. Cipher module encrypt/decrypt failures bypass this and are
/// wrapped as [`CodecError::CryptoBackend`] by the session.
impl From<CryptoError> for CodecError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::UnsupportedAlgorithm(name) => Self::UnsupportedAlgorithm(name),
            CryptoError::UnsupportedMode(name) => Self::UnsupportedMode(name),
            CryptoError::InvalidKey(msg) | CryptoError::InvalidInput(msg) => {
                Self::InvalidArgument(msg)
            }
            CryptoError::CorruptPadding(msg) => Self::CorruptPadding(msg),
            other => Self::CryptoBackend(other),
        }
    }
}
