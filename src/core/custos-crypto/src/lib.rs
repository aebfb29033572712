//! # Custos Crypto
//!
//! Primitives consumed by the Custos codecs.
//!
//! This crate never implements cipher or digest math. It wraps the RustCrypto
//! implementations behind narrow, string-addressed interfaces:
//! - Block ciphers and modes of operation ([`CipherProvider`])
//! - Message digests ([`DigestProvider`])
//! - Block padding schemes ([`Padding`])
//! - Secure random bytes ([`RandomBytesSource`])

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cipher;
pub mod digest;
pub mod error;
pub mod padding;
pub mod random;

pub use crate::cipher::{CipherModule, CipherProvider, NativeCipherProvider};
pub use crate::digest::{DigestProvider, NativeDigestProvider};
pub use error::CryptoError;
pub use padding::Padding;
pub use random::{OsRandomSource, RandomBytesSource};
