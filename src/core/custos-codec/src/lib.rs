//! # Custos Codec
//!
//! Data-protection codecs for storing and verifying sensitive values.
//!
//! - [`ReversibleCodec`]: block cipher encryption with padding, an optional
//!   random salt prefix and optional base64 text encoding.
//! - [`StretchedHasher`]: salted, iteratively stretched one-way digests and
//!   random salt/token strings.
//!
//! Both are configured through a typed [`Configuration`] whose option names
//! are fixed per codec.
//!
//! ## Payload Format
//!
//! Encrypted payloads are `salt (saltLength bytes) || ciphertext`, base64
//! encoded as a whole when `base64Encode` is set. The salt length is not
//! recorded in the payload: decrypt with the same configuration used to
//! encrypt.
//!
//! ## Example
//!
//! ```
//! use custos_codec::{ReversibleCodec, StretchedHasher};
//!
//! let mut codec = ReversibleCodec::with_options([
//!     ("algorithm", "blowfish"),
//!     ("mode", "cbc"),
//!     ("padding", "pkcs7"),
//! ])?;
//! let key = codec.create_key()?;
//! let iv = codec.create_iv()?;
//!
//! let encrypted = codec.encrypt(b"s3cret", Some(key.as_slice()), Some(iv.as_slice()))?;
//! let decrypted = codec.decrypt(&encrypted, Some(key.as_slice()), Some(iv.as_slice()))?;
//! assert_eq!(decrypted.as_slice(), b"s3cret");
//!
//! let hasher = StretchedHasher::with_options([("stretchingCount", 100u64)])?;
//! assert_eq!(hasher.hash("password", Some("salt"))?, hasher.hash("password", Some("salt"))?);
//! # Ok::<(), custos_codec::CodecError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;
pub mod reversible;

pub use config::{Configuration, OptionValue, Schema};
pub use error::CodecError;
pub use hash::{HashSchema, StretchedHasher};
pub use reversible::{CipherSession, ReversibleCodec, ReversibleSchema};
