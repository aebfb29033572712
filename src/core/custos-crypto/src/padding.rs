//! Block padding schemes.
//!
//! Block ciphers in CBC, ECB and CFB mode only accept whole blocks. A
//! [`Padding`] extends a buffer to a multiple of the block size before
//! encryption and strips the extension after decryption.
//!
//! # Null padding
//!
//! [`Padding::Null`] is lossy: unpadding removes every trailing `0x00`, so a
//! plaintext that itself ends in NUL bytes comes back shorter. This is kept
//! for compatibility with payloads written in that format. Use
//! [`Padding::Pkcs7`] for binary data.

use std::fmt;
use std::str::FromStr;

use crate::error::CryptoError;

/// Padding policy applied around the block cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding {
    /// `n` bytes of value `n`; a full block is added when already aligned.
    Pkcs7,
    /// NUL bytes up to the next block boundary; nothing when aligned.
    #[default]
    Null,
    /// No padding. The caller must supply block-aligned input.
    None,
}

impl Padding {
    /// Pads `data` to a multiple of `block_size`.
    pub fn pad(&self, data: &[u8], block_size: usize) -> Result<Vec<u8>, CryptoError> {
        check_block_size(block_size)?;

        match self {
            Self::Pkcs7 => {
                if block_size > usize::from(u8::MAX) {
                    return Err(CryptoError::InvalidInput(format!(
                        "block size {} too large for pkcs7",
                        block_size
                    )));
                }
                let n = block_size - (data.len() % block_size);
                let mut out = Vec::with_capacity(data.len() + n);
                out.extend_from_slice(data);
                // n <= block_size <= 255
                out.resize(data.len() + n, n as u8);
                Ok(out)
            }
            Self::Null => {
                let rem = data.len() % block_size;
                let mut out = data.to_vec();
                if rem != 0 {
                    out.resize(data.len() + block_size - rem, 0);
                }
                Ok(out)
            }
            Self::None => {
                if data.len() % block_size != 0 {
                    return Err(CryptoError::InvalidInput(format!(
                        "{} bytes is not a multiple of the {}-byte block size",
                        data.len(),
                        block_size
                    )));
                }
                Ok(data.to_vec())
            }
        }
    }

    /// Removes the padding added by [`Padding::pad`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::CorruptPadding`] for PKCS#7 when the trailing
    /// length byte is outside `1..=block_size` or longer than the buffer.
    pub fn unpad(&self, data: &[u8], block_size: usize) -> Result<Vec<u8>, CryptoError> {
        check_block_size(block_size)?;

        match self {
            Self::Pkcs7 => {
                let Some(&last) = data.last() else {
                    return Err(CryptoError::CorruptPadding("empty buffer".to_string()));
                };
                let n = usize::from(last);
                if n == 0 || n > block_size || n > data.len() {
                    return Err(CryptoError::CorruptPadding(format!(
                        "pad length {} out of range 1..={}",
                        n, block_size
                    )));
                }
                Ok(data[..data.len() - n].to_vec())
            }
            Self::Null => {
                let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                Ok(data[..end].to_vec())
            }
            Self::None => Ok(data.to_vec()),
        }
    }
}

fn check_block_size(block_size: usize) -> Result<(), CryptoError> {
    if block_size == 0 {
        return Err(CryptoError::InvalidInput("block size must be > 0".to_string()));
    }
    Ok(())
}

impl fmt::Display for Padding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pkcs7 => write!(f, "pkcs7"),
            Self::Null => write!(f, "null"),
            Self::None => write!(f, "none"),
        }
    }
}

impl FromStr for Padding {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pkcs7" => Ok(Self::Pkcs7),
            "null" => Ok(Self::Null),
            "none" => Ok(Self::None),
            _ => Err(CryptoError::InvalidInput(format!("unknown padding: {}", s))),
        }
    }
}
