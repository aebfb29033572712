//! Block cipher provider.
//!
//! The codecs address ciphers by name (`"blowfish"`, `"rijndael-128"`, ...)
//! and mode (`"cbc"`, `"ecb"`, `"ncfb"`). A [`CipherProvider`] lists what it
//! supports and opens a [`CipherModule`] bound to one algorithm and mode. The
//! module follows an init/deinit lifecycle: key and IV are installed per
//! operation and wiped afterwards, the module itself can be reused.
//!
//! [`NativeCipherProvider`] is backed by the RustCrypto block cipher and
//! block mode crates. It performs no padding: input must be block aligned.

use std::fmt;
use std::str::FromStr;

use ::cipher::{
    block_padding::NoPadding, BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit,
};
use aes::{Aes128, Aes192, Aes256};
use blowfish::Blowfish;
use des::{Des, TdesEde3};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// A source of block ciphers addressed by algorithm and mode name.
pub trait CipherProvider: Send + Sync + fmt::Debug {
    /// Names of the supported cipher algorithms.
    fn algorithms(&self) -> Vec<String>;

    /// Names of the supported block modes.
    fn modes(&self) -> Vec<String>;

    /// Opens a cipher module for `algorithm` in `mode`.
    fn open(&self, algorithm: &str, mode: &str) -> Result<Box<dyn CipherModule>, CryptoError>;

    /// Returns true if `algorithm` is in [`CipherProvider::algorithms`].
    fn supports_algorithm(&self, algorithm: &str) -> bool {
        self.algorithms().iter().any(|a| a == algorithm)
    }

    /// Returns true if `mode` is in [`CipherProvider::modes`].
    fn supports_mode(&self, mode: &str) -> bool {
        self.modes().iter().any(|m| m == mode)
    }
}

/// An open cipher handle bound to a fixed algorithm and mode.
pub trait CipherModule: Send + fmt::Debug {
    /// Cipher block size in bytes.
    fn block_size(&self) -> usize;

    /// Maximum key size in bytes.
    fn key_size(&self) -> usize;

    /// IV size in bytes, 0 if the mode takes no IV.
    fn iv_size(&self) -> usize;

    /// Installs the key and IV for the next operations.
    fn init(&mut self, key: &[u8], iv: &[u8]) -> Result<(), CryptoError>;

    /// Encrypts block-aligned `data`.
    fn encrypt(&mut self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Decrypts block-aligned `data`.
    fn decrypt(&mut self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Wipes the installed key and IV.
    fn deinit(&mut self);
}

// ============================================================================
// Algorithms & Modes
// ============================================================================

/// Block ciphers offered by [`NativeCipherProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Blowfish, 64-bit blocks, 32 to 448 bit keys.
    Blowfish,
    /// AES (Rijndael with 128-bit blocks), 128/192/256 bit keys.
    Rijndael128,
    /// Single DES.
    Des,
    /// Triple DES (EDE3).
    TripleDes,
}

impl Algorithm {
    const ALL: [Algorithm; 4] = [
        Self::Blowfish,
        Self::Rijndael128,
        Self::Des,
        Self::TripleDes,
    ];

    /// Block size in bytes.
    pub fn block_size(&self) -> usize {
        match self {
            Self::Rijndael128 => 16,
            Self::Blowfish | Self::Des | Self::TripleDes => 8,
        }
    }

    /// Maximum key size in bytes.
    pub fn key_size(&self) -> usize {
        match self {
            Self::Blowfish => 56,
            Self::Rijndael128 => 32,
            Self::Des => 8,
            Self::TripleDes => 24,
        }
    }

    /// Expands a caller key to a length the cipher accepts.
    ///
    /// Short keys are zero-extended to the next valid size, except for
    /// Blowfish which takes variable-length keys of at least 4 bytes.
    fn normalize_key(&self, key: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if key.is_empty() || key.len() > self.key_size() {
            return Err(CryptoError::InvalidKey(format!(
                "expected 1 to {} bytes, got {}",
                self.key_size(),
                key.len()
            )));
        }

        let target = match self {
            Self::Blowfish => {
                if key.len() < 4 {
                    return Err(CryptoError::InvalidKey(format!(
                        "blowfish needs at least 4 bytes, got {}",
                        key.len()
                    )));
                }
                key.len()
            }
            Self::Rijndael128 => [16, 24, 32]
                .into_iter()
                .find(|&size| size >= key.len())
                .unwrap_or(32),
            Self::Des | Self::TripleDes => self.key_size(),
        };

        let mut normalized = Zeroizing::new(vec![0u8; target]);
        normalized[..key.len()].copy_from_slice(key);
        Ok(normalized)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blowfish => write!(f, "blowfish"),
            Self::Rijndael128 => write!(f, "rijndael-128"),
            Self::Des => write!(f, "des"),
            Self::TripleDes => write!(f, "tripledes"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blowfish" => Ok(Self::Blowfish),
            "rijndael-128" => Ok(Self::Rijndael128),
            "des" => Ok(Self::Des),
            "tripledes" => Ok(Self::TripleDes),
            _ => Err(CryptoError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Block modes offered by [`NativeCipherProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Cipher block chaining.
    Cbc,
    /// Electronic codebook. Accepts an IV but ignores it.
    Ecb,
    /// Cipher feedback with a full-block shift register (`ncfb`).
    ///
    /// The byte-wise 8-bit feedback variant, conventionally named `cfb`, is
    /// not offered.
    Ncfb,
}

impl Mode {
    const ALL: [Mode; 3] = [Self::Cbc, Self::Ecb, Self::Ncfb];
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cbc => write!(f, "cbc"),
            Self::Ecb => write!(f, "ecb"),
            Self::Ncfb => write!(f, "ncfb"),
        }
    }
}

impl FromStr for Mode {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cbc" => Ok(Self::Cbc),
            "ecb" => Ok(Self::Ecb),
            "ncfb" => Ok(Self::Ncfb),
            _ => Err(CryptoError::UnsupportedMode(s.to_string())),
        }
    }
}

// ============================================================================
// Native Provider
// ============================================================================

/// Cipher provider backed by the RustCrypto crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCipherProvider;

impl CipherProvider for NativeCipherProvider {
    fn algorithms(&self) -> Vec<String> {
        Algorithm::ALL.iter().map(ToString::to_string).collect()
    }

    fn modes(&self) -> Vec<String> {
        Mode::ALL.iter().map(ToString::to_string).collect()
    }

    fn open(&self, algorithm: &str, mode: &str) -> Result<Box<dyn CipherModule>, CryptoError> {
        let algorithm: Algorithm = algorithm.parse()?;
        let mode: Mode = mode.parse()?;

        debug!(algorithm = %algorithm, mode = %mode, "Cipher module opened");

        Ok(Box::new(NativeCipherModule {
            algorithm,
            mode,
            key: None,
            iv: None,
        }))
    }
}

/// A [`CipherModule`] produced by [`NativeCipherProvider`].
pub struct NativeCipherModule {
    algorithm: Algorithm,
    mode: Mode,
    key: Option<Zeroizing<Vec<u8>>>,
    iv: Option<Zeroizing<Vec<u8>>>,
}

impl NativeCipherModule {
    fn installed(&self) -> Result<(&[u8], &[u8]), CryptoError> {
        match (&self.key, &self.iv) {
            (Some(key), Some(iv)) => Ok((key.as_slice(), iv.as_slice())),
            _ => Err(CryptoError::InvalidKey("module not initialized".to_string())),
        }
    }

    fn check_aligned(&self, data: &[u8]) -> Result<(), CryptoError> {
        if data.len() % self.block_size() != 0 {
            return Err(CryptoError::InvalidInput(format!(
                "{} bytes is not a multiple of the {}-byte block size",
                data.len(),
                self.block_size()
            )));
        }
        Ok(())
    }
}

impl CipherModule for NativeCipherModule {
    fn block_size(&self) -> usize {
        self.algorithm.block_size()
    }

    fn key_size(&self) -> usize {
        self.algorithm.key_size()
    }

    fn iv_size(&self) -> usize {
        self.algorithm.block_size()
    }

    fn init(&mut self, key: &[u8], iv: &[u8]) -> Result<(), CryptoError> {
        let key = self.algorithm.normalize_key(key)?;

        if iv.len() != self.iv_size() {
            return Err(CryptoError::InvalidKey(format!(
                "IV must be {} bytes, got {}",
                self.iv_size(),
                iv.len()
            )));
        }

        self.key = Some(key);
        self.iv = Some(Zeroizing::new(iv.to_vec()));
        Ok(())
    }

    fn encrypt(&mut self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.check_aligned(data)?;
        let (key, iv) = self.installed()?;

        match self.algorithm {
            Algorithm::Blowfish => encrypt_with::<Blowfish>(self.mode, key, iv, data),
            Algorithm::Rijndael128 => match key.len() {
                16 => encrypt_with::<Aes128>(self.mode, key, iv, data),
                24 => encrypt_with::<Aes192>(self.mode, key, iv, data),
                _ => encrypt_with::<Aes256>(self.mode, key, iv, data),
            },
            Algorithm::Des => encrypt_with::<Des>(self.mode, key, iv, data),
            Algorithm::TripleDes => encrypt_with::<TdesEde3>(self.mode, key, iv, data),
        }
    }

    fn decrypt(&mut self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.check_aligned(data)?;
        let (key, iv) = self.installed()?;

        match self.algorithm {
            Algorithm::Blowfish => decrypt_with::<Blowfish>(self.mode, key, iv, data),
            Algorithm::Rijndael128 => match key.len() {
                16 => decrypt_with::<Aes128>(self.mode, key, iv, data),
                24 => decrypt_with::<Aes192>(self.mode, key, iv, data),
                _ => decrypt_with::<Aes256>(self.mode, key, iv, data),
            },
            Algorithm::Des => decrypt_with::<Des>(self.mode, key, iv, data),
            Algorithm::TripleDes => decrypt_with::<TdesEde3>(self.mode, key, iv, data),
        }
    }

    fn deinit(&mut self) {
        self.key = None;
        self.iv = None;
    }
}

impl fmt::Debug for NativeCipherModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeCipherModule")
            .field("algorithm", &self.algorithm)
            .field("mode", &self.mode)
            .field("initialized", &self.key.is_some())
            .finish()
    }
}

fn encrypt_with<C>(mode: Mode, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: BlockCipher + BlockEncryptMut + BlockDecryptMut + KeyInit,
{
    let invalid = |e: ::cipher::InvalidLength| CryptoError::EncryptionFailed(e.to_string());

    let ciphertext = match mode {
        Mode::Cbc => cbc::Encryptor::<C>::new_from_slices(key, iv)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<NoPadding>(data),
        Mode::Ecb => ecb::Encryptor::<C>::new_from_slice(key)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<NoPadding>(data),
        Mode::Ncfb => cfb_mode::Encryptor::<C>::new_from_slices(key, iv)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<NoPadding>(data),
    };

    Ok(ciphertext)
}

fn decrypt_with<C>(mode: Mode, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: BlockCipher + BlockEncryptMut + BlockDecryptMut + KeyInit,
{
    let invalid = |e: ::cipher::InvalidLength| CryptoError::DecryptionFailed(e.to_string());
    let unaligned = |_| CryptoError::DecryptionFailed("ciphertext is not block aligned".to_string());

    match mode {
        Mode::Cbc => cbc::Decryptor::<C>::new_from_slices(key, iv)
            .map_err(invalid)?
            .decrypt_padded_vec_mut::<NoPadding>(data)
            .map_err(unaligned),
        Mode::Ecb => ecb::Decryptor::<C>::new_from_slice(key)
            .map_err(invalid)?
            .decrypt_padded_vec_mut::<NoPadding>(data)
            .map_err(unaligned),
        Mode::Ncfb => cfb_mode::Decryptor::<C>::new_from_slices(key, iv)
            .map_err(invalid)?
            .decrypt_padded_vec_mut::<NoPadding>(data)
            .map_err(unaligned),
    }
}
