//! Reversible encryption codec.
//!
//! Encrypts with a block cipher chosen by name, pads with a configurable
//! [`Padding`], optionally prefixes random salt bytes and optionally base64
//! encodes the result.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;
use zeroize::Zeroizing;

use custos_crypto::{
    CipherModule, CipherProvider, NativeCipherProvider, OsRandomSource, Padding,
    RandomBytesSource,
};

use crate::config::{
    expect_bounded, expect_bytes, expect_flag, expect_text, Configuration, OptionValue, Schema,
};
use crate::error::CodecError;

/// Largest accepted `saltLength`, in bytes.
pub const MAX_SALT_LENGTH: i64 = 1 << 20;

/// Option names of [`ReversibleCodec`].
const OPTIONS: &[&str] = &[
    "algorithm",
    "mode",
    "padding",
    "key",
    "iv",
    "saltLength",
    "base64Encode",
];

// ============================================================================
// Schema
// ============================================================================

/// Option schema of [`ReversibleCodec`].
///
/// `algorithm` and `mode` are checked against the cipher provider when set.
#[derive(Debug, Clone)]
pub struct ReversibleSchema {
    ciphers: Arc<dyn CipherProvider>,
}

impl ReversibleSchema {
    /// Creates a schema validating against `ciphers`.
    pub fn new(ciphers: Arc<dyn CipherProvider>) -> Self {
        Self { ciphers }
    }
}

impl Schema for ReversibleSchema {
    fn names(&self) -> &'static [&'static str] {
        OPTIONS
    }

    fn defaults(&self) -> Vec<(&'static str, OptionValue)> {
        vec![
            ("padding", OptionValue::Text(Padding::default().to_string())),
            ("saltLength", OptionValue::Integer(0)),
            ("base64Encode", OptionValue::Bool(true)),
        ]
    }

    fn coerce(&self, name: &str, value: OptionValue) -> Result<OptionValue, CodecError> {
        match name {
            "algorithm" => {
                let value = expect_text(name, value)?;
                if let OptionValue::Text(algorithm) = &value {
                    if !self.ciphers.supports_algorithm(algorithm) {
                        return Err(CodecError::UnsupportedAlgorithm(algorithm.clone()));
                    }
                }
                Ok(value)
            }
            "mode" => {
                let value = expect_text(name, value)?;
                if let OptionValue::Text(mode) = &value {
                    if !self.ciphers.supports_mode(mode) {
                        return Err(CodecError::UnsupportedMode(mode.clone()));
                    }
                }
                Ok(value)
            }
            "padding" => match expect_text(name, value)? {
                OptionValue::Text(padding) => {
                    let padding: Padding = padding.parse()?;
                    Ok(OptionValue::Text(padding.to_string()))
                }
                other => Ok(other),
            },
            "key" | "iv" => expect_bytes(name, value),
            "saltLength" => expect_bounded(name, value, MAX_SALT_LENGTH),
            "base64Encode" => expect_flag(name, value),
            _ => Err(CodecError::UnknownOption(name.to_string())),
        }
    }
}

// ============================================================================
// Cipher Session
// ============================================================================

/// An open cipher module bound to one algorithm and mode.
///
/// The module is reused across calls; key and IV are installed for the
/// duration of a single operation through [`CipherSession::begin`].
#[derive(Debug)]
pub struct CipherSession {
    algorithm: String,
    mode: String,
    module: Box<dyn CipherModule>,
}

impl CipherSession {
    /// Opens `algorithm` in `mode` from `ciphers`.
    pub fn open(
        ciphers: &dyn CipherProvider,
        algorithm: &str,
        mode: &str,
    ) -> Result<Self, CodecError> {
        let module = ciphers.open(algorithm, mode)?;
        Ok(Self {
            algorithm: algorithm.to_string(),
            mode: mode.to_string(),
            module,
        })
    }

    /// Algorithm name.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Block mode name.
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Cipher block size in bytes.
    pub fn block_size(&self) -> usize {
        self.module.block_size()
    }

    /// Maximum key size in bytes.
    pub fn key_size(&self) -> usize {
        self.module.key_size()
    }

    /// Required IV size in bytes, 0 when the mode takes none.
    pub fn iv_size(&self) -> usize {
        self.module.iv_size()
    }

    /// Checks key and IV lengths against the cipher.
    pub fn validate(&self, key: &[u8], iv: &[u8]) -> Result<(), CodecError> {
        if key.len() > self.key_size() {
            return Err(CodecError::InvalidArgument(format!(
                "key must be at most {} bytes, got {}",
                self.key_size(),
                key.len()
            )));
        }

        let iv_size = self.iv_size();
        if iv_size != 0 && iv.len() != iv_size {
            return Err(CodecError::InvalidArgument(format!(
                "IV must be {} bytes, got {}",
                iv_size,
                iv.len()
            )));
        }

        Ok(())
    }

    /// Installs `key` and `iv` until the returned guard is dropped.
    pub fn begin(&mut self, key: &[u8], iv: &[u8]) -> Result<SessionGuard<'_>, CodecError> {
        self.module.init(key, iv)?;
        Ok(SessionGuard {
            module: &mut self.module,
        })
    }
}

/// Keeps a key and IV installed in a [`CipherSession`].
///
/// Dropping the guard wipes them, including on early return.
#[derive(Debug)]
pub struct SessionGuard<'a> {
    module: &'a mut Box<dyn CipherModule>,
}

impl SessionGuard<'_> {
    /// Encrypts block-aligned `data`.
    ///
    /// Every failure of the module, misaligned input included, is a
    /// [`CodecError::CryptoBackend`].
    pub fn encrypt(&mut self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.module.encrypt(data).map_err(CodecError::CryptoBackend)
    }

    /// Decrypts block-aligned `data`.
    pub fn decrypt(&mut self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.module.decrypt(data).map_err(CodecError::CryptoBackend)
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.module.deinit();
    }
}

// ============================================================================
// Reversible Codec
// ============================================================================

/// Symmetric encrypt/decrypt with padding, salting and text encoding.
///
/// Not meant for concurrent use: encryption takes `&mut self`. Wrap the codec
/// in a `Mutex`, or create one per task, to share it between threads.
pub struct ReversibleCodec {
    config: Configuration<ReversibleSchema>,
    ciphers: Arc<dyn CipherProvider>,
    random: Arc<dyn RandomBytesSource>,
    session: Option<CipherSession>,
}

impl ReversibleCodec {
    /// Creates a codec with default options and the native providers.
    pub fn new() -> Self {
        Self::with_providers(Arc::new(NativeCipherProvider), Arc::new(OsRandomSource))
    }

    /// Creates a codec with the native providers and applies `options`.
    pub fn with_options<I, K, V>(options: I) -> Result<Self, CodecError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        let mut codec = Self::new();
        codec.config.apply(options)?;
        Ok(codec)
    }

    /// Creates a codec with the native providers from a JSON options object.
    pub fn from_json(options: &serde_json::Value) -> Result<Self, CodecError> {
        let ciphers: Arc<dyn CipherProvider> = Arc::new(NativeCipherProvider);
        let config = Configuration::from_json(ReversibleSchema::new(Arc::clone(&ciphers)), options)?;
        Ok(Self {
            config,
            ciphers,
            random: Arc::new(OsRandomSource),
            session: None,
        })
    }

    /// Creates a codec with default options and the given providers.
    pub fn with_providers(
        ciphers: Arc<dyn CipherProvider>,
        random: Arc<dyn RandomBytesSource>,
    ) -> Self {
        Self {
            config: Configuration::new(ReversibleSchema::new(Arc::clone(&ciphers))),
            ciphers,
            random,
            session: None,
        }
    }

    /// Restores default options, applies `options` and closes the session.
    pub fn initialize<I, K, V>(&mut self, options: I) -> Result<&mut Self, CodecError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        self.close();
        self.config.reset();
        self.config.apply(options)?;
        Ok(self)
    }

    /// Current options.
    pub fn config(&self) -> &Configuration<ReversibleSchema> {
        &self.config
    }

    /// Reads an option.
    pub fn get(&self, name: &str) -> Result<&OptionValue, CodecError> {
        self.config.get(name)
    }

    /// Sets an option. Changing `algorithm` or `mode` closes the session.
    pub fn set(&mut self, name: &str, value: impl Into<OptionValue>) -> Result<&mut Self, CodecError> {
        self.config.set(name, value)?;
        if matches!(name, "algorithm" | "mode") {
            self.close();
        }
        Ok(self)
    }

    /// Key size of the configured cipher.
    pub fn key_size(&mut self) -> Result<usize, CodecError> {
        Ok(self.session()?.key_size())
    }

    /// IV size of the configured cipher and mode.
    pub fn iv_size(&mut self) -> Result<usize, CodecError> {
        Ok(self.session()?.iv_size())
    }

    /// Block size of the configured cipher.
    pub fn block_size(&mut self) -> Result<usize, CodecError> {
        Ok(self.session()?.block_size())
    }

    /// Generates a random key of [`ReversibleCodec::key_size`] bytes.
    pub fn create_key(&mut self) -> Result<Zeroizing<Vec<u8>>, CodecError> {
        let size = self.key_size()?;
        Ok(self.random.generate(size))
    }

    /// Generates a random IV of [`ReversibleCodec::iv_size`] bytes.
    pub fn create_iv(&mut self) -> Result<Zeroizing<Vec<u8>>, CodecError> {
        let size = self.iv_size()?;
        Ok(self.random.generate(size))
    }

    /// Encrypts `data`.
    ///
    /// `key` and `iv` fall back to the `key` and `iv` options when absent or
    /// empty. The result is `salt || ciphertext`, base64 encoded when
    /// `base64Encode` is set.
    pub fn encrypt(
        &mut self,
        data: &[u8],
        key: Option<&[u8]>,
        iv: Option<&[u8]>,
    ) -> Result<Vec<u8>, CodecError> {
        let padding = self.padding()?;
        let salt_length = self.salt_length()?;
        let encode = self.base64_encode()?;
        let key = resolve_secret(&self.config, key, "key")?;
        let iv = resolve_secret(&self.config, iv, "iv")?;
        let random = Arc::clone(&self.random);

        let session = self.session()?;
        session.validate(&key, &iv)?;

        let padded = Zeroizing::new(padding.pad(data, session.block_size())?);
        let ciphertext = session.begin(&key, &iv)?.encrypt(&padded)?;

        let capacity = salt_length.checked_add(ciphertext.len()).ok_or_else(|| {
            CodecError::InvalidArgument("payload size overflows".to_string())
        })?;
        let mut payload = Vec::with_capacity(capacity);
        if salt_length > 0 {
            payload.extend_from_slice(&random.generate(salt_length));
        }
        payload.extend_from_slice(&ciphertext);

        debug!(
            algorithm = session.algorithm(),
            mode = session.mode(),
            padding = %padding,
            bytes = data.len(),
            salt_length,
            "Payload encrypted"
        );

        if encode {
            Ok(BASE64.encode(&payload).into_bytes())
        } else {
            Ok(payload)
        }
    }

    /// Decrypts a payload produced by [`ReversibleCodec::encrypt`].
    ///
    /// Must run with the options used to encrypt: the salt length is not
    /// recorded in the payload.
    pub fn decrypt(
        &mut self,
        payload: &[u8],
        key: Option<&[u8]>,
        iv: Option<&[u8]>,
    ) -> Result<Zeroizing<Vec<u8>>, CodecError> {
        let padding = self.padding()?;
        let salt_length = self.salt_length()?;
        let encoded = self.base64_encode()?;
        let key = resolve_secret(&self.config, key, "key")?;
        let iv = resolve_secret(&self.config, iv, "iv")?;

        let session = self.session()?;
        session.validate(&key, &iv)?;

        let raw = if encoded {
            Zeroizing::new(BASE64.decode(payload).map_err(|e| {
                CodecError::InvalidArgument(format!("payload is not valid base64: {}", e))
            })?)
        } else {
            Zeroizing::new(payload.to_vec())
        };

        if raw.len() < salt_length {
            return Err(CodecError::InvalidArgument(format!(
                "payload of {} bytes is shorter than the {}-byte salt",
                raw.len(),
                salt_length
            )));
        }

        let decrypted = Zeroizing::new(session.begin(&key, &iv)?.decrypt(&raw[salt_length..])?);
        let plaintext = padding.unpad(&decrypted, session.block_size())?;

        debug!(
            algorithm = session.algorithm(),
            mode = session.mode(),
            bytes = plaintext.len(),
            "Payload decrypted"
        );

        Ok(Zeroizing::new(plaintext))
    }

    /// Releases the cipher session. The next operation reopens it.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(
                algorithm = session.algorithm(),
                mode = session.mode(),
                "Cipher session closed"
            );
        }
    }

    /// Returns true while a cipher session is open.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn session(&mut self) -> Result<&mut CipherSession, CodecError> {
        if self.session.is_none() {
            let algorithm = self
                .config
                .text("algorithm")?
                .ok_or_else(|| CodecError::Configuration("cipher algorithm is not set".into()))?;
            let mode = self
                .config
                .text("mode")?
                .ok_or_else(|| CodecError::Configuration("cipher mode is not set".into()))?;

            let session = CipherSession::open(self.ciphers.as_ref(), algorithm, mode)?;
            debug!(algorithm = algorithm, mode = mode, "Cipher session opened");
            self.session = Some(session);
        }

        self.session
            .as_mut()
            .ok_or_else(|| CodecError::Configuration("cipher session unavailable".into()))
    }

    fn padding(&self) -> Result<Padding, CodecError> {
        match self.config.text("padding")? {
            Some(name) => Ok(name.parse()?),
            None => Ok(Padding::default()),
        }
    }

    fn salt_length(&self) -> Result<usize, CodecError> {
        Ok(self.config.integer("saltLength")?.unwrap_or(0))
    }

    fn base64_encode(&self) -> Result<bool, CodecError> {
        Ok(self.config.flag("base64Encode")?.unwrap_or(true))
    }
}

/// Picks the explicit value when non-empty, else the configured option.
fn resolve_secret(
    config: &Configuration<ReversibleSchema>,
    explicit: Option<&[u8]>,
    name: &str,
) -> Result<Zeroizing<Vec<u8>>, CodecError> {
    if let Some(value) = explicit.filter(|v| !v.is_empty()) {
        return Ok(Zeroizing::new(value.to_vec()));
    }

    match config.bytes(name)? {
        Some(value) if !value.is_empty() => Ok(Zeroizing::new(value.to_vec())),
        _ => Err(CodecError::Configuration(format!(
            "set option \"{}\" or pass it explicitly",
            name
        ))),
    }
}

impl Default for ReversibleCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReversibleCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReversibleCodec")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish()
    }
}

impl fmt::Display for ReversibleCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = serde_json::json!({
            "class": "ReversibleCodec",
            "config": &self.config,
        });
        match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => f.write_str(&text),
            Err(_) => Err(fmt::Error),
        }
    }
}
