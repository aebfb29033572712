//! Irreversible hashing with stretching.
//!
//! [`StretchedHasher::hash`] feeds the previous round's hex digest, the data
//! and the salt back into the digest `stretchingCount` times. A count of 0
//! returns the data unchanged.

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use custos_crypto::{DigestProvider, NativeDigestProvider};

use crate::config::{expect_bounded, expect_text, Configuration, OptionValue, Schema};
use crate::error::CodecError;

/// Characters used for generated salts by default.
pub const DEFAULT_SALT_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Characters used by [`StretchedHasher::create_random`] by default.
pub const DEFAULT_RANDOM_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#%&+-./:=?[]_";

/// Largest accepted `saltLength` and `randomLength`, in characters.
pub const MAX_RANDOM_LENGTH: i64 = 1 << 20;

/// Largest accepted `stretchingCount`.
pub const MAX_STRETCHING_COUNT: i64 = 10_000_000;

const OPTIONS: &[&str] = &[
    "algorithm",
    "stretchingCount",
    "saltLength",
    "saltChars",
    "randomLength",
    "randomChars",
];

/// Option schema of [`StretchedHasher`].
///
/// `algorithm` is checked against the digest provider when set.
#[derive(Debug, Clone)]
pub struct HashSchema {
    digests: Arc<dyn DigestProvider>,
}

impl HashSchema {
    /// Creates a schema validating against `digests`.
    pub fn new(digests: Arc<dyn DigestProvider>) -> Self {
        Self { digests }
    }
}

impl Schema for HashSchema {
    fn names(&self) -> &'static [&'static str] {
        OPTIONS
    }

    fn defaults(&self) -> Vec<(&'static str, OptionValue)> {
        vec![
            ("algorithm", OptionValue::from("sha256")),
            ("stretchingCount", OptionValue::Integer(0)),
            ("saltLength", OptionValue::Integer(64)),
            ("saltChars", OptionValue::from(DEFAULT_SALT_CHARS)),
            ("randomLength", OptionValue::Integer(10)),
            ("randomChars", OptionValue::from(DEFAULT_RANDOM_CHARS)),
        ]
    }

    fn coerce(&self, name: &str, value: OptionValue) -> Result<OptionValue, CodecError> {
        match name {
            "algorithm" => {
                let value = expect_text(name, value)?;
                if let OptionValue::Text(algorithm) = &value {
                    if !self.digests.supports(algorithm) {
                        return Err(CodecError::UnsupportedAlgorithm(algorithm.clone()));
                    }
                }
                Ok(value)
            }
            "saltChars" | "randomChars" => expect_text(name, value),
            "stretchingCount" => expect_bounded(name, value, MAX_STRETCHING_COUNT),
            "saltLength" | "randomLength" => expect_bounded(name, value, MAX_RANDOM_LENGTH),
            _ => Err(CodecError::UnknownOption(name.to_string())),
        }
    }
}

/// Salted, stretched one-way hashing and random string generation.
pub struct StretchedHasher {
    config: Configuration<HashSchema>,
    digests: Arc<dyn DigestProvider>,
}

impl StretchedHasher {
    /// Creates a hasher with default options and the native digests.
    pub fn new() -> Self {
        Self::with_provider(Arc::new(NativeDigestProvider))
    }

    /// Creates a hasher with default options and the given digests.
    pub fn with_provider(digests: Arc<dyn DigestProvider>) -> Self {
        Self {
            config: Configuration::new(HashSchema::new(Arc::clone(&digests))),
            digests,
        }
    }

    /// Creates a hasher with the native digests and applies `options`.
    pub fn with_options<I, K, V>(options: I) -> Result<Self, CodecError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        let mut hasher = Self::new();
        hasher.config.apply(options)?;
        Ok(hasher)
    }

    /// Creates a hasher with the native digests from a JSON options object.
    pub fn from_json(options: &serde_json::Value) -> Result<Self, CodecError> {
        let digests: Arc<dyn DigestProvider> = Arc::new(NativeDigestProvider);
        Ok(Self {
            config: Configuration::from_json(HashSchema::new(Arc::clone(&digests)), options)?,
            digests,
        })
    }

    /// Restores default options and applies `options`.
    pub fn initialize<I, K, V>(&mut self, options: I) -> Result<&mut Self, CodecError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        self.config.reset();
        self.config.apply(options)?;
        Ok(self)
    }

    /// Current options.
    pub fn config(&self) -> &Configuration<HashSchema> {
        &self.config
    }

    /// Reads an option.
    pub fn get(&self, name: &str) -> Result<&OptionValue, CodecError> {
        self.config.get(name)
    }

    /// Sets an option.
    pub fn set(
        &mut self,
        name: &str,
        value: impl Into<OptionValue>,
    ) -> Result<&mut Self, CodecError> {
        self.config.set(name, value)?;
        Ok(self)
    }

    /// Hashes `data` with `salt`.
    ///
    /// Without a salt, one is generated from `saltLength` and `saltChars`;
    /// the result then cannot be reproduced, so store your own salt when the
    /// digest must be verified later.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnsupportedAlgorithm`] if the digest provider no longer
    /// offers the configured algorithm.
    pub fn hash(&self, data: &str, salt: Option<&str>) -> Result<String, CodecError> {
        let generated;
        let salt = match salt {
            Some(salt) => salt,
            None => {
                generated = self.create_random(
                    Some(self.config.integer("saltLength")?.unwrap_or(0)),
                    Some(self.config.text("saltChars")?.unwrap_or_default()),
                )?;
                &generated
            }
        };

        let algorithm = self.config.text("algorithm")?.unwrap_or_default();
        if !self.digests.supports(algorithm) {
            return Err(CodecError::UnsupportedAlgorithm(algorithm.to_string()));
        }

        let stretching_count = self.config.integer("stretchingCount")?.unwrap_or(0);
        if stretching_count == 0 {
            warn!("Stretching count is 0, returning data unhashed");
            return Ok(data.to_string());
        }

        let mut hashed = data.to_string();
        let mut input = Zeroizing::new(Vec::new());
        for _ in 0..stretching_count {
            input.clear();
            input.extend_from_slice(hashed.as_bytes());
            input.extend_from_slice(data.as_bytes());
            input.extend_from_slice(salt.as_bytes());
            hashed = hex::encode(self.digests.digest(algorithm, &input)?);
        }

        debug!(algorithm = algorithm, stretching_count, "Data hashed");

        Ok(hashed)
    }

    /// Generates a random string.
    ///
    /// `length` and `chars` default to the `randomLength` and `randomChars`
    /// options. Characters are drawn uniformly, with replacement. The
    /// generator is a thread-local PRNG suitable for salts and tokens, not
    /// for keys.
    ///
    /// # Errors
    ///
    /// [`CodecError::InvalidArgument`] if the length is 0 or the character
    /// set is empty.
    pub fn create_random(
        &self,
        length: Option<usize>,
        chars: Option<&str>,
    ) -> Result<String, CodecError> {
        let length = match length {
            Some(length) => length,
            None => self.config.integer("randomLength")?.unwrap_or(0),
        };
        if length == 0 {
            return Err(CodecError::InvalidArgument(
                "random length must be > 0".to_string(),
            ));
        }

        let chars = match chars {
            Some(chars) => chars,
            None => self.config.text("randomChars")?.unwrap_or_default(),
        };
        let chars: Vec<char> = chars.chars().collect();
        if chars.is_empty() {
            return Err(CodecError::InvalidArgument(
                "random characters must not be empty".to_string(),
            ));
        }

        let mut rng = rand::thread_rng();
        Ok((0..length)
            .map(|_| chars[rng.gen_range(0..chars.len())])
            .collect())
    }
}

impl Default for StretchedHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StretchedHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StretchedHasher")
            .field("config", &self.config)
            .field("digests", &self.digests)
            .finish()
    }
}

impl fmt::Display for StretchedHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = serde_json::json!({
            "class": "StretchedHasher",
            "config": &self.config,
        });
        match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => f.write_str(&text),
            Err(_) => Err(fmt::Error),
        }
    }
}
