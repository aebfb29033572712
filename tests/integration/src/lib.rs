//! Integration tests for the Custos codecs.
//!
//! These tests exercise the public codec API end to end, across crates.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::sync::Once;

use anyhow::{Context, Result};
use custos_codec::{OptionValue, ReversibleCodec, StretchedHasher};
use custos_crypto::{CipherProvider, NativeCipherProvider};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;

// ============================================================================
// Harness
// ============================================================================

static TRACING: Once = Once::new();

/// Installs a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// A codec with freshly generated key material.
pub struct Fixture {
    pub codec: ReversibleCodec,
    pub key: Zeroizing<Vec<u8>>,
    pub iv: Zeroizing<Vec<u8>>,
}

impl Fixture {
    /// Builds a codec for `algorithm`/`mode`/`padding` with no salt.
    pub fn new(algorithm: &str, mode: &str, padding: &str) -> Result<Self> {
        Self::with_salt(algorithm, mode, padding, 0)
    }

    /// Builds a codec with a `salt_length`-byte salt prefix.
    pub fn with_salt(algorithm: &str, mode: &str, padding: &str, salt_length: u64) -> Result<Self> {
        let mut codec = ReversibleCodec::with_options([
            ("algorithm", OptionValue::from(algorithm)),
            ("mode", OptionValue::from(mode)),
            ("padding", OptionValue::from(padding)),
            ("saltLength", OptionValue::from(salt_length)),
        ])
        .with_context(|| format!("configuring {}/{}/{}", algorithm, mode, padding))?;
        let key = codec.create_key()?;
        let iv = codec.create_iv()?;
        Ok(Self { codec, key, iv })
    }

    pub fn encrypt(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(self.codec.encrypt(data, Some(self.key.as_slice()), Some(self.iv.as_slice()))?)
    }

    pub fn decrypt(&mut self, payload: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        Ok(self.codec.decrypt(payload, Some(self.key.as_slice()), Some(self.iv.as_slice()))?)
    }
}

/// Every algorithm/mode pair offered by the native provider.
pub fn all_suites() -> Vec<(String, String)> {
    let provider = NativeCipherProvider;
    let mut suites = Vec::new();
    for algorithm in provider.algorithms() {
        for mode in provider.modes() {
            suites.push((algorithm.clone(), mode));
        }
    }
    suites
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use custos_codec::CodecError;

    // 32 bytes: a whole number of blocks for every supported cipher.
    const ALIGNED: &[u8] = b"0123456789abcdef0123456789abcdef";
    const TEXT: &[u8] = b"Lorem ipsum dolor sit amet, consectetur adipisicing elit";

    #[test]
    fn test_round_trip_every_suite_and_padding() -> Result<()> {
        init_tracing();

        for (algorithm, mode) in all_suites() {
            for padding in ["pkcs7", "null"] {
                let mut fixture = Fixture::new(&algorithm, &mode, padding)?;
                let encrypted = fixture.encrypt(TEXT)?;
                assert_eq!(
                    fixture.decrypt(&encrypted)?.as_slice(),
                    TEXT,
                    "{}/{}/{}",
                    algorithm,
                    mode,
                    padding
                );
            }

            let mut fixture = Fixture::new(&algorithm, &mode, "none")?;
            let encrypted = fixture.encrypt(ALIGNED)?;
            assert_eq!(fixture.decrypt(&encrypted)?.as_slice(), ALIGNED);
        }
        Ok(())
    }

    #[test]
    fn test_no_padding_rejects_unaligned_input() -> Result<()> {
        init_tracing();

        let mut fixture = Fixture::new("rijndael-128", "cbc", "none")?;
        let err = fixture.codec.encrypt(TEXT, Some(fixture.key.as_slice()), Some(fixture.iv.as_slice()));
        assert!(matches!(err, Err(CodecError::InvalidArgument(_))));
        Ok(())
    }

    #[test]
    fn test_same_settings_give_same_ciphertext() -> Result<()> {
        init_tracing();

        let mut first = Fixture::new("blowfish", "cbc", "pkcs7")?;
        let mut second = ReversibleCodec::with_options([
            ("algorithm", "blowfish"),
            ("mode", "cbc"),
            ("padding", "pkcs7"),
        ])?;

        let expected = first.encrypt(TEXT)?;
        let actual = second.encrypt(TEXT, Some(first.key.as_slice()), Some(first.iv.as_slice()))?;
        assert_eq!(expected, actual);
        Ok(())
    }

    #[test]
    fn test_key_iv_and_mode_change_ciphertext() -> Result<()> {
        init_tracing();

        let mut fixture = Fixture::new("rijndael-128", "cbc", "pkcs7")?;
        let baseline = fixture.encrypt(TEXT)?;

        let other_key = fixture.codec.create_key()?;
        let with_other_key = fixture.codec.encrypt(TEXT, Some(other_key.as_slice()), Some(fixture.iv.as_slice()))?;
        assert_ne!(baseline, with_other_key);

        let other_iv = fixture.codec.create_iv()?;
        let with_other_iv = fixture.codec.encrypt(TEXT, Some(fixture.key.as_slice()), Some(other_iv.as_slice()))?;
        assert_ne!(baseline, with_other_iv);

        fixture.codec.set("mode", "ncfb")?;
        let with_other_mode = fixture.encrypt(TEXT)?;
        assert_ne!(baseline, with_other_mode);
        Ok(())
    }

    #[test]
    fn test_salted_payloads_differ_but_decrypt() -> Result<()> {
        init_tracing();

        let mut fixture = Fixture::with_salt("rijndael-128", "cbc", "pkcs7", 16)?;
        let first = fixture.encrypt(TEXT)?;
        let second = fixture.encrypt(TEXT)?;

        assert_eq!(fixture.decrypt(&first)?.as_slice(), TEXT);
        assert_eq!(fixture.decrypt(&second)?.as_slice(), TEXT);
        Ok(())
    }

    #[test]
    fn test_key_and_iv_from_options() -> Result<()> {
        init_tracing();

        let mut fixture = Fixture::new("tripledes", "cbc", "pkcs7")?;
        let expected = fixture.encrypt(TEXT)?;

        let mut codec = ReversibleCodec::from_json(&serde_json::json!({
            "algorithm": "tripledes",
            "mode": "cbc",
            "padding": "pkcs7",
        }))?;
        codec.set("key", fixture.key.to_vec())?;
        codec.set("iv", fixture.iv.to_vec())?;

        assert_eq!(codec.encrypt(TEXT, None, None)?, expected);
        assert_eq!(codec.decrypt(&expected, None, None)?.as_slice(), TEXT);
        Ok(())
    }

    #[test]
    fn test_codec_shared_across_threads() -> Result<()> {
        init_tracing();

        let fixture = Fixture::new("blowfish", "cbc", "pkcs7")?;
        let key = fixture.key.clone();
        let iv = fixture.iv.clone();
        let codec = Arc::new(Mutex::new(fixture.codec));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let codec = Arc::clone(&codec);
                let key = key.clone();
                let iv = iv.clone();
                thread::spawn(move || {
                    let message = format!("message {}", i);
                    let mut codec = codec.lock().unwrap();
                    let encrypted = codec.encrypt(message.as_bytes(), Some(key.as_slice()), Some(iv.as_slice())).unwrap();
                    let decrypted = codec.decrypt(&encrypted, Some(key.as_slice()), Some(iv.as_slice())).unwrap();
                    assert_eq!(decrypted.as_slice(), message.as_bytes());
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        Ok(())
    }

    #[test]
    fn test_hash_properties() -> Result<()> {
        init_tracing();

        let build = |algorithm: &str, count: u64| {
            StretchedHasher::with_options([
                ("algorithm", OptionValue::from(algorithm)),
                ("stretchingCount", OptionValue::from(count)),
            ])
        };

        let reference = build("sha256", 100)?.hash("develop", Some("test"))?;
        assert_eq!(reference, build("sha256", 100)?.hash("develop", Some("test"))?);
        assert_ne!(reference, build("sha256", 100)?.hash("other", Some("test"))?);
        assert_ne!(reference, build("sha256", 100)?.hash("develop", Some("other"))?);
        assert_ne!(reference, build("sha384", 100)?.hash("develop", Some("test"))?);
        assert_ne!(reference, build("sha256", 10)?.hash("develop", Some("test"))?);
        Ok(())
    }

    #[test]
    fn test_random_strings() -> Result<()> {
        init_tracing();

        let hasher = StretchedHasher::new();
        let random = hasher.create_random(Some(500), Some("ABC"))?;
        assert_eq!(random.len(), 500);
        assert!(random.chars().all(|c| "ABC".contains(c)));

        assert!(matches!(
            hasher.create_random(Some(0), Some("ABC")),
            Err(CodecError::InvalidArgument(_))
        ));
        assert!(matches!(
            hasher.create_random(Some(10), Some("")),
            Err(CodecError::InvalidArgument(_))
        ));
        Ok(())
    }

    #[test]
    fn test_corrupt_pkcs7_padding_detected() -> Result<()> {
        init_tracing();

        // Encrypt an aligned block without padding whose last byte is 0x00,
        // then decrypt it expecting pkcs7.
        let mut fixture = Fixture::new("rijndael-128", "cbc", "none")?;
        let mut block = [0x41u8; 16];
        block[15] = 0;
        let encrypted = fixture.encrypt(&block)?;

        fixture.codec.set("padding", "pkcs7")?;
        assert!(matches!(
            fixture.codec.decrypt(&encrypted, Some(fixture.key.as_slice()), Some(fixture.iv.as_slice())),
            Err(CodecError::CorruptPadding(_))
        ));
        Ok(())
    }

    #[test]
    fn test_configuration_errors() -> Result<()> {
        init_tracing();

        let mut codec = ReversibleCodec::new();
        assert!(matches!(codec.set("unknown", 1), Err(CodecError::UnknownOption(_))));
        assert!(matches!(
            codec.set("algorithm", "rot13"),
            Err(CodecError::UnsupportedAlgorithm(_))
        ));

        assert!(matches!(
            StretchedHasher::with_options([
                ("algorithm", OptionValue::from("md4")),
                ("stretchingCount", OptionValue::Integer(1)),
            ]),
            Err(CodecError::UnsupportedAlgorithm(_))
        ));

        assert!(matches!(
            codec.set("saltLength", u64::MAX),
            Err(CodecError::InvalidArgument(_))
        ));
        assert!(matches!(
            StretchedHasher::new().set("stretchingCount", u64::MAX),
            Err(CodecError::InvalidArgument(_))
        ));
        Ok(())
    }
}
