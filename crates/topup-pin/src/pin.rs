//! PIN format rules and secret encoding
//!
//! New PINs are hashed with Argon2id (lighter parameters than an account
//! passphrase, see [`HashParams`]). Verification understands both Argon2id
//! PHC strings and the raw digits older builds wrote, so switching encodings
//! never locks a user out.

use crate::config::{HashParams, PinGateConfig, SecretEncoding};
use crate::{Error, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Version,
};
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// PHC prefix written by Argon2id
const ARGON2_PREFIX: &str = "$argon2";

/// Trim `pin` and check it is exactly `length` ASCII digits.
///
/// Returns the trimmed slice on success.
pub fn normalize(pin: &str, length: usize) -> Result<&str> {
    let pin = pin.trim();

    if pin.is_empty() {
        return Err(Error::FormatRejected("PIN is empty".to_string()));
    }

    if pin.len() != length {
        return Err(Error::FormatRejected(format!("PIN must be {} digits", length)));
    }

    if !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::FormatRejected("PIN must contain only digits".to_string()));
    }

    Ok(pin)
}

/// Whether a stored secret is an Argon2 hash rather than raw digits
pub fn is_hashed(stored: &str) -> bool {
    stored.starts_with(ARGON2_PREFIX)
}

/// Encodes PINs for storage and checks candidates against stored values
#[derive(Debug, Clone)]
pub struct PinHasher {
    encoding: SecretEncoding,
    params: argon2::Params,
}

impl PinHasher {
    /// Build from gate configuration
    pub fn new(config: &PinGateConfig) -> Result<Self> {
        Self::with_params(config.encoding, config.hash)
    }

    /// Build from explicit encoding and cost
    pub fn with_params(encoding: SecretEncoding, hash: HashParams) -> Result<Self> {
        Ok(Self {
            encoding,
            params: hash.to_argon2()?,
        })
    }

    /// Produce the value to write to the secret store
    pub fn encode(&self, pin: &str) -> Result<Zeroizing<String>> {
        match self.encoding {
            SecretEncoding::Plaintext => Ok(Zeroizing::new(pin.to_string())),
            SecretEncoding::Argon2id => {
                let salt = SaltString::generate(&mut OsRng);
                let argon2 = Argon2::new(
                    argon2::Algorithm::Argon2id,
                    Version::V0x13,
                    self.params.clone(),
                );

                let hash = argon2
                    .hash_password(pin.as_bytes(), &salt)
                    .map_err(|e| Error::Hash(e.to_string()))?
                    .to_string();

                Ok(Zeroizing::new(hash))
            }
        }
    }

    /// Check `pin` against a stored value of either encoding.
    ///
    /// Returns `Ok(false)` on a mismatch and `Err` only when the stored hash
    /// cannot be parsed.
    pub fn matches(stored: &str, pin: &str) -> Result<bool> {
        if !is_hashed(stored) {
            return Ok(stored.as_bytes().ct_eq(pin.as_bytes()).into());
        }

        let parsed = PasswordHash::new(stored).map_err(|e| Error::Hash(e.to_string()))?;

        // Cost and salt come from the PHC string
        match Argon2::default().verify_password(pin.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Hash(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap(encoding: SecretEncoding) -> PinHasher {
        PinHasher::with_params(encoding, HashParams::minimal()).unwrap()
    }

    #[test]
    fn test_normalize_accepts_four_digits() {
        assert_eq!(normalize("1234", 4).unwrap(), "1234");
        assert_eq!(normalize("  0007\n", 4).unwrap(), "0007");
    }

    #[test]
    fn test_normalize_rejections() {
        for pin in ["", "  ", "12", "12345", "12a4", "12 4", "１２３４", "-123"] {
            assert!(
                matches!(normalize(pin, 4), Err(Error::FormatRejected(_))),
                "{:?} should be rejected",
                pin
            );
        }
    }

    #[test]
    fn test_normalize_respects_length() {
        assert!(normalize("123456", 6).is_ok());
        assert!(normalize("1234", 6).is_err());
    }

    #[test]
    fn test_argon2_encoding() {
        let hasher = cheap(SecretEncoding::Argon2id);
        let stored = hasher.encode("1234").unwrap();

        assert!(is_hashed(&stored));
        assert!(stored.starts_with("$argon2id$"));
        assert!(!stored.contains("1234"));
        assert!(PinHasher::matches(&stored, "1234").unwrap());
        assert!(!PinHasher::matches(&stored, "4321").unwrap());
    }

    #[test]
    fn test_argon2_salts_differ() {
        let hasher = cheap(SecretEncoding::Argon2id);
        let a = hasher.encode("1234").unwrap();
        let b = hasher.encode("1234").unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_plaintext_encoding() {
        let hasher = cheap(SecretEncoding::Plaintext);
        let stored = hasher.encode("1234").unwrap();

        assert_eq!(stored.as_str(), "1234");
        assert!(PinHasher::matches(&stored, "1234").unwrap());
        assert!(!PinHasher::matches(&stored, "123").unwrap());
        assert!(!PinHasher::matches(&stored, "4321").unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(matches!(
            PinHasher::matches("$argon2id$v=abc$m=16,t=2,p=1$c29tZXNhbHQ$aGFzaA", "1234"),
            Err(Error::Hash(_))
        ));
    }
}
