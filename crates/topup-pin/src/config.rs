//! Transaction PIN gate configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Plain-store key holding the enabled flag
pub const ENABLED_KEY: &str = "transaction_pin_enabled";

/// Secret-store key holding the PIN
pub const PIN_KEY: &str = "transaction_pin";

/// Digits in a transaction PIN
pub const DEFAULT_PIN_LENGTH: usize = 4;

/// Shortest PIN length the gate accepts in configuration
pub const MIN_PIN_LENGTH: usize = 4;

/// Longest PIN length the gate accepts in configuration
pub const MAX_PIN_LENGTH: usize = 8;

/// How the PIN is written to the secret store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretEncoding {
    /// Argon2id PHC string
    #[default]
    Argon2id,
    /// Raw digits, as older app builds stored them
    Plaintext,
}

/// Argon2id cost parameters
///
/// Defaults match the wallet panic PIN: 16 MiB, 2 iterations, 2 lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Iterations
    pub iterations: u32,
    /// Parallel lanes
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: 16384,
            iterations: 2,
            parallelism: 2,
        }
    }
}

impl HashParams {
    /// Cheapest parameters argon2 accepts. Tests only.
    pub fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    /// Build argon2 params
    pub fn to_argon2(&self) -> Result<argon2::Params> {
        argon2::Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| Error::Config(format!("invalid Argon2 parameters: {}", e)))
    }
}

/// Transaction PIN gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinGateConfig {
    /// Plain-store key for the enabled flag
    pub enabled_key: String,
    /// Secret-store key for the PIN
    pub pin_key: String,
    /// Required number of digits
    pub pin_length: usize,
    /// Secret encoding for new writes
    pub encoding: SecretEncoding,
    /// Argon2id cost
    pub hash: HashParams,
    /// Repair inconsistent flag/secret pairs during `initialize`
    pub reconcile_on_init: bool,
}

impl Default for PinGateConfig {
    fn default() -> Self {
        Self {
            enabled_key: ENABLED_KEY.to_string(),
            pin_key: PIN_KEY.to_string(),
            pin_length: DEFAULT_PIN_LENGTH,
            encoding: SecretEncoding::Argon2id,
            hash: HashParams::default(),
            reconcile_on_init: true,
        }
    }
}

impl PinGateConfig {
    /// Same config with a different secret encoding
    pub fn with_encoding(mut self, encoding: SecretEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Same config with different hash parameters
    pub fn with_hash_params(mut self, hash: HashParams) -> Self {
        self.hash = hash;
        self
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.enabled_key.trim().is_empty() || self.pin_key.trim().is_empty() {
            return Err(Error::Config("storage keys must not be empty".to_string()));
        }

        if self.enabled_key == self.pin_key {
            return Err(Error::Config(
                "enabled flag and PIN must use different keys".to_string(),
            ));
        }

        if !(MIN_PIN_LENGTH..=MAX_PIN_LENGTH).contains(&self.pin_length) {
            return Err(Error::Config(format!(
                "PIN length must be {}-{} digits",
                MIN_PIN_LENGTH, MAX_PIN_LENGTH
            )));
        }

        self.hash.to_argon2()?;
        Ok(())
    }

    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}
