//! Transaction PIN gate for the Topup app
//!
//! Guards sensitive in-app actions (airtime top-up, wallet transfers) behind a
//! locally verified PIN that is independent of any backend account PIN.
//!
//! ## Security Features
//!
//! - **PIN hashing**: Argon2id (16 MiB, 2 iterations, 2 lanes) by default
//! - **Secure storage**: platform secret store when available, plain fallback otherwise
//! - **Crash safety**: interrupted enables are detected and discarded at startup
//! - **Serialized operations**: enable, disable, verify and change never interleave

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod gate;
pub mod pin;
pub mod state;

pub use config::{
    HashParams, PinGateConfig, SecretEncoding, DEFAULT_PIN_LENGTH, ENABLED_KEY, PIN_KEY,
};
pub use error::{Error, Result};
pub use gate::{PinStores, TransactionPinGate, VerifyOutcome};
pub use pin::{is_hashed, normalize, PinHasher};
pub use state::{
    GatePhase, Reconciliation, TransactionPinState, FLAG_DISABLED, FLAG_ENABLED, FLAG_PENDING,
};
