//! On-device storage capabilities for the Topup app
//!
//! Two logical stores back the client-side state containers:
//!
//! - **Plain store** ([`KeyValueStore`]): preferences and feature flags.
//! - **Secret store** ([`SecretStore`]): PINs and tokens, hardware-backed on
//!   capable platforms with a best-effort plain fallback elsewhere.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod file;
pub mod kv;
pub mod secure;

pub use error::{Error, Result};
pub use file::{FileStore, DEFAULT_FILE_NAME};
pub use kv::{FaultPlan, KeyValueStore, MemoryStore};
pub use secure::{
    MockSecureStore, PlainSecretStore, Platform, SecretBackend, SecretStore,
    SecureStorageCapabilities,
};
