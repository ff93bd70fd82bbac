//! Secret storage
//!
//! Provides a unified interface to platform secure storage:
//! - Android: Keystore-backed encrypted preferences (StrongBox when present)
//! - iOS/macOS: Keychain
//! - Web: none, secrets fall back to the plain store
//!
//! Native implementations live in the host app and are injected through
//! [`SecretStore`]. [`SecretBackend::select`] picks the secure path when the
//! platform offers one and the plain fallback otherwise.

use crate::kv::{Faults, Op};
use crate::{FaultPlan, KeyValueStore, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Supported platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Android
    Android,
    /// iOS
    Ios,
    /// macOS
    MacOs,
    /// Windows
    Windows,
    /// Linux
    Linux,
    /// Browser (wasm)
    Web,
    /// Unknown platform
    Unknown,
}

impl Platform {
    /// Detect current platform at compile time
    pub fn current() -> Self {
        #[cfg(target_os = "android")]
        return Platform::Android;

        #[cfg(target_os = "ios")]
        return Platform::Ios;

        #[cfg(target_os = "macos")]
        return Platform::MacOs;

        #[cfg(target_os = "windows")]
        return Platform::Windows;

        #[cfg(target_os = "linux")]
        return Platform::Linux;

        #[cfg(target_arch = "wasm32")]
        return Platform::Web;

        #[cfg(not(any(
            target_os = "android",
            target_os = "ios",
            target_os = "macos",
            target_os = "windows",
            target_os = "linux",
            target_arch = "wasm32"
        )))]
        return Platform::Unknown;
    }

    /// Whether the platform ships an OS-level secret store
    pub fn has_native_secure_storage(&self) -> bool {
        matches!(self, Self::Android | Self::Ios | Self::MacOs)
    }
}

/// What a secret store can guarantee
#[derive(Debug, Clone)]
pub struct SecureStorageCapabilities {
    /// Secrets are protected at rest by the OS
    pub available: bool,
    /// Protection is hardware-backed (TEE, StrongBox, Secure Enclave)
    pub hardware_backed: bool,
    /// Platform the store runs on
    pub platform: Platform,
}

impl Default for SecureStorageCapabilities {
    fn default() -> Self {
        Self {
            available: false,
            hardware_backed: false,
            platform: Platform::Unknown,
        }
    }
}

/// Secret store abstraction
///
/// Host apps bridge this to the native keystore. Secrets are returned in
/// [`Zeroizing`] buffers so they are wiped once the caller drops them.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Store capabilities
    fn capabilities(&self) -> SecureStorageCapabilities;

    /// Whether secrets written here are protected at rest
    fn is_secure(&self) -> bool {
        self.capabilities().available
    }

    /// Read a secret, `None` when absent
    async fn get_secret(&self, key: &str) -> Result<Option<Zeroizing<String>>>;

    /// Write a secret, replacing any previous one
    async fn set_secret(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a secret. Deleting an absent secret is not an error.
    async fn delete_secret(&self, key: &str) -> Result<()>;
}

/// Best-effort secret store over a plain key-value store
///
/// This is the web path: values are not protected at rest.
pub struct PlainSecretStore {
    inner: Arc<dyn KeyValueStore>,
}

impl PlainSecretStore {
    /// Wrap a plain store
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl SecretStore for PlainSecretStore {
    fn capabilities(&self) -> SecureStorageCapabilities {
        SecureStorageCapabilities {
            available: false,
            hardware_backed: false,
            platform: Platform::current(),
        }
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Zeroizing<String>>> {
        Ok(self.inner.get(key).await?.map(Zeroizing::new))
    }

    async fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value).await
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }
}

/// Secret backend selection
pub struct SecretBackend;

impl SecretBackend {
    /// Choose the secret store for this device.
    ///
    /// Returns `secure` when one was supplied and reports itself available,
    /// otherwise a [`PlainSecretStore`] over `plain`.
    pub fn select(
        secure: Option<Arc<dyn SecretStore>>,
        plain: Arc<dyn KeyValueStore>,
    ) -> Arc<dyn SecretStore> {
        match secure {
            Some(store) if store.is_secure() => {
                let caps = store.capabilities();
                info!(
                    "Using secure secret storage ({:?}, hardware-backed: {})",
                    caps.platform, caps.hardware_backed
                );
                store
            }
            Some(store) => {
                let platform = store.capabilities().platform;
                if platform.has_native_secure_storage() {
                    warn!(
                        "Keystore on {:?} reported unavailable; secrets fall back to plain storage",
                        platform
                    );
                } else {
                    warn!(
                        "No secure storage on {:?}; secrets fall back to plain storage",
                        platform
                    );
                }
                Arc::new(PlainSecretStore::new(plain))
            }
            None => {
                warn!("No secure storage configured; secrets fall back to plain storage");
                Arc::new(PlainSecretStore::new(plain))
            }
        }
    }
}

/// Mock secure store for testing and hosts without native integration
pub struct MockSecureStore {
    capabilities: SecureStorageCapabilities,
    entries: RwLock<HashMap<String, Zeroizing<String>>>,
    faults: Faults,
}

impl MockSecureStore {
    /// Available, software-backed secure store on the current platform
    pub fn new() -> Self {
        Self::with_capabilities(SecureStorageCapabilities {
            available: true,
            hardware_backed: false,
            platform: Platform::current(),
        })
    }

    /// Store that reports secure storage as unavailable
    pub fn unavailable() -> Self {
        Self::with_capabilities(SecureStorageCapabilities {
            available: false,
            hardware_backed: false,
            platform: Platform::Web,
        })
    }

    /// Create with custom capabilities
    pub fn with_capabilities(capabilities: SecureStorageCapabilities) -> Self {
        Self {
            capabilities,
            entries: RwLock::new(HashMap::new()),
            faults: Faults::default(),
        }
    }

    /// Replace the fault plan
    pub fn set_faults(&self, plan: FaultPlan) {
        self.faults.set_plan(plan);
    }

    /// Fail every operation touching `key`
    pub fn fail_key(&self, key: &str) {
        self.faults.fail_key(key);
    }

    /// Stop injecting failures
    pub fn clear_faults(&self) {
        self.faults.clear();
    }

    /// Delay every operation by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.faults.set_latency(latency);
    }

    /// Read a secret directly, bypassing faults and latency
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).map(|v| v.to_string())
    }

    /// Write a secret directly, bypassing faults and latency
    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .write()
            .insert(key.to_string(), Zeroizing::new(value.to_string()));
    }
}

impl Default for MockSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for MockSecureStore {
    fn capabilities(&self) -> SecureStorageCapabilities {
        self.capabilities.clone()
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Zeroizing<String>>> {
        self.faults.check(Op::Read, key).await?;
        Ok(self
            .entries
            .read()
            .get(key)
            .map(|v| Zeroizing::new(v.to_string())))
    }

    async fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        self.faults.check(Op::Write, key).await?;
        self.insert(key, value);
        Ok(())
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.faults.check(Op::Remove, key).await?;
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn test_platform_detection() {
        let platform = Platform::current();
        assert!(matches!(
            platform,
            Platform::Android
                | Platform::Ios
                | Platform::MacOs
                | Platform::Windows
                | Platform::Linux
                | Platform::Web
                | Platform::Unknown
        ));
        assert!(!Platform::Web.has_native_secure_storage());
        assert!(Platform::Android.has_native_secure_storage());
    }

    #[tokio::test]
    async fn test_mock_secure_store() {
        let store = MockSecureStore::new();
        assert!(store.is_secure());

        store.set_secret("k", "secret").await.unwrap();
        let secret = store.get_secret("k").await.unwrap();
        assert_eq!(secret.as_deref().map(String::as_str), Some("secret"));

        store.delete_secret("k").await.unwrap();
        assert!(store.get_secret("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_select_prefers_secure_store() {
        let plain = Arc::new(MemoryStore::new());
        let secure = Arc::new(MockSecureStore::new());

        let backend = SecretBackend::select(Some(secure.clone()), plain.clone());
        backend.set_secret("k", "v").await.unwrap();

        assert!(backend.is_secure());
        assert_eq!(secure.peek("k").as_deref(), Some("v"));
        assert!(plain.is_empty());
    }

    #[tokio::test]
    async fn test_select_falls_back_to_plain_store() {
        let plain = Arc::new(MemoryStore::new());
        let secure = Arc::new(MockSecureStore::unavailable());

        let backend = SecretBackend::select(Some(secure.clone()), plain.clone());
        backend.set_secret("k", "v").await.unwrap();

        assert!(!backend.is_secure());
        assert_eq!(plain.peek("k").as_deref(), Some("v"));
        assert!(secure.peek("k").is_none());

        let backend = SecretBackend::select(None, plain.clone());
        backend.delete_secret("k").await.unwrap();
        assert!(plain.is_empty());
    }

    #[tokio::test]
    async fn test_select_falls_back_when_native_keystore_unavailable() {
        let plain = Arc::new(MemoryStore::new());
        let secure = Arc::new(MockSecureStore::with_capabilities(SecureStorageCapabilities {
            available: false,
            hardware_backed: true,
            platform: Platform::Ios,
        }));
        assert!(secure.capabilities().platform.has_native_secure_storage());

        let backend = SecretBackend::select(Some(secure.clone()), plain.clone());
        assert!(!backend.is_secure());
        backend.set_secret("k", "v").await.unwrap();
        assert_eq!(plain.peek("k").as_deref(), Some("v"));
        assert!(secure.peek("k").is_none());
    }
}
