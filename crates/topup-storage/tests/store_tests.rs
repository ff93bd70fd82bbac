//! Storage backend tests
//!
//! Every backend is driven through the trait objects the app holds, so
//! these check behaviour callers actually see.

use std::sync::Arc;
use tempfile::TempDir;
use topup_storage::{
    FaultPlan, FileStore, KeyValueStore, MemoryStore, MockSecureStore, Platform, SecretBackend,
    SecretStore, SecureStorageCapabilities,
};

async fn exercise(store: &dyn KeyValueStore) {
    assert_eq!(store.get("pin_enabled").await.unwrap(), None);

    store.set("pin_enabled", "true").await.unwrap();
    store.set("theme", "dark").await.unwrap();
    assert_eq!(store.get("pin_enabled").await.unwrap().as_deref(), Some("true"));

    store.set("pin_enabled", "false").await.unwrap();
    assert_eq!(store.get("pin_enabled").await.unwrap().as_deref(), Some("false"));

    store.remove("pin_enabled").await.unwrap();
    store.remove("pin_enabled").await.unwrap();
    assert_eq!(store.get("pin_enabled").await.unwrap(), None);
    assert_eq!(store.get("theme").await.unwrap().as_deref(), Some("dark"));
}

#[tokio::test]
async fn test_memory_store_contract() {
    exercise(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_file_store_contract() {
    let dir = TempDir::new().unwrap();
    exercise(&FileStore::in_dir(dir.path())).await;
}

#[tokio::test]
async fn test_file_store_backs_plain_secret_fallback() {
    let dir = TempDir::new().unwrap();
    let plain: Arc<dyn KeyValueStore> = Arc::new(FileStore::in_dir(dir.path()));

    let secrets = SecretBackend::select(None, plain.clone());
    assert!(!secrets.is_secure());

    secrets.set_secret("transaction_pin", "1234").await.unwrap();
    assert_eq!(plain.get("transaction_pin").await.unwrap().as_deref(), Some("1234"));

    let reopened = SecretBackend::select(None, Arc::new(FileStore::in_dir(dir.path())));
    let secret = reopened.get_secret("transaction_pin").await.unwrap().unwrap();
    assert_eq!(secret.as_str(), "1234");

    reopened.delete_secret("transaction_pin").await.unwrap();
    assert!(plain.get("transaction_pin").await.unwrap().is_none());
}

#[tokio::test]
async fn test_hardware_backed_store_selected() {
    let secure = Arc::new(MockSecureStore::with_capabilities(SecureStorageCapabilities {
        available: true,
        hardware_backed: true,
        platform: Platform::Android,
    }));
    let plain = Arc::new(MemoryStore::new());

    let backend = SecretBackend::select(Some(secure.clone()), plain.clone());
    let caps = backend.capabilities();
    assert!(caps.hardware_backed);
    assert_eq!(caps.platform, Platform::Android);

    backend.set_secret("transaction_pin", "1234").await.unwrap();
    assert_eq!(secure.peek("transaction_pin").as_deref(), Some("1234"));
    assert!(plain.peek("transaction_pin").is_none());
}

#[tokio::test]
async fn test_secure_store_faults() {
    let secure = MockSecureStore::new();
    secure.insert("transaction_pin", "1234");

    secure.set_faults(FaultPlan {
        fail_reads: true,
        ..Default::default()
    });
    assert!(secure.get_secret("transaction_pin").await.is_err());
    assert!(secure.set_secret("transaction_pin", "5678").await.is_ok());

    secure.clear_faults();
    secure.fail_key("transaction_pin");
    assert!(secure.delete_secret("transaction_pin").await.is_err());
    assert_eq!(secure.peek("transaction_pin").as_deref(), Some("5678"));
}
