//! Plain key-value storage
//!
//! Non-secret settings (feature flags, preferences) live behind
//! [`KeyValueStore`]. On mobile this is the app preferences store, on the web
//! it is local storage. Values are strings; callers own their encoding.

use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use zeroize::Zeroizing;

/// Plain (unencrypted) key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Operations a test store should refuse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Fail every `get`
    pub fail_reads: bool,
    /// Fail every `set`
    pub fail_writes: bool,
    /// Fail every `remove`
    pub fail_removes: bool,
}

impl FaultPlan {
    /// Fail everything
    pub fn all() -> Self {
        Self {
            fail_reads: true,
            fail_writes: true,
            fail_removes: true,
        }
    }
}

/// Fault-injection and latency controls shared by the in-memory stores
#[derive(Debug, Default)]
pub(crate) struct Faults {
    plan: RwLock<FaultPlan>,
    keys: RwLock<HashSet<String>>,
    latency: RwLock<Option<Duration>>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Op {
    Read,
    Write,
    Remove,
}

impl Faults {
    pub(crate) fn set_plan(&self, plan: FaultPlan) {
        *self.plan.write() = plan;
    }

    pub(crate) fn fail_key(&self, key: &str) {
        self.keys.write().insert(key.to_string());
    }

    pub(crate) fn clear(&self) {
        *self.plan.write() = FaultPlan::default();
        self.keys.write().clear();
    }

    pub(crate) fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Sleep for the configured latency, then decide whether `op` fails.
    pub(crate) async fn check(&self, op: Op, key: &str) -> Result<()> {
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let plan = *self.plan.read();
        let refused = match op {
            Op::Read => plan.fail_reads,
            Op::Write => plan.fail_writes,
            Op::Remove => plan.fail_removes,
        } || self.keys.read().contains(key);

        if refused {
            return Err(Error::Storage(format!("injected {:?} failure for '{}'", op, key)));
        }
        Ok(())
    }
}

/// In-memory key-value store
///
/// Used by tests and by hosts that keep settings for the session only.
/// Supports fault injection so callers can exercise their failure paths.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Zeroizing<String>>>,
    faults: Faults,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("keys", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        {
            let mut map = store.entries.write();
            for (k, v) in entries {
                map.insert(k.into(), Zeroizing::new(v.into()));
            }
        }
        store
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

    /// Read a value directly, bypassing faults and latency
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).map(|v| v.to_string())
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.faults.check(Op::Read, key).await?;
        Ok(self.entries.read().get(key).map(|v| v.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.faults.check(Op::Write, key).await?;
        self.entries
            .write()
            .insert(key.to_string(), Zeroizing::new(value.to_string()));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.faults.check(Op::Remove, key).await?;
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("theme").await.unwrap(), None);

        store.set("theme", "dark").await.unwrap();
        assert_eq!(store.get("theme").await.unwrap().as_deref(), Some("dark"));

        store.set("theme", "light").await.unwrap();
        assert_eq!(store.peek("theme").as_deref(), Some("light"));

        store.remove("theme").await.unwrap();
        assert!(store.is_empty());

        // Removing twice is fine
        store.remove("theme").await.unwrap();
    }

    #[tokio::test]
    async fn test_fault_plan() {
        let store = MemoryStore::with_entries([("a", "1")]);

        store.set_faults(FaultPlan {
            fail_writes: true,
            ..Default::default()
        });
        assert!(store.set("a", "2").await.is_err());
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert!(store.remove("a").await.is_ok());

        store.set_faults(FaultPlan::all());
        assert!(store.get("a").await.is_err());

        store.clear_faults();
        assert!(store.set("a", "3").await.is_ok());
    }

    #[tokio::test]
    async fn test_key_fault() {
        let store = MemoryStore::new();
        store.fail_key("locked");

        assert!(store.set("locked", "x").await.is_err());
        assert!(store.set("open", "x").await.is_ok());
        assert_eq!(store.len(), 1);
    }
}
