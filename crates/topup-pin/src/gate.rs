//! Transaction PIN gate
//!
//! Gates sensitive in-app actions (top-up, wallet transfer) behind a locally
//! verified PIN, independent of any backend account PIN.
//!
//! Storage layout:
//! - plain store, `transaction_pin_enabled`: `"true"`, `"false"` or `"pending"`
//! - secret store, `transaction_pin`: Argon2id PHC string (or raw digits)
//!
//! One operation runs at a time. `enable` brackets its secret write with a
//! `"pending"` flag so `initialize` can tell an interrupted enable from a
//! finished one.

use crate::config::PinGateConfig;
use crate::pin::{normalize, PinHasher};
use crate::state::{
    Reconciliation, StoredFlag, TransactionPinState, FLAG_DISABLED, FLAG_ENABLED, FLAG_PENDING,
};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use topup_storage::{KeyValueStore, SecretBackend, SecretStore};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

/// Stores backing the gate
#[derive(Clone)]
pub struct PinStores {
    /// Plain store for the enabled flag
    pub plain: Arc<dyn KeyValueStore>,
    /// Secret store for the PIN
    pub secret: Arc<dyn SecretStore>,
}

impl PinStores {
    /// Use `secure` for the PIN when available, otherwise fall back to `plain`
    pub fn new(plain: Arc<dyn KeyValueStore>, secure: Option<Arc<dyn SecretStore>>) -> Self {
        let secret = SecretBackend::select(secure, Arc::clone(&plain));
        Self { plain, secret }
    }

    /// Use exactly these stores
    pub fn from_parts(plain: Arc<dyn KeyValueStore>, secret: Arc<dyn SecretStore>) -> Self {
        Self { plain, secret }
    }
}

/// Result of checking a PIN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Candidate equals the stored PIN
    Match,
    /// Candidate differs from the stored PIN
    Mismatch,
    /// No PIN is stored
    NoPin,
}

impl VerifyOutcome {
    /// Whether the candidate was accepted
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Local transaction PIN gate
///
/// Construct once at app start and share by `Arc`. The boolean methods never
/// fail outward: errors are logged and reported as `false`. The `try_*`
/// methods return the underlying [`Error`] for callers that need to tell a
/// wrong PIN from unavailable storage.
pub struct TransactionPinGate {
    stores: PinStores,
    config: PinGateConfig,
    hasher: PinHasher,
    state: watch::Sender<TransactionPinState>,
    // Held for the whole of every storage-touching operation
    op_lock: Mutex<()>,
}

impl TransactionPinGate {
    /// Create a gate. Call [`initialize`](Self::initialize) before use.
    pub fn new(stores: PinStores, config: PinGateConfig) -> Result<Self> {
        config.validate()?;
        let hasher = PinHasher::new(&config)?;
        let (state, _) = watch::channel(TransactionPinState::default());

        Ok(Self {
            stores,
            config,
            hasher,
            state,
            op_lock: Mutex::new(()),
        })
    }

    /// Gate configuration
    pub fn config(&self) -> &PinGateConfig {
        &self.config
    }

    /// Current state snapshot
    pub fn state(&self) -> TransactionPinState {
        *self.state.borrow()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<TransactionPinState> {
        self.state.subscribe()
    }

    /// Whether sensitive actions must prompt for the PIN
    pub fn check_transaction_pin_required(&self) -> bool {
        self.state().pin_required()
    }

    // =========================================================================
    // Boolean surface
    // =========================================================================

    /// Load state from storage. Never fails; `is_loading` is always cleared.
    pub async fn initialize(&self) {
        match self.try_initialize().await {
            Ok(Reconciliation::Consistent) => {}
            Ok(outcome) => info!("Transaction PIN storage reconciled: {:?}", outcome),
            Err(e) => error!("Failed to load transaction PIN state: {}", e),
        }
    }

    /// Turn gating on with `pin`, replacing any stored PIN
    pub async fn enable(&self, pin: &str) -> bool {
        match self.try_enable(pin).await {
            Ok(()) => true,
            Err(Error::FormatRejected(reason)) => {
                debug!("Transaction PIN enable rejected: {}", reason);
                false
            }
            Err(e) => {
                error!("Failed to enable transaction PIN: {}", e);
                false
            }
        }
    }

    /// Turn gating off and delete the stored PIN
    pub async fn disable(&self) -> bool {
        match self.try_disable().await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to disable transaction PIN: {}", e);
                false
            }
        }
    }

    /// Check `pin` against the stored PIN
    pub async fn verify(&self, pin: &str) -> bool {
        match self.try_verify(pin).await {
            Ok(outcome) => outcome.is_match(),
            Err(Error::FormatRejected(reason)) => {
                debug!("Transaction PIN verify rejected: {}", reason);
                false
            }
            Err(e) => {
                error!("Failed to verify transaction PIN: {}", e);
                false
            }
        }
    }

    /// Replace the PIN after checking the current one
    pub async fn change_pin(&self, old_pin: &str, new_pin: &str) -> bool {
        match self.try_change_pin(old_pin, new_pin).await {
            Ok(changed) => changed,
            Err(Error::FormatRejected(reason)) => {
                debug!("Transaction PIN change rejected: {}", reason);
                false
            }
            Err(e) => {
                error!("Failed to change transaction PIN: {}", e);
                false
            }
        }
    }

    /// Gate a sensitive action.
    ///
    /// Allowed outright when no PIN is required; otherwise `pin` must verify.
    pub async fn authorize(&self, pin: Option<&str>) -> bool {
        if !self.check_transaction_pin_required() {
            return true;
        }

        match pin {
            Some(pin) => self.verify(pin).await,
            None => {
                debug!("Transaction PIN required but not supplied");
                false
            }
        }
    }

    // =========================================================================
    // Fallible surface
    // =========================================================================

    /// Load state from storage, reporting read and repair failures.
    ///
    /// `is_loading` is cleared whether or not this succeeds.
    pub async fn try_initialize(&self) -> Result<Reconciliation> {
        let _guard = self.op_lock.lock().await;
        let outcome = self.load_locked().await;
        self.state.send_modify(|s| s.is_loading = false);
        outcome
    }

    /// Turn gating on with `pin`
    pub async fn try_enable(&self, pin: &str) -> Result<()> {
        let pin = normalize(pin, self.config.pin_length)?;
        let _guard = self.op_lock.lock().await;
        self.enable_locked(pin).await
    }

    /// Turn gating off
    pub async fn try_disable(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        self.stores
            .secret
            .delete_secret(&self.config.pin_key)
            .await?;
        self.stores
            .plain
            .set(&self.config.enabled_key, FLAG_DISABLED)
            .await?;

        self.state.send_modify(|s| {
            s.is_enabled = false;
            s.has_pin = false;
        });
        info!("Transaction PIN disabled");
        Ok(())
    }

    /// Check `pin` against the stored PIN
    pub async fn try_verify(&self, pin: &str) -> Result<VerifyOutcome> {
        let pin = normalize(pin, self.config.pin_length)?;
        let _guard = self.op_lock.lock().await;
        self.verify_locked(pin).await
    }

    /// Replace the PIN after checking the current one.
    ///
    /// `Ok(false)` means the old PIN did not verify and nothing was written.
    /// The new PIN is only validated once the old one has been accepted.
    pub async fn try_change_pin(&self, old_pin: &str, new_pin: &str) -> Result<bool> {
        let old_pin = normalize(old_pin, self.config.pin_length)?;
        let _guard = self.op_lock.lock().await;

        let outcome = self.verify_locked(old_pin).await?;
        if !outcome.is_match() {
            debug!("Transaction PIN change refused: {:?}", outcome);
            return Ok(false);
        }

        let new_pin = normalize(new_pin, self.config.pin_length)?;
        self.enable_locked(new_pin).await?;
        info!("Transaction PIN changed");
        Ok(true)
    }

    // =========================================================================
    // Operations (op_lock held)
    // =========================================================================

    async fn load_locked(&self) -> Result<Reconciliation> {
        let (flag, secret) = tokio::join!(
            self.stores.plain.get(&self.config.enabled_key),
            self.stores.secret.get_secret(&self.config.pin_key),
        );
        let flag = StoredFlag::parse(flag?.as_deref());
        let has_secret = secret?.is_some();

        if !self.config.reconcile_on_init {
            self.publish(flag == StoredFlag::Enabled, has_secret);
            let consistent = matches!(
                (flag, has_secret),
                (StoredFlag::Enabled, true) | (StoredFlag::Disabled, false)
            );
            return Ok(if consistent {
                Reconciliation::Consistent
            } else {
                Reconciliation::Skipped
            });
        }

        match (flag, has_secret) {
            (StoredFlag::Enabled, true) => {
                self.publish(true, true);
                Ok(Reconciliation::Consistent)
            }
            (StoredFlag::Disabled, false) => {
                self.publish(false, false);
                Ok(Reconciliation::Consistent)
            }
            (StoredFlag::Enabled, false) => {
                warn!("Transaction PIN flag set without a stored PIN; disabling");
                self.publish(false, false);
                self.stores
                    .plain
                    .set(&self.config.enabled_key, FLAG_DISABLED)
                    .await?;
                Ok(Reconciliation::MissingSecret)
            }
            (StoredFlag::Pending, _) => {
                warn!("Interrupted transaction PIN enable found; discarding");
                self.publish(false, has_secret);
                if has_secret {
                    self.stores
                        .secret
                        .delete_secret(&self.config.pin_key)
                        .await?;
                    self.publish(false, false);
                }
                self.stores
                    .plain
                    .set(&self.config.enabled_key, FLAG_DISABLED)
                    .await?;
                Ok(Reconciliation::InterruptedEnable)
            }
            (StoredFlag::Disabled, true) => {
                warn!("Orphaned transaction PIN found while gating is off; discarding");
                self.publish(false, true);
                self.stores
                    .secret
                    .delete_secret(&self.config.pin_key)
                    .await?;
                self.publish(false, false);
                Ok(Reconciliation::OrphanedSecret)
            }
        }
    }

    async fn enable_locked(&self, pin: &str) -> Result<()> {
        let encoded = self.encode(pin).await?;
        let previous = self
            .stores
            .secret
            .get_secret(&self.config.pin_key)
            .await?;
        let previous_flag = self.stores.plain.get(&self.config.enabled_key).await?;

        self.stores
            .plain
            .set(&self.config.enabled_key, FLAG_PENDING)
            .await?;

        if let Err(e) = self
            .stores
            .secret
            .set_secret(&self.config.pin_key, &encoded)
            .await
        {
            self.restore_flag(previous_flag.as_deref()).await;
            return Err(e.into());
        }

        if let Err(e) = self
            .stores
            .plain
            .set(&self.config.enabled_key, FLAG_ENABLED)
            .await
        {
            self.restore_secret(previous).await;
            self.restore_flag(previous_flag.as_deref()).await;
            return Err(e.into());
        }

        self.state.send_modify(|s| {
            s.is_enabled = true;
            s.has_pin = true;
        });
        info!("Transaction PIN enabled");
        Ok(())
    }

    // Rollback helpers for an unfinished enable. Whatever they cannot put
    // back is repaired by the next `initialize`.

    async fn restore_secret(&self, previous: Option<Zeroizing<String>>) {
        let restored = match previous.as_deref() {
            Some(value) => {
                self.stores
                    .secret
                    .set_secret(&self.config.pin_key, value)
                    .await
            }
            None => self.stores.secret.delete_secret(&self.config.pin_key).await,
        };
        if let Err(e) = restored {
            warn!("Could not restore previous transaction PIN: {}", e);
        }
    }

    async fn restore_flag(&self, previous: Option<&str>) {
        let restored = match previous {
            Some(flag) => self.stores.plain.set(&self.config.enabled_key, flag).await,
            None => self.stores.plain.remove(&self.config.enabled_key).await,
        };
        if let Err(e) = restored {
            warn!("Could not restore transaction PIN flag: {}", e);
        }
    }

    async fn verify_locked(&self, pin: &str) -> Result<VerifyOutcome> {
        let Some(stored) = self
            .stores
            .secret
            .get_secret(&self.config.pin_key)
            .await?
        else {
            return Ok(VerifyOutcome::NoPin);
        };

        let candidate = Zeroizing::new(pin.to_string());
        let matched = tokio::task::spawn_blocking(move || PinHasher::matches(&stored, &candidate))
            .await
            .map_err(|e| Error::Hash(format!("verify task failed: {}", e)))??;

        Ok(if matched {
            VerifyOutcome::Match
        } else {
            VerifyOutcome::Mismatch
        })
    }

    async fn encode(&self, pin: &str) -> Result<Zeroizing<String>> {
        let hasher = self.hasher.clone();
        let pin = Zeroizing::new(pin.to_string());
        tokio::task::spawn_blocking(move || hasher.encode(&pin))
            .await
            .map_err(|e| Error::Hash(format!("hash task failed: {}", e)))?
    }

    fn publish(&self, is_enabled: bool, has_pin: bool) {
        self.state.send_modify(|s| {
            s.is_enabled = is_enabled;
            s.has_pin = has_pin;
        });
    }
}
