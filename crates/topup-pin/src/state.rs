//! Observable gate state and the stored flag encoding

use serde::Serialize;

/// Flag value: gating on
pub const FLAG_ENABLED: &str = "true";

/// Flag value: gating off
pub const FLAG_DISABLED: &str = "false";

/// Flag value: an enable was started and has not finished
pub const FLAG_PENDING: &str = "pending";

/// What UI layers may observe about the transaction PIN.
///
/// The PIN itself never appears here, only whether one is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransactionPinState {
    /// PIN gating is turned on
    pub is_enabled: bool,
    /// A PIN is currently stored
    pub has_pin: bool,
    /// The initial storage read has not completed
    pub is_loading: bool,
}

impl Default for TransactionPinState {
    fn default() -> Self {
        Self {
            is_enabled: false,
            has_pin: false,
            is_loading: true,
        }
    }
}

impl TransactionPinState {
    /// Whether sensitive actions must prompt for the PIN
    pub fn pin_required(&self) -> bool {
        self.is_enabled && self.has_pin
    }

    /// Coarse lifecycle phase
    pub fn phase(&self) -> GatePhase {
        if self.is_loading {
            GatePhase::Uninitialized
        } else if self.pin_required() {
            GatePhase::Enabled
        } else {
            GatePhase::Disabled
        }
    }
}

/// Gate lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePhase {
    /// Waiting for the first storage read
    Uninitialized,
    /// No PIN prompt before sensitive actions
    Disabled,
    /// Sensitive actions require the PIN
    Enabled,
}

/// Parsed value of the enabled-flag key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StoredFlag {
    Enabled,
    Pending,
    /// `"false"`, absent, or anything unrecognised
    Disabled,
}

impl StoredFlag {
    pub(crate) fn parse(value: Option<&str>) -> Self {
        match value {
            Some(FLAG_ENABLED) => Self::Enabled,
            Some(FLAG_PENDING) => Self::Pending,
            _ => Self::Disabled,
        }
    }
}

/// How `initialize` found the flag/secret pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Flag and secret agree
    Consistent,
    /// Flag said enabled with no secret; flag reset to disabled
    MissingSecret,
    /// An enable was interrupted; its secret was discarded
    InterruptedEnable,
    /// A secret was stored while gating was off; it was discarded
    OrphanedSecret,
    /// Mismatch found but repairs are turned off
    Skipped,
}
