use serde::{Deserialize, Serialize};

/// Resource limits applied to context injections.
///
/// Both default to unlimited; the coordinator enforces only what is
/// configured. The size limit is a hard cap, the per-turn budget is
/// advisory (exceeding it logs a warning, the injection still goes
/// through).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InjectionLimits {
    /// Approximate token budget per turn. `None` means unlimited.
    pub budget_per_turn: Option<u64>,
    /// Maximum size of a single injection in bytes. `None` means
    /// unlimited.
    pub size_limit_bytes: Option<u64>,
}

impl InjectionLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }
}
