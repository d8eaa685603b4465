//! Address resolution for locked values.
//!
//! One resolver serves coin and block-stake outputs as well as the resolved
//! outputs behind inputs. Candidate locations are tried in order and the first
//! non-empty unlock hash wins:
//!
//! 1. `unlockhash`
//! 2. `condition.data.unlockhash`
//! 3. `condition.data.condition.data.unlockhash`

use crate::payload::LockedValue;

/// Where an address was found on a [`LockedValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPath {
    Flat,
    Condition,
    NestedCondition,
}

impl AddressPath {
    /// Candidate paths in resolution order.
    pub const ORDER: [AddressPath; 3] = [Self::Flat, Self::Condition, Self::NestedCondition];

    fn lookup(self, value: &LockedValue) -> Option<&str> {
        match self {
            Self::Flat => value.unlockhash.as_deref(),
            Self::Condition => value.condition.as_ref()?.unlock_hash(),
            Self::NestedCondition => value.condition.as_ref()?.inner()?.unlock_hash(),
        }
    }
}

/// Resolve the address `value` is locked to, with the path it came from.
pub fn resolve_with_path(value: &LockedValue) -> Option<(&str, AddressPath)> {
    AddressPath::ORDER.iter().find_map(|path| {
        path.lookup(value)
            .filter(|a| !a.is_empty())
            .map(|a| (a, *path))
    })
}

/// Resolve the address `value` is locked to.
pub fn resolve_address(value: &LockedValue) -> Option<&str> {
    resolve_with_path(value).map(|(a, _)| a)
}
