//! Set differ
//!
//! Computes the minimal delta between the previously recorded address set
//! and the declared one. Only the delta is ever sent to the server, which
//! keeps repeated runs with no change free of update traffic.

use crate::address::AddressSet;

/// Records to remove and insert to turn `old` into `new`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressDelta {
    /// `old − new`, sorted
    pub to_remove: Vec<String>,
    /// `new − old`, sorted
    pub to_add: Vec<String>,
}

impl AddressDelta {
    /// No operation would be emitted for this delta
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }

    /// Total number of record operations the delta produces
    pub fn len(&self) -> usize {
        self.to_remove.len() + self.to_add.len()
    }
}

/// Diff two normalized address sets
pub fn diff(old: &AddressSet, new: &AddressSet) -> AddressDelta {
    AddressDelta {
        to_remove: old.difference(new),
        to_add: new.difference(old),
    }
}
