//! Symmetric difference of declared sub-resource sets
//!
//! Equality is structural over every field. A member whose name is unchanged
//! but whose other fields differ shows up in both lists: the remote API has
//! no partial update for domains or backends, so a change is a delete of the
//! old value followed by a create of the new one.

use std::collections::BTreeSet;

/// Members to delete and members to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDiff<T> {
    /// In the old set, not in the new one
    pub to_remove: Vec<T>,
    /// In the new set, not in the old one
    pub to_add: Vec<T>,
}

impl<T> SetDiff<T> {
    /// Whether no remote call is needed
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }

    /// Total number of remote calls the diff implies
    pub fn len(&self) -> usize {
        self.to_remove.len() + self.to_add.len()
    }
}

/// Compute `old \ new` and `new \ old`
pub fn diff<T: Ord + Clone>(old: &BTreeSet<T>, new: &BTreeSet<T>) -> SetDiff<T> {
    SetDiff {
        to_remove: old.difference(new).cloned().collect(),
        to_add: new.difference(old).cloned().collect(),
    }
}
