use std::collections::BTreeSet;

use crate::models::{DatasetId, DatasetRecord};

/// Ids picked for batch delete. Kept a subset of the listed ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    ids: BTreeSet<DatasetId>,
}

impl SelectionSet {
    pub fn contains(&self, id: &DatasetId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatasetId> {
        self.ids.iter()
    }

    pub fn to_vec(&self) -> Vec<DatasetId> {
        self.ids.iter().cloned().collect()
    }

    /// Include or exclude `id`. Ids not in `listed` are ignored: they come
    /// from an older snapshot. Returns whether anything changed.
    pub fn toggle(&mut self, id: &DatasetId, included: bool, listed: &[DatasetRecord]) -> bool {
        if !listed.iter().any(|r| &r.id == id) {
            return false;
        }
        if included {
            self.ids.insert(id.clone())
        } else {
            self.ids.remove(id)
        }
    }

    pub fn remove_all(&mut self, ids: &[DatasetId]) {
        for id in ids {
            self.ids.remove(id);
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids that are no longer listed.
    pub fn retain_listed(&mut self, listed: &[DatasetRecord]) {
        self.ids.retain(|id| listed.iter().any(|r| &r.id == id));
    }

    pub fn is_subset_of(&self, listed: &[DatasetRecord]) -> bool {
        self.ids.iter().all(|id| listed.iter().any(|r| &r.id == id))
    }
}
