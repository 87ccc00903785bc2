use std::collections::BTreeMap;

/// Outcome of reconciling one incoming value against stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Created,
    Updated,
    Unchanged,
}

/// Rows written by one entity flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityFlush {
    pub inserted: u64,
    pub updated: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staged<K, T> {
    pub inserts: Vec<(K, T)>,
    pub updates: Vec<(K, T)>,
}

impl<K, T> Staged<K, T> {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

/// Latest known state per key plus the writes buffered since the last flush.
#[derive(Debug, Clone)]
pub struct WorkingSet<K, T> {
    known: BTreeMap<K, T>,
    inserts: BTreeMap<K, T>,
    updates: BTreeMap<K, T>,
}

impl<K: Ord + Clone, T: Clone> WorkingSet<K, T> {
    pub fn with_known(known: impl IntoIterator<Item = (K, T)>) -> Self {
        Self {
            known: known.into_iter().collect(),
            inserts: BTreeMap::new(),
            updates: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&T> {
        self.known.get(key)
    }

    pub fn stage_insert(&mut self, key: K, value: T) {
        self.known.insert(key.clone(), value.clone());
        self.inserts.insert(key, value);
    }

    /// A value not yet flushed stays an insert.
    pub fn stage_update(&mut self, key: K, value: T) {
        self.known.insert(key.clone(), value.clone());
        if let Some(pending) = self.inserts.get_mut(&key) {
            *pending = value;
        } else {
            self.updates.insert(key, value);
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.inserts.is_empty() || !self.updates.is_empty()
    }

    pub fn take_staged(&mut self) -> Staged<K, T> {
        Staged {
            inserts: std::mem::take(&mut self.inserts).into_iter().collect(),
            updates: std::mem::take(&mut self.updates).into_iter().collect(),
        }
    }
}

impl<K: Ord + Clone, T: Clone> Default for WorkingSet<K, T> {
    fn default() -> Self {
        Self::with_known(std::iter::empty())
    }
}
