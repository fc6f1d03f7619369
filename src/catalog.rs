// catalog.rs - Keyed lookup tables built from static authoring data.
// Factions, towers and skill modifiers are all authored as ordered lists;
// a Catalog turns one of those lists into a read-only index.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use bevy::prelude::*;
use thiserror::Error;

/// Authoring records that know their own catalog key.
///
/// Implementing this lets a list be turned into a catalog with
/// `Catalog::from_entries` instead of passing a key function every time.
pub trait Keyed {
    type Key: Copy + Eq + Hash + Debug;

    fn key(&self) -> Self::Key;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("no catalog entry for key {key}")]
    NotFound { key: String },
    #[error("catalog index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// A read-only index `K -> V` derived from an ordered list of entries.
///
/// The source list is kept as-is so entries can also be resolved by their
/// authoring position. Keys are unique: when two entries share a key the
/// first one wins and the later one is rejected with a warning.
#[derive(Debug, Clone)]
pub struct Catalog<K, V> {
    entries: Vec<V>,
    index: HashMap<K, usize>,
    /// Insertion order of accepted keys, for deterministic iteration.
    order: Vec<K>,
    rejected: Vec<K>,
}

impl<K, V> Catalog<K, V>
where
    K: Copy + Eq + Hash + Debug,
{
    /// Builds the index from `entries` in order, using `key_of` to tag each one.
    pub fn build(entries: Vec<V>, key_of: impl Fn(&V) -> K) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        let mut order = Vec::with_capacity(entries.len());
        let mut rejected = Vec::new();

        for (position, entry) in entries.iter().enumerate() {
            let key = key_of(entry);
            if let Some(&kept) = index.get(&key) {
                warn!(
                    "Duplicate catalog key {:?} at position {} (keeping position {})",
                    key, position, kept
                );
                rejected.push(key);
                continue;
            }
            index.insert(key, position);
            order.push(key);
        }

        Self {
            entries,
            index,
            order,
            rejected,
        }
    }

    pub fn lookup(&self, key: &K) -> Result<&V, CatalogError> {
        self.index
            .get(key)
            .map(|&position| &self.entries[position])
            .ok_or_else(|| CatalogError::NotFound {
                key: format!("{key:?}"),
            })
    }

    /// Resolves an entry by its position in the authoring list.
    ///
    /// Asking for a position outside the list is a caller bug, so it is
    /// logged as an error as well as returned.
    pub fn lookup_by_index(&self, index: usize) -> Result<&V, CatalogError> {
        self.entries.get(index).ok_or_else(|| {
            error!(
                "Catalog index {} out of range (len {})",
                index,
                self.entries.len()
            );
            CatalogError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            }
        })
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Number of entries in the authoring list, rejected duplicates included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accepted keys in authoring order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.order.iter().copied()
    }

    /// Accepted entries in authoring order.
    pub fn iter(&self) -> impl Iterator<Item = &V> + '_ {
        self.order
            .iter()
            .map(move |key| &self.entries[self.index[key]])
    }

    /// Keys of entries that were dropped because an earlier entry already used them.
    pub fn rejected(&self) -> &[K] {
        &self.rejected
    }
}

impl<K, V> Catalog<K, V>
where
    V: Keyed<Key = K>,
    K: Copy + Eq + Hash + Debug,
{
    pub fn from_entries(entries: Vec<V>) -> Self {
        Self::build(entries, |entry: &V| entry.key())
    }

    /// Replaces the source list and re-derives the index.
    /// Used when authoring data is edited while the game is running.
    pub fn rebuild(&mut self, entries: Vec<V>) {
        *self = Self::from_entries(entries);
    }
}
