//! Unordered collections of records that are unique by key.
//!
//! Manifest documents store versions and installers as JSON arrays, but no two elements of either
//! array may share a key. [`KeyedSet`] holds those arrays as ordered maps so that the uniqueness
//! invariant holds by construction: it (de)serializes as a plain JSON array and refuses to
//! deserialize an array containing a duplicate key.
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use thiserror;

/// A record identified by a key that is unique within its owning collection.
pub trait Keyed {
    type Key: Ord + Clone + fmt::Debug + fmt::Display;

    fn key(&self) -> &Self::Key;
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("duplicate key: {0}")]
pub struct DuplicateKey(pub String);

#[derive(Clone, Debug, PartialEq)]
pub struct KeyedSet<T: Keyed> {
    entries: BTreeMap<T::Key, T>,
}

impl<T: Keyed> Default for KeyedSet<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T: Keyed> KeyedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.entries.get(key)
    }

    /// Mutable access to a record. Callers must not change the record's key.
    pub fn get_mut(&mut self, key: &T::Key) -> Option<&mut T> {
        self.entries.get_mut(key)
    }

    /// Add a record whose key is not yet present. Hands the record back if the key is taken.
    pub fn insert(&mut self, item: T) -> std::result::Result<(), T> {
        match self.entries.entry(item.key().clone()) {
            btree_map::Entry::Occupied(_) => Err(item),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(item);
                Ok(())
            }
        }
    }

    /// Swap in a record for the existing record with the same key, returning the old one. Hands
    /// the record back if no record with its key exists.
    pub fn replace(&mut self, item: T) -> std::result::Result<T, T> {
        match self.entries.get_mut(item.key()) {
            Some(existing) => Ok(std::mem::replace(existing, item)),
            None => Err(item),
        }
    }

    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        self.entries.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &T::Key> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }
}

impl<T: Keyed> TryFrom<Vec<T>> for KeyedSet<T> {
    type Error = DuplicateKey;

    fn try_from(items: Vec<T>) -> std::result::Result<Self, Self::Error> {
        let mut set = KeyedSet::new();
        for item in items {
            if let Err(dup) = set.insert(item) {
                return Err(DuplicateKey(dup.key().to_string()));
            }
        }
        Ok(set)
    }
}

impl<T: Keyed> IntoIterator for KeyedSet<T> {
    type Item = T;
    type IntoIter = btree_map::IntoValues<T::Key, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

impl<T: Keyed + Serialize> Serialize for KeyedSet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for item in self.entries.values() {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

impl<'de, T: Keyed + Deserialize<'de>> Deserialize<'de> for KeyedSet<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        KeyedSet::try_from(items).map_err(de::Error::custom)
    }
}
