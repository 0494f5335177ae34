// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Ordered maps usable as the staging area of a [`CompactingMap`].
//!
//! [`CompactingMap`]: super::CompactingMap

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

/// A small ordered map that buffers recent insertions before compaction.
///
/// Implementations must iterate in ascending key order.
pub trait StagingMap<K: Ord + Copy, V: Copy>: Default + Clone + fmt::Debug {
    /// Iterator over entries in ascending key order.
    type Iter<'a>: Iterator<Item = (&'a K, &'a V)>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    /// Returns the number of entries.
    fn len(&self) -> usize;

    /// Returns true if the map holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `key` is present.
    fn contains_key(&self, key: &K) -> bool;

    /// Returns the value of `key`.
    fn get(&self, key: &K) -> Option<&V>;

    /// Returns a mutable reference to the value of `key`.
    fn get_mut(&mut self, key: &K) -> Option<&mut V>;

    /// Inserts `key` unless already present. Returns true on insertion.
    fn insert(&mut self, key: K, value: V) -> bool;

    /// Removes `key`, returning its value.
    fn remove(&mut self, key: &K) -> Option<V>;

    /// Removes every entry.
    fn clear(&mut self);

    /// Empties the map, returning its entries in ascending key order.
    fn drain_sorted(&mut self) -> Vec<(K, V)>;

    /// Iterates entries in ascending key order.
    fn iter(&self) -> Self::Iter<'_>;
}

impl<K: Ord + Copy + fmt::Debug, V: Copy + fmt::Debug> StagingMap<K, V> for BTreeMap<K, V> {
    type Iter<'a>
        = btree_map::Iter<'a, K, V>
    where
        K: 'a,
        V: 'a;

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn contains_key(&self, key: &K) -> bool {
        BTreeMap::contains_key(self, key)
    }

    fn get(&self, key: &K) -> Option<&V> {
        BTreeMap::get(self, key)
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        BTreeMap::get_mut(self, key)
    }

    fn insert(&mut self, key: K, value: V) -> bool {
        match self.entry(key) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        BTreeMap::remove(self, key)
    }

    fn clear(&mut self) {
        BTreeMap::clear(self)
    }

    fn drain_sorted(&mut self) -> Vec<(K, V)> {
        std::mem::take(self).into_iter().collect()
    }

    fn iter(&self) -> Self::Iter<'_> {
        BTreeMap::iter(self)
    }
}

/// A flat map keeping its entries in a sorted vector.
///
/// Lookups are binary searches and insertions shift the tail, which is cheap for the small
/// staging sizes used in practice.
#[derive(Debug, Clone, PartialEq)]
pub struct SortedVecMap<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> Default for SortedVecMap<K, V> {
    fn default() -> Self {
        Self { entries: vec![] }
    }
}

impl<K: Ord, V> SortedVecMap<K, V> {
    fn search(&self, key: &K) -> Result<usize, usize> {
        self.entries.binary_search_by(|(k, _)| k.cmp(key))
    }
}

/// Iterator over a [`SortedVecMap`].
#[derive(Debug, Clone)]
pub struct SortedVecIter<'a, K, V> {
    inner: std::slice::Iter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for SortedVecIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Ord + Copy + fmt::Debug, V: Copy + fmt::Debug> StagingMap<K, V> for SortedVecMap<K, V> {
    type Iter<'a>
        = SortedVecIter<'a, K, V>
    where
        K: 'a,
        V: 'a;

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn contains_key(&self, key: &K) -> bool {
        self.search(key).is_ok()
    }

    fn get(&self, key: &K) -> Option<&V> {
        self.search(key).ok().map(|i| &self.entries[i].1)
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self.search(key) {
            Ok(i) => Some(&mut self.entries[i].1),
            Err(_) => None,
        }
    }

    fn insert(&mut self, key: K, value: V) -> bool {
        match self.search(&key) {
            Ok(_) => false,
            Err(i) => {
                self.entries.insert(i, (key, value));
                true
            }
        }
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.search(key).ok().map(|i| self.entries.remove(i).1)
    }

    fn clear(&mut self) {
        self.entries.clear()
    }

    fn drain_sorted(&mut self) -> Vec<(K, V)> {
        std::mem::take(&mut self.entries)
    }

    fn iter(&self) -> Self::Iter<'_> {
        SortedVecIter {
            inner: self.entries.iter(),
        }
    }
}
