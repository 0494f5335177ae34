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

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;

use tracing::trace;

use crate::container::staging::StagingMap;
use crate::error::Error;
use crate::register::MergeOp;
use crate::register::Register;

enum ArchiveSlot {
    Live(usize),
    Erased(usize),
    Absent,
}

/// An ordered map built from a sorted archive vector and a small staging map.
///
/// New keys land in the staging map. Once the staging map holds `compaction_threshold`
/// entries, it is merged into the archive in one sorted pass. Erasing an archived key only
/// marks a tombstone; the slot is reclaimed by the next compaction.
///
/// Ordered lookups and traversal ([`find`](Self::find), [`iter`](Self::iter)) and merging
/// require the map to be compact, i.e. to have an empty staging map and no tombstones.
#[derive(Clone)]
pub struct CompactingMap<K, V, M = BTreeMap<K, V>> {
    archive: Vec<(K, V)>,
    tombstones: Vec<bool>,
    tombstone_count: usize,
    staging: M,
    compaction_threshold: usize,
}

impl<K, V, M> CompactingMap<K, V, M>
where
    K: Ord + Copy + fmt::Debug,
    V: Copy + Default + PartialEq + fmt::Debug,
    M: StagingMap<K, V>,
{
    /// Creates an empty map.
    ///
    /// # Panics
    ///
    /// Panics if `compaction_threshold` is zero.
    pub fn new(compaction_threshold: usize) -> Self {
        assert!(
            compaction_threshold > 0,
            "compaction_threshold must be positive"
        );
        Self {
            archive: vec![],
            tombstones: vec![],
            tombstone_count: 0,
            staging: M::default(),
            compaction_threshold,
        }
    }

    /// Builds a compact map from entries already sorted by strictly ascending key.
    pub(crate) fn from_sorted(compaction_threshold: usize, archive: Vec<(K, V)>) -> Self {
        debug_assert!(archive.windows(2).all(|w| w[0].0 < w[1].0));
        let tombstones = vec![false; archive.len()];
        Self {
            archive,
            tombstones,
            tombstone_count: 0,
            staging: M::default(),
            compaction_threshold,
        }
    }

    pub fn compaction_threshold(&self) -> usize {
        self.compaction_threshold
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.archive.len() - self.tombstone_count + self.staging.len()
    }

    /// Returns true if the map holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of archive slots, including tombstoned ones.
    pub fn archive_len(&self) -> usize {
        self.archive.len()
    }

    pub fn staging_len(&self) -> usize {
        self.staging.len()
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstone_count
    }

    /// Returns true if the staging map is empty and no archive slot is tombstoned.
    pub fn is_compact(&self) -> bool {
        self.staging.is_empty() && self.tombstone_count == 0
    }

    fn archive_slot(&self, key: &K) -> ArchiveSlot {
        match self.archive.binary_search_by(|(k, _)| k.cmp(key)) {
            Ok(i) if self.tombstones[i] => ArchiveSlot::Erased(i),
            Ok(i) => ArchiveSlot::Live(i),
            Err(_) => ArchiveSlot::Absent,
        }
    }

    fn resurrect(&mut self, index: usize, value: V) {
        self.tombstones[index] = false;
        self.tombstone_count -= 1;
        self.archive[index].1 = value;
    }

    // Returns true if staging the entry triggered a compaction.
    fn stage(&mut self, key: K, value: V) -> bool {
        let inserted = self.staging.insert(key, value);
        debug_assert!(inserted, "staged key {key:?} was already present");
        if self.staging.len() >= self.compaction_threshold {
            self.compactify();
            true
        } else {
            false
        }
    }

    /// Returns true if `key` has a live entry.
    pub fn contains_key(&self, key: &K) -> bool {
        self.staging.contains_key(key) || matches!(self.archive_slot(key), ArchiveSlot::Live(_))
    }

    /// Inserts `key` with `value` unless `key` is live.
    ///
    /// Returns false, leaving the map untouched, if `key` already has a live entry. An erased
    /// archive slot is revived in place. Otherwise the entry is staged, which may trigger a
    /// compaction.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        if self.staging.contains_key(&key) {
            return false;
        }
        match self.archive_slot(&key) {
            ArchiveSlot::Live(_) => false,
            ArchiveSlot::Erased(i) => {
                self.resurrect(i, value);
                true
            }
            ArchiveSlot::Absent => {
                self.stage(key, value);
                true
            }
        }
    }

    /// Returns the value of a live `key`.
    pub fn at(&self, key: &K) -> Result<V, Error> {
        self.get(key)
            .ok_or_else(|| Error::not_found(format!("key {key:?} does not exist")))
    }

    /// Returns the value of `key`, or `fallback` if it has no live entry.
    pub fn at_or(&self, key: &K, fallback: V) -> V {
        self.get(key).unwrap_or(fallback)
    }

    fn get(&self, key: &K) -> Option<V> {
        if let Some(value) = self.staging.get(key) {
            return Some(*value);
        }
        match self.archive_slot(key) {
            ArchiveSlot::Live(i) => Some(self.archive[i].1),
            ArchiveSlot::Erased(_) | ArchiveSlot::Absent => None,
        }
    }

    /// Returns a mutable reference to the value of `key`, inserting the default value first if
    /// `key` has no live entry.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V {
        self.get_or_insert(key, V::default())
    }

    /// Returns a mutable reference to the value of `key`, inserting `value` first if `key` has
    /// no live entry.
    ///
    /// The insertion goes through the same path as [`insert`](Self::insert), so it may compact
    /// the map; the returned reference then points into the archive.
    pub fn get_or_insert(&mut self, key: K, value: V) -> &mut V {
        if self.staging.contains_key(&key) {
            return self
                .staging
                .get_mut(&key)
                .expect("staged key must be present");
        }
        match self.archive_slot(&key) {
            ArchiveSlot::Live(i) => &mut self.archive[i].1,
            ArchiveSlot::Erased(i) => {
                self.resurrect(i, value);
                &mut self.archive[i].1
            }
            ArchiveSlot::Absent => {
                if self.stage(key, value) {
                    match self.archive_slot(&key) {
                        ArchiveSlot::Live(i) => &mut self.archive[i].1,
                        _ => panic!("compaction lost staged key {key:?}"),
                    }
                } else {
                    self.staging
                        .get_mut(&key)
                        .expect("staged key must be present")
                }
            }
        }
    }

    /// Removes the live entry of `key`. Returns true if one existed.
    ///
    /// A staged entry is removed immediately; an archived entry is tombstoned.
    pub fn erase(&mut self, key: &K) -> bool {
        if self.staging.remove(key).is_some() {
            return true;
        }
        match self.archive_slot(key) {
            ArchiveSlot::Live(i) => {
                self.tombstones[i] = true;
                self.tombstone_count += 1;
                true
            }
            ArchiveSlot::Erased(_) | ArchiveSlot::Absent => false,
        }
    }

    /// Looks up `key` in a compact map.
    pub fn find(&self, key: &K) -> Result<Option<V>, Error> {
        if !self.is_compact() {
            return Err(Error::not_compact("find"));
        }
        Ok(self
            .archive
            .binary_search_by(|(k, _)| k.cmp(key))
            .ok()
            .map(|i| self.archive[i].1))
    }

    /// Iterates the entries of a compact map in ascending key order.
    pub fn iter(&self) -> Result<impl Iterator<Item = (K, V)> + '_, Error> {
        if !self.is_compact() {
            return Err(Error::not_compact("iter"));
        }
        Ok(self.archive.iter().copied())
    }

    /// Archive entries of a map known to be compact.
    pub(crate) fn compacted_entries(&self) -> &[(K, V)] {
        debug_assert!(self.is_compact());
        &self.archive
    }

    /// Folds the staging map into the archive and drops tombstoned slots.
    ///
    /// Does nothing if the map is already compact.
    pub fn compactify(&mut self) {
        if self.is_compact() {
            return;
        }
        trace!(
            archive = self.archive.len(),
            staging = self.staging.len(),
            tombstones = self.tombstone_count,
            "compacting map"
        );

        let capacity = self.len();
        let staged = self.staging.drain_sorted();
        let mut archived = self
            .archive
            .iter()
            .zip(&self.tombstones)
            .filter(|(_, erased)| !**erased)
            .map(|(entry, _)| *entry)
            .peekable();
        let mut staged = staged.into_iter().peekable();

        let mut compacted = Vec::with_capacity(capacity);
        loop {
            let next = match (archived.peek(), staged.peek()) {
                (Some(a), Some(s)) => match a.0.cmp(&s.0) {
                    std::cmp::Ordering::Less => archived.next(),
                    std::cmp::Ordering::Greater => staged.next(),
                    std::cmp::Ordering::Equal => {
                        panic!("staged key {:?} duplicates a live archive entry", s.0)
                    }
                },
                (Some(_), None) => archived.next(),
                (None, Some(_)) => staged.next(),
                (None, None) => break,
            };
            compacted.extend(next);
        }

        self.tombstones = vec![false; compacted.len()];
        self.tombstone_count = 0;
        self.archive = compacted;
    }

    /// Merges `other` into this map with `op`.
    ///
    /// Both maps must be compact. Keys present on one side are copied; colliding keys are
    /// combined with `op`, and results equal to the operator identity are dropped. On error
    /// neither map is modified.
    pub fn merge<Op>(&mut self, other: &Self, op: &Op) -> Result<(), Error>
    where
        V: Register,
        Op: MergeOp<V>,
    {
        if !self.is_compact() || !other.is_compact() {
            return Err(Error::not_compact("merge"));
        }

        let identity = op.identity();
        let lhs = &self.archive;
        let rhs = &other.archive;
        let mut merged = Vec::with_capacity(lhs.len().max(rhs.len()));
        let (mut i, mut j) = (0, 0);
        while i < lhs.len() && j < rhs.len() {
            match lhs[i].0.cmp(&rhs[j].0) {
                std::cmp::Ordering::Less => {
                    merged.push(lhs[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    merged.push(rhs[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    let value = op.merge(lhs[i].1, rhs[j].1);
                    if value != identity {
                        merged.push((lhs[i].0, value));
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&lhs[i..]);
        merged.extend_from_slice(&rhs[j..]);

        self.tombstones = vec![false; merged.len()];
        self.tombstone_count = 0;
        self.archive = merged;
        Ok(())
    }

    /// Removes every entry, keeping the compaction threshold.
    pub fn clear(&mut self) {
        self.archive.clear();
        self.tombstones.clear();
        self.tombstone_count = 0;
        self.staging.clear();
    }

    /// Renders the archive, staging map and threshold for debugging.
    ///
    /// Tombstoned archive entries are suffixed with `~`.
    pub fn state_dump(&self) -> String {
        self.to_string()
    }
}

impl<K, V, M> fmt::Display for CompactingMap<K, V, M>
where
    K: Ord + Copy + fmt::Debug,
    V: Copy + Default + PartialEq + fmt::Debug,
    M: StagingMap<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "archive ({}):", self.archive.len())?;
        for ((key, value), erased) in self.archive.iter().zip(&self.tombstones) {
            write!(f, " ({key:?}, {value:?})")?;
            if *erased {
                f.write_char('~')?;
            }
        }
        write!(f, "\nstaging ({}):", self.staging.len())?;
        for (key, value) in self.staging.iter() {
            write!(f, " ({key:?}, {value:?})")?;
        }
        write!(
            f,
            "\nthreshold: {}, tombstones: {}",
            self.compaction_threshold, self.tombstone_count
        )
    }
}

impl<K, V, M> PartialEq for CompactingMap<K, V, M>
where
    K: Ord + Copy + fmt::Debug,
    V: Copy + Default + PartialEq + fmt::Debug,
    M: StagingMap<K, V>,
{
    fn eq(&self, other: &Self) -> bool {
        self.compaction_threshold == other.compaction_threshold
            && self.tombstone_count == other.tombstone_count
            && self.tombstones == other.tombstones
            && self.archive == other.archive
            && self.staging.iter().eq(other.staging.iter())
    }
}

impl<K, V, M> fmt::Debug for CompactingMap<K, V, M>
where
    K: fmt::Debug,
    V: fmt::Debug,
    M: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompactingMap")
            .field("compaction_threshold", &self.compaction_threshold)
            .field("archive", &self.archive)
            .field("tombstones", &self.tombstones)
            .field("staging", &self.staging)
            .finish()
    }
}
