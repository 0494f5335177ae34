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

use crate::container::CompactingMap;
use crate::container::ContainerConfig;
use crate::container::RegisterContainer;
use crate::container::staging::StagingMap;
use crate::error::Error;
use crate::register::MergeOp;
use crate::register::Register;
use crate::register::Sum;

/// A container storing only registers that differ from the merge identity.
///
/// Registers are kept in a [`CompactingMap`] keyed by register index. Merging and traversal
/// require the container to be compact; call [`compactify`](Self::compactify) first.
#[derive(Clone)]
pub struct SparseContainer<R, Op = Sum, M = BTreeMap<u64, R>> {
    range_size: usize,
    registers: CompactingMap<u64, R, M>,
    op: Op,
}

impl<R, Op, M> SparseContainer<R, Op, M>
where
    R: Register,
    Op: MergeOp<R>,
    M: StagingMap<u64, R>,
{
    /// Creates an empty container of `range_size` registers.
    ///
    /// # Panics
    ///
    /// Panics if `compaction_threshold` is zero.
    pub fn new(range_size: usize, compaction_threshold: usize) -> Self {
        Self::from_map(range_size, CompactingMap::new(compaction_threshold))
    }

    pub(crate) fn from_map(range_size: usize, registers: CompactingMap<u64, R, M>) -> Self {
        Self {
            range_size,
            registers,
            op: Op::default(),
        }
    }

    pub fn range_size(&self) -> usize {
        self.range_size
    }

    pub fn compaction_threshold(&self) -> usize {
        self.registers.compaction_threshold()
    }

    /// Returns the number of live registers.
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Returns the underlying map.
    pub fn map(&self) -> &CompactingMap<u64, R, M> {
        &self.registers
    }

    fn check_index(&self, index: u64) {
        assert!(
            index < self.range_size as u64,
            "register index {index} out of range {}",
            self.range_size
        );
    }

    /// Returns a mutable reference to register `index`, inserting the merge identity if it is
    /// not stored.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than the range size.
    pub fn register_mut(&mut self, index: u64) -> &mut R {
        self.check_index(index);
        let identity = self.op.identity();
        self.registers.get_or_insert(index, identity)
    }

    /// Returns the value of register `index`, the merge identity if not stored.
    pub fn get(&self, index: u64) -> R {
        self.registers.at_or(&index, self.op.identity())
    }

    /// Returns the value of a stored register.
    pub fn at(&self, index: u64) -> Result<R, Error> {
        self.registers.at(&index)
    }

    /// Returns true if register `index` is stored.
    pub fn contains(&self, index: u64) -> bool {
        self.registers.contains_key(&index)
    }

    /// Drops register `index`. Returns true if it was stored.
    pub fn erase(&mut self, index: u64) -> bool {
        self.registers.erase(&index)
    }

    pub fn compactify(&mut self) {
        self.registers.compactify()
    }

    pub fn is_compact(&self) -> bool {
        self.registers.is_compact()
    }

    pub fn clear(&mut self) {
        self.registers.clear()
    }

    /// Iterates the stored `(index, value)` pairs of a compact container in index order.
    pub fn iter(&self) -> Result<impl Iterator<Item = (u64, R)> + '_, Error> {
        self.registers.iter()
    }

    pub(crate) fn compacted_entries(&self) -> &[(u64, R)] {
        self.registers.compacted_entries()
    }

    /// Merges a compact `other` into this compact container.
    ///
    /// Registers whose merged value equals the identity are dropped. On error neither
    /// container is modified.
    pub fn merge(&mut self, other: &Self) -> Result<(), Error> {
        if self.range_size != other.range_size {
            return Err(Error::invalid_argument(format!(
                "cannot merge sparse containers of range size {} and {}",
                self.range_size, other.range_size
            )));
        }
        self.registers.merge(&other.registers, &self.op)
    }

    /// Returns the merge of both containers.
    pub fn merged(&self, other: &Self) -> Result<Self, Error> {
        let mut ret = self.clone();
        ret.merge(other)?;
        Ok(ret)
    }

    /// Expands a compact container into a vector of `range_size` registers.
    pub fn to_dense_vector(&self) -> Result<Vec<R>, Error> {
        let mut dense = vec![self.op.identity(); self.range_size];
        for (index, value) in self.iter()? {
            dense[index as usize] = value;
        }
        Ok(dense)
    }

    /// Renders the register map for debugging.
    pub fn state_dump(&self) -> String {
        self.registers.state_dump()
    }
}

impl<R, Op, M> PartialEq for SparseContainer<R, Op, M>
where
    R: Register,
    Op: MergeOp<R>,
    M: StagingMap<u64, R>,
{
    fn eq(&self, other: &Self) -> bool {
        self.range_size == other.range_size && self.registers == other.registers
    }
}

impl<R: fmt::Debug, Op, M: fmt::Debug> fmt::Debug for SparseContainer<R, Op, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseContainer")
            .field("range_size", &self.range_size)
            .field("registers", &self.registers)
            .finish()
    }
}

impl<R, Op, M> fmt::Display for SparseContainer<R, Op, M>
where
    R: Register,
    Op: MergeOp<R>,
    M: StagingMap<u64, R>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.state_dump())
    }
}

impl<R, Op, M> RegisterContainer<R> for SparseContainer<R, Op, M>
where
    R: Register,
    Op: MergeOp<R>,
    M: StagingMap<u64, R>,
{
    type Op = Op;

    fn with_config(range_size: usize, config: &ContainerConfig) -> Self {
        Self::new(range_size, config.compaction_threshold())
    }

    fn type_name() -> &'static str {
        "SparseContainer"
    }

    fn op(&self) -> &Op {
        &self.op
    }

    fn range_size(&self) -> usize {
        self.range_size
    }

    fn len(&self) -> usize {
        self.registers.len()
    }

    fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    fn is_sparse(&self) -> bool {
        true
    }

    fn register_mut(&mut self, index: u64) -> &mut R {
        SparseContainer::register_mut(self, index)
    }

    fn get(&self, index: u64) -> R {
        SparseContainer::get(self, index)
    }

    fn erase(&mut self, index: u64) {
        SparseContainer::erase(self, index);
    }

    fn compactify(&mut self) {
        self.registers.compactify()
    }

    fn is_compact(&self) -> bool {
        self.registers.is_compact()
    }

    fn clear(&mut self) {
        self.registers.clear()
    }

    fn merge(&mut self, other: &Self) -> Result<(), Error> {
        SparseContainer::merge(self, other)
    }

    fn to_dense_vector(&self) -> Result<Vec<R>, Error> {
        SparseContainer::to_dense_vector(self)
    }

    fn serialize(&self) -> Result<Vec<u8>, Error> {
        SparseContainer::serialize(self)
    }

    fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        SparseContainer::deserialize(bytes)
    }
}
