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

use tracing::debug;

use crate::container::ContainerConfig;
use crate::container::DenseContainer;
use crate::container::RegisterContainer;
use crate::container::SparseContainer;
use crate::container::staging::StagingMap;
use crate::error::Error;
use crate::register::MergeOp;
use crate::register::Register;
use crate::register::Sum;

/// Current storage mode of a [`PromotableContainer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Sparse,
    Dense,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Sparse => f.write_str("sparse"),
            Mode::Dense => f.write_str("dense"),
        }
    }
}

#[derive(Clone)]
pub(crate) enum Storage<R, Op, M> {
    Sparse(SparseContainer<R, Op, M>),
    Dense(DenseContainer<R, Op>),
}

/// A container that stores registers sparsely until `promotion_threshold` registers are live,
/// then switches to dense storage for good.
///
/// Promotion happens while writing a register that is not yet stored, or after a merge leaves
/// the sparse storage at or above the threshold. [`clear`](Self::clear) returns the container
/// to sparse mode.
#[derive(Clone)]
pub struct PromotableContainer<R, Op = Sum, M = BTreeMap<u64, R>> {
    range_size: usize,
    compaction_threshold: usize,
    promotion_threshold: usize,
    storage: Storage<R, Op, M>,
}

impl<R, Op, M> PromotableContainer<R, Op, M>
where
    R: Register,
    Op: MergeOp<R>,
    M: StagingMap<u64, R>,
{
    /// Creates an empty, sparse container.
    ///
    /// # Panics
    ///
    /// Panics if `compaction_threshold` is zero.
    pub fn new(range_size: usize, compaction_threshold: usize, promotion_threshold: usize) -> Self {
        Self {
            range_size,
            compaction_threshold,
            promotion_threshold,
            storage: Storage::Sparse(SparseContainer::new(range_size, compaction_threshold)),
        }
    }

    pub(crate) fn from_storage(
        range_size: usize,
        compaction_threshold: usize,
        promotion_threshold: usize,
        storage: Storage<R, Op, M>,
    ) -> Self {
        Self {
            range_size,
            compaction_threshold,
            promotion_threshold,
            storage,
        }
    }

    pub(crate) fn storage(&self) -> &Storage<R, Op, M> {
        &self.storage
    }

    pub fn range_size(&self) -> usize {
        self.range_size
    }

    pub fn compaction_threshold(&self) -> usize {
        self.compaction_threshold
    }

    pub fn promotion_threshold(&self) -> usize {
        self.promotion_threshold
    }

    pub fn mode(&self) -> Mode {
        match self.storage {
            Storage::Sparse(_) => Mode::Sparse,
            Storage::Dense(_) => Mode::Dense,
        }
    }

    pub fn is_sparse(&self) -> bool {
        self.mode() == Mode::Sparse
    }

    /// Returns the sparse storage, if in sparse mode.
    pub fn as_sparse(&self) -> Option<&SparseContainer<R, Op, M>> {
        match &self.storage {
            Storage::Sparse(sparse) => Some(sparse),
            Storage::Dense(_) => None,
        }
    }

    /// Returns the dense storage, if in dense mode.
    pub fn as_dense(&self) -> Option<&DenseContainer<R, Op>> {
        match &self.storage {
            Storage::Sparse(_) => None,
            Storage::Dense(dense) => Some(dense),
        }
    }

    pub fn op(&self) -> &Op {
        match &self.storage {
            Storage::Sparse(sparse) => sparse.op(),
            Storage::Dense(dense) => dense.op(),
        }
    }

    /// Returns the number of stored registers: live registers when sparse, the range size when
    /// dense.
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Sparse(sparse) => sparse.len(),
            Storage::Dense(dense) => dense.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.storage {
            Storage::Sparse(sparse) => sparse.is_empty(),
            Storage::Dense(dense) => dense.is_empty(),
        }
    }

    /// Returns a mutable reference to register `index`.
    ///
    /// In sparse mode, writing a register that is not stored while `promotion_threshold - 1`
    /// registers are already live compacts and promotes the container first.
    pub fn register_mut(&mut self, index: u64) -> &mut R {
        if let Storage::Sparse(sparse) = &mut self.storage {
            if !sparse.contains(index) && sparse.len() + 1 >= self.promotion_threshold {
                sparse.compactify();
                self.promote_compacted();
            }
        }
        match &mut self.storage {
            Storage::Sparse(sparse) => sparse.register_mut(index),
            Storage::Dense(dense) => dense.register_mut(index),
        }
    }

    pub fn get(&self, index: u64) -> R {
        match &self.storage {
            Storage::Sparse(sparse) => sparse.get(index),
            Storage::Dense(dense) => dense.get(index),
        }
    }

    /// Drops register `index` from sparse storage. Does nothing in dense mode.
    pub fn erase(&mut self, index: u64) {
        if let Storage::Sparse(sparse) = &mut self.storage {
            sparse.erase(index);
        }
    }

    pub fn compactify(&mut self) {
        if let Storage::Sparse(sparse) = &mut self.storage {
            sparse.compactify();
        }
    }

    /// Returns true if sparse storage is compact. Dense storage is always compact.
    pub fn is_compact(&self) -> bool {
        match &self.storage {
            Storage::Sparse(sparse) => sparse.is_compact(),
            Storage::Dense(_) => true,
        }
    }

    /// Discards every register and returns to sparse mode.
    pub fn clear(&mut self) {
        self.storage = Storage::Sparse(SparseContainer::new(
            self.range_size,
            self.compaction_threshold,
        ));
    }

    /// Switches a compact, sparse container to dense storage.
    pub fn promote(&mut self) -> Result<(), Error> {
        match &self.storage {
            Storage::Dense(_) => Err(Error::precondition(
                "attempt to promote a container that is already dense",
            )),
            Storage::Sparse(sparse) if !sparse.is_compact() => Err(Error::not_compact("promote")),
            Storage::Sparse(_) => {
                self.promote_compacted();
                Ok(())
            }
        }
    }

    fn promote_compacted(&mut self) {
        let Storage::Sparse(sparse) = &self.storage else {
            return;
        };
        let mut dense = DenseContainer::with_op(self.range_size, sparse.op().clone());
        for &(index, value) in sparse.compacted_entries() {
            let register = dense.register_mut(index);
            *register = sparse.op().merge(*register, value);
        }
        debug!(
            range_size = self.range_size,
            live = sparse.len(),
            promotion_threshold = self.promotion_threshold,
            "promoted sparse container to dense"
        );
        self.storage = Storage::Dense(dense);
    }

    fn ensure_same_parameters(&self, other: &Self) -> Result<(), Error> {
        if self.range_size != other.range_size
            || self.compaction_threshold != other.compaction_threshold
            || self.promotion_threshold != other.promotion_threshold
        {
            return Err(Error::invalid_argument(format!(
                "cannot merge promotable containers with parameters \
                 (range {}, compaction {}, promotion {}) and (range {}, compaction {}, promotion {})",
                self.range_size,
                self.compaction_threshold,
                self.promotion_threshold,
                other.range_size,
                other.compaction_threshold,
                other.promotion_threshold
            )));
        }
        Ok(())
    }

    /// Merges `other` into this container.
    ///
    /// * sparse + sparse: sparse merge, then promote if at or above the threshold.
    /// * dense + dense: element-wise merge.
    /// * dense + sparse: the sparse registers are folded into the dense vector.
    /// * sparse + dense: this container is promoted, then merged element-wise.
    ///
    /// Sparse operands must be compact. On error neither container is modified.
    pub fn merge(&mut self, other: &Self) -> Result<(), Error> {
        self.ensure_same_parameters(other)?;
        if let (Storage::Sparse(lhs), Storage::Sparse(rhs)) = (&self.storage, &other.storage) {
            if !lhs.is_compact() || !rhs.is_compact() {
                return Err(Error::not_compact("merge"));
            }
        }

        if self.mode() != other.mode() {
            debug!(lhs = %self.mode(), rhs = %other.mode(), "merging across storage modes");
        }
        if self.is_sparse() && !other.is_sparse() {
            self.promote()?;
        }

        let promote = match (&mut self.storage, &other.storage) {
            (Storage::Sparse(lhs), Storage::Sparse(rhs)) => {
                lhs.merge(rhs)?;
                lhs.len() >= self.promotion_threshold
            }
            (Storage::Dense(lhs), Storage::Dense(rhs)) => {
                lhs.merge(rhs)?;
                false
            }
            (Storage::Dense(lhs), Storage::Sparse(rhs)) => {
                lhs.merge_sparse(rhs)?;
                false
            }
            (Storage::Sparse(_), Storage::Dense(_)) => {
                unreachable!("sparse storage is promoted before merging a dense operand")
            }
        };
        if promote {
            self.promote_compacted();
        }
        Ok(())
    }

    /// Returns the merge of both containers.
    ///
    /// When `other` is dense, the result starts from a copy of `other` so that the dense
    /// vector is copied rather than built by promotion.
    pub fn merged(&self, other: &Self) -> Result<Self, Error> {
        let mut ret = if other.is_sparse() {
            self.clone()
        } else {
            self.ensure_same_parameters(other)?;
            other.clone()
        };
        if other.is_sparse() {
            ret.merge(other)?;
        } else {
            ret.merge(self)?;
        }
        Ok(ret)
    }

    /// Expands the registers into a vector of `range_size` values.
    ///
    /// Sparse storage must be compact.
    pub fn to_dense_vector(&self) -> Result<Vec<R>, Error> {
        match &self.storage {
            Storage::Sparse(sparse) => sparse.to_dense_vector(),
            Storage::Dense(dense) => Ok(dense.to_dense_vector()),
        }
    }

    /// Compares the logical register values regardless of storage mode.
    ///
    /// Sparse storage on either side must be compact.
    pub fn same_registers(&self, other: &Self) -> Result<bool, Error> {
        if self.range_size != other.range_size {
            return Ok(false);
        }
        Ok(self.to_dense_vector()? == other.to_dense_vector()?)
    }
}

impl<R, Op, M> PartialEq for PromotableContainer<R, Op, M>
where
    R: Register,
    Op: MergeOp<R>,
    M: StagingMap<u64, R>,
{
    fn eq(&self, other: &Self) -> bool {
        if self.range_size != other.range_size
            || self.compaction_threshold != other.compaction_threshold
            || self.promotion_threshold != other.promotion_threshold
        {
            return false;
        }
        match (&self.storage, &other.storage) {
            (Storage::Sparse(lhs), Storage::Sparse(rhs)) => lhs == rhs,
            (Storage::Dense(lhs), Storage::Dense(rhs)) => lhs == rhs,
            _ => false,
        }
    }
}

impl<R: fmt::Debug, Op: fmt::Debug, M: fmt::Debug> fmt::Debug for PromotableContainer<R, Op, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("PromotableContainer");
        debug
            .field("range_size", &self.range_size)
            .field("compaction_threshold", &self.compaction_threshold)
            .field("promotion_threshold", &self.promotion_threshold);
        match &self.storage {
            Storage::Sparse(sparse) => debug.field("sparse", sparse),
            Storage::Dense(dense) => debug.field("dense", dense),
        };
        debug.finish()
    }
}

impl<R, Op, M> fmt::Display for PromotableContainer<R, Op, M>
where
    R: Register,
    Op: MergeOp<R>,
    M: StagingMap<u64, R>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.storage {
            Storage::Sparse(sparse) => write!(f, "{sparse}"),
            Storage::Dense(dense) => write!(f, "{dense}"),
        }
    }
}

impl<R, Op, M> RegisterContainer<R> for PromotableContainer<R, Op, M>
where
    R: Register,
    Op: MergeOp<R>,
    M: StagingMap<u64, R>,
{
    type Op = Op;

    fn with_config(range_size: usize, config: &ContainerConfig) -> Self {
        Self::new(
            range_size,
            config.compaction_threshold(),
            config.promotion_threshold(),
        )
    }

    fn type_name() -> &'static str {
        "PromotableContainer"
    }

    fn op(&self) -> &Op {
        PromotableContainer::op(self)
    }

    fn range_size(&self) -> usize {
        self.range_size
    }

    fn len(&self) -> usize {
        PromotableContainer::len(self)
    }

    fn is_empty(&self) -> bool {
        PromotableContainer::is_empty(self)
    }

    fn is_sparse(&self) -> bool {
        PromotableContainer::is_sparse(self)
    }

    fn register_mut(&mut self, index: u64) -> &mut R {
        PromotableContainer::register_mut(self, index)
    }

    fn get(&self, index: u64) -> R {
        PromotableContainer::get(self, index)
    }

    fn erase(&mut self, index: u64) {
        PromotableContainer::erase(self, index)
    }

    fn compactify(&mut self) {
        PromotableContainer::compactify(self)
    }

    fn is_compact(&self) -> bool {
        PromotableContainer::is_compact(self)
    }

    fn clear(&mut self) {
        PromotableContainer::clear(self)
    }

    fn merge(&mut self, other: &Self) -> Result<(), Error> {
        PromotableContainer::merge(self, other)
    }

    fn to_dense_vector(&self) -> Result<Vec<R>, Error> {
        PromotableContainer::to_dense_vector(self)
    }

    fn serialize(&self) -> Result<Vec<u8>, Error> {
        PromotableContainer::serialize(self)
    }

    fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        PromotableContainer::deserialize(bytes)
    }
}
