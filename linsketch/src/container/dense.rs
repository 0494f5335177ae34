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

use std::fmt;

use crate::container::ContainerConfig;
use crate::container::RegisterContainer;
use crate::container::sparse::SparseContainer;
use crate::container::staging::StagingMap;
use crate::error::Error;
use crate::register::MergeOp;
use crate::register::Register;
use crate::register::Sum;

/// A container storing every register in a vector.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseContainer<R, Op = Sum> {
    registers: Vec<R>,
    op: Op,
}

impl<R: Register, Op: MergeOp<R>> DenseContainer<R, Op> {
    /// Creates `range_size` registers holding the merge identity.
    pub fn new(range_size: usize) -> Self {
        Self::with_op(range_size, Op::default())
    }

    pub fn with_op(range_size: usize, op: Op) -> Self {
        Self {
            registers: vec![op.identity(); range_size],
            op,
        }
    }

    /// Wraps existing register values.
    pub fn from_registers(registers: Vec<R>) -> Self {
        Self {
            registers,
            op: Op::default(),
        }
    }

    pub fn range_size(&self) -> usize {
        self.registers.len()
    }

    /// Returns the number of stored registers, which is always the range size.
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// Returns true if every register holds the merge identity.
    pub fn is_empty(&self) -> bool {
        let identity = self.op.identity();
        self.registers.iter().all(|r| *r == identity)
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    /// # Panics
    ///
    /// Panics if `index` is not less than the range size.
    pub fn register_mut(&mut self, index: u64) -> &mut R {
        &mut self.registers[index as usize]
    }

    /// # Panics
    ///
    /// Panics if `index` is not less than the range size.
    pub fn get(&self, index: u64) -> R {
        self.registers[index as usize]
    }

    pub fn registers(&self) -> &[R] {
        &self.registers
    }

    pub fn iter(&self) -> impl Iterator<Item = R> + '_ {
        self.registers.iter().copied()
    }

    /// Resets every register to the merge identity.
    pub fn clear(&mut self) {
        let identity = self.op.identity();
        self.registers.fill(identity);
    }

    /// Merges `other` element-wise.
    pub fn merge(&mut self, other: &Self) -> Result<(), Error> {
        if self.range_size() != other.range_size() {
            return Err(Error::invalid_argument(format!(
                "cannot merge dense containers of range size {} and {}",
                self.range_size(),
                other.range_size()
            )));
        }
        for (lhs, rhs) in self.registers.iter_mut().zip(&other.registers) {
            *lhs = self.op.merge(*lhs, *rhs);
        }
        Ok(())
    }

    /// Returns the element-wise merge of both containers.
    pub fn merged(&self, other: &Self) -> Result<Self, Error> {
        let mut ret = self.clone();
        ret.merge(other)?;
        Ok(ret)
    }

    /// Folds the live registers of a compact sparse container into this one.
    pub fn merge_sparse<M: StagingMap<u64, R>>(
        &mut self,
        other: &SparseContainer<R, Op, M>,
    ) -> Result<(), Error> {
        if self.range_size() != other.range_size() {
            return Err(Error::invalid_argument(format!(
                "cannot merge sparse container of range size {} into dense range size {}",
                other.range_size(),
                self.range_size()
            )));
        }
        for (index, value) in other.iter()? {
            let register = &mut self.registers[index as usize];
            *register = self.op.merge(*register, value);
        }
        Ok(())
    }

    pub fn to_dense_vector(&self) -> Vec<R> {
        self.registers.clone()
    }
}

impl<R: Register, Op: MergeOp<R>> RegisterContainer<R> for DenseContainer<R, Op> {
    type Op = Op;

    fn with_config(range_size: usize, _config: &ContainerConfig) -> Self {
        Self::new(range_size)
    }

    fn type_name() -> &'static str {
        "DenseContainer"
    }

    fn op(&self) -> &Op {
        &self.op
    }

    fn range_size(&self) -> usize {
        self.registers.len()
    }

    fn len(&self) -> usize {
        self.registers.len()
    }

    fn is_empty(&self) -> bool {
        DenseContainer::is_empty(self)
    }

    fn is_sparse(&self) -> bool {
        false
    }

    fn register_mut(&mut self, index: u64) -> &mut R {
        DenseContainer::register_mut(self, index)
    }

    fn get(&self, index: u64) -> R {
        DenseContainer::get(self, index)
    }

    fn erase(&mut self, _index: u64) {}

    fn compactify(&mut self) {}

    fn is_compact(&self) -> bool {
        true
    }

    fn clear(&mut self) {
        DenseContainer::clear(self)
    }

    fn merge(&mut self, other: &Self) -> Result<(), Error> {
        DenseContainer::merge(self, other)
    }

    fn to_dense_vector(&self) -> Result<Vec<R>, Error> {
        Ok(DenseContainer::to_dense_vector(self))
    }

    fn serialize(&self) -> Result<Vec<u8>, Error> {
        Ok(DenseContainer::serialize(self))
    }

    fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        DenseContainer::deserialize(bytes)
    }
}

impl<R: Register, Op> fmt::Display for DenseContainer<R, Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, register) in self.registers.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{register}")?;
        }
        Ok(())
    }
}

impl<R, Op, M> From<SparseContainer<R, Op, M>> for DenseContainer<R, Op>
where
    R: Register,
    Op: MergeOp<R>,
    M: StagingMap<u64, R>,
{
    fn from(sparse: SparseContainer<R, Op, M>) -> Self {
        let mut sparse = sparse;
        sparse.compactify();
        let mut dense = Self::with_op(sparse.range_size(), sparse.op().clone());
        for &(index, value) in sparse.compacted_entries() {
            dense.registers[index as usize] = value;
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_new_is_empty() {
        let dense = DenseContainer::<i32>::new(8);
        assert!(dense.is_empty());
        assert_eq!(dense.len(), 8);
        assert_eq!(dense.to_dense_vector(), vec![0; 8]);
    }

    #[test]
    fn test_merge_elementwise() {
        let mut lhs = DenseContainer::<i32>::new(4);
        let mut rhs = DenseContainer::<i32>::new(4);
        *lhs.register_mut(0) = 2;
        *lhs.register_mut(3) = -1;
        *rhs.register_mut(3) = 1;
        *rhs.register_mut(1) = 5;
        lhs.merge(&rhs).unwrap();
        assert_eq!(lhs.registers(), &[2, 5, 0, 0]);
    }

    #[test]
    fn test_merge_range_mismatch() {
        let mut lhs = DenseContainer::<i32>::new(4);
        let rhs = DenseContainer::<i32>::new(5);
        let err = lhs.merge(&rhs).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_clear_resets_to_identity() {
        let mut dense = DenseContainer::<f64>::new(3);
        *dense.register_mut(1) = 2.5;
        assert!(!dense.is_empty());
        dense.clear();
        assert!(dense.is_empty());
    }

    #[test]
    fn test_display() {
        let dense = DenseContainer::<i64>::from_registers(vec![1, 0, -3]);
        assert_eq!(dense.to_string(), "1 0 -3");
    }

    #[test]
    fn test_from_sparse() {
        let mut sparse = SparseContainer::<i64>::new(6, 2);
        *sparse.register_mut(4) += 7;
        *sparse.register_mut(1) -= 2;
        *sparse.register_mut(5) += 1;
        let dense = DenseContainer::from(sparse);
        assert_eq!(dense.registers(), &[0, -2, 0, 0, 7, 1]);
    }
}
