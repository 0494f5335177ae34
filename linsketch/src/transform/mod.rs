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

//! Linear projections from stream items onto registers.
//!
//! # Usage
//!
//! ```rust
//! # use linsketch::container::ContainerConfig;
//! # use linsketch::container::RegisterContainer;
//! # use linsketch::container::SparseContainer;
//! # use linsketch::transform::CountSketch;
//! # use linsketch::transform::Transform;
//! let transform = CountSketch::<linsketch::hash::MulAddShift>::new(64, 7);
//! let mut registers =
//!     SparseContainer::<i64>::with_config(transform.range_size(), &ContainerConfig::default());
//! transform.apply(&mut registers, 42, 3i64);
//! transform.apply(&mut registers, 42, -3i64);
//! assert!(registers.is_empty());
//! ```

mod count_sketch;
mod sparse_jlt;

use std::fmt;

pub use self::count_sketch::CountSketch;
pub use self::sparse_jlt::SparseJlt;
use crate::container::RegisterContainer;
use crate::error::Error;
use crate::register::MergeOp;
use crate::register::Register;

/// Identifies a transform in serialized images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransformKind {
    CountSketch = 1,
    SparseJlt = 2,
}

impl TransformKind {
    pub fn from_id(id: u8) -> Result<Self, Error> {
        match id {
            1 => Ok(TransformKind::CountSketch),
            2 => Ok(TransformKind::SparseJlt),
            _ => Err(Error::deserial(format!("unknown transform kind {id}"))),
        }
    }
}

/// The parameters that determine a transform completely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformParams {
    pub kind: TransformKind,
    /// [`RangeHash::ID`](crate::hash::RangeHash::ID) of the underlying hash.
    pub hash_id: u8,
    /// Registers per replication, a power of two.
    pub tile_size: u64,
    pub replication_count: u64,
    pub seed: u64,
}

/// A linear map from `(item, multiplicity)` updates onto a register container.
pub trait Transform: fmt::Debug + PartialEq + Send + Sync {
    /// Number of registers the transform writes to.
    fn range_size(&self) -> usize;

    /// Adds the projection of `multiplicity` copies of `item` to `registers`.
    fn apply<R, C>(&self, registers: &mut C, item: u64, multiplicity: R)
    where
        R: Register,
        C: RegisterContainer<R>;

    fn name(&self) -> &'static str;

    /// Human-readable description including parameters.
    fn description(&self) -> String;

    fn params(&self) -> TransformParams;

    /// Rebuilds a transform from its parameters.
    fn from_params(params: &TransformParams) -> Result<Self, Error>
    where
        Self: Sized;
}

/// Merges `contribution` into register `index`, dropping the register if it returns to the
/// merge identity so that sparse storage only holds non-identity registers.
#[inline]
pub(crate) fn update_register<R, C>(registers: &mut C, index: u64, contribution: R)
where
    R: Register,
    C: RegisterContainer<R>,
{
    let op = registers.op().clone();
    let register = registers.register_mut(index);
    *register = op.merge(*register, contribution);
    if *register == op.identity() {
        registers.erase(index);
    }
}
