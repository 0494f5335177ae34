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

//! Register storage for linear sketches.
//!
//! A sketch's registers live in one of three containers:
//!
//! * [`DenseContainer`] stores every register in a vector.
//! * [`SparseContainer`] stores only the non-identity registers in a [`CompactingMap`].
//! * [`PromotableContainer`] starts sparse and switches to dense once enough registers are
//!   occupied.
//!
//! All of them implement [`RegisterContainer`], which is what projection transforms write
//! through. Every container is single-writer; wrap it in a lock for concurrent use.

mod compacting_map;
mod dense;
mod promotable;
pub(crate) mod serialization;
mod sparse;
mod staging;

use std::fmt;

pub use self::compacting_map::CompactingMap;
pub use self::dense::DenseContainer;
pub use self::promotable::Mode;
pub use self::promotable::PromotableContainer;
pub use self::sparse::SparseContainer;
pub use self::staging::SortedVecIter;
pub use self::staging::SortedVecMap;
pub use self::staging::StagingMap;
use crate::error::Error;
use crate::register::MergeOp;
use crate::register::Register;

/// Default number of staged entries that triggers a compaction.
pub const DEFAULT_COMPACTION_THRESHOLD: usize = 100;

/// Default number of live sparse registers that triggers promotion to dense storage.
pub const DEFAULT_PROMOTION_THRESHOLD: usize = 4096;

/// Storage parameters shared by the register containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerConfig {
    compaction_threshold: usize,
    promotion_threshold: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            promotion_threshold: DEFAULT_PROMOTION_THRESHOLD,
        }
    }
}

impl ContainerConfig {
    /// Creates a builder starting from the default configuration.
    pub fn builder() -> ContainerConfigBuilder {
        ContainerConfigBuilder::default()
    }

    pub fn compaction_threshold(&self) -> usize {
        self.compaction_threshold
    }

    pub fn promotion_threshold(&self) -> usize {
        self.promotion_threshold
    }
}

/// Builder for [`ContainerConfig`].
#[derive(Debug, Default)]
pub struct ContainerConfigBuilder {
    config: ContainerConfig,
}

impl ContainerConfigBuilder {
    /// Sets the number of staged entries that triggers a compaction.
    ///
    /// # Panics
    ///
    /// Panics if `threshold` is zero.
    pub fn compaction_threshold(mut self, threshold: usize) -> Self {
        assert!(threshold > 0, "compaction_threshold must be positive");
        self.config.compaction_threshold = threshold;
        self
    }

    /// Sets the number of live sparse registers that triggers promotion.
    ///
    /// # Panics
    ///
    /// Panics if `threshold` is zero.
    pub fn promotion_threshold(mut self, threshold: usize) -> Self {
        assert!(threshold > 0, "promotion_threshold must be positive");
        self.config.promotion_threshold = threshold;
        self
    }

    pub fn build(self) -> ContainerConfig {
        self.config
    }
}

/// The storage seam between projection transforms and registers.
///
/// Transforms read and write registers by index through [`register_mut`] and erase a register
/// when its value returns to the merge identity, so that sparse storage stays sparse.
///
/// [`register_mut`]: RegisterContainer::register_mut
pub trait RegisterContainer<R: Register>: Clone + fmt::Debug + PartialEq + Sized {
    /// The operator combining registers on merge.
    type Op: MergeOp<R>;

    /// Creates an empty container of `range_size` registers.
    fn with_config(range_size: usize, config: &ContainerConfig) -> Self;

    /// Short name of the container type.
    fn type_name() -> &'static str;

    /// Returns the merge operator.
    fn op(&self) -> &Self::Op;

    /// Returns the number of addressable registers.
    fn range_size(&self) -> usize;

    /// Returns the number of physically stored registers.
    fn len(&self) -> usize;

    /// Returns true if every register holds the merge identity.
    fn is_empty(&self) -> bool;

    /// Returns true if registers are stored sparsely.
    fn is_sparse(&self) -> bool;

    /// Returns a mutable reference to register `index`, materializing it if needed.
    fn register_mut(&mut self, index: u64) -> &mut R;

    /// Returns the value of register `index`.
    fn get(&self, index: u64) -> R;

    /// Drops register `index` from sparse storage.
    fn erase(&mut self, index: u64);

    fn compactify(&mut self);

    fn is_compact(&self) -> bool;

    /// Resets every register to the merge identity.
    fn clear(&mut self);

    /// Merges `other` into this container register by register.
    fn merge(&mut self, other: &Self) -> Result<(), Error>;

    /// Returns every register in index order.
    fn to_dense_vector(&self) -> Result<Vec<R>, Error>;

    /// Serializes a compact container.
    fn serialize(&self) -> Result<Vec<u8>, Error>;

    /// Deserializes a container serialized by [`serialize`](Self::serialize).
    fn deserialize(bytes: &[u8]) -> Result<Self, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ContainerConfig::default();
        assert_eq!(config.compaction_threshold(), 100);
        assert_eq!(config.promotion_threshold(), 4096);
    }

    #[test]
    fn test_config_builder() {
        let config = ContainerConfig::builder()
            .compaction_threshold(8)
            .promotion_threshold(64)
            .build();
        assert_eq!(config.compaction_threshold(), 8);
        assert_eq!(config.promotion_threshold(), 64);
    }

    #[test]
    #[should_panic(expected = "promotion_threshold must be positive")]
    fn test_config_builder_rejects_zero() {
        let _ = ContainerConfig::builder().promotion_threshold(0);
    }
}
