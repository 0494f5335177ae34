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
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::container::ContainerConfig;
use crate::container::RegisterContainer;
use crate::error::Error;
use crate::register::Register;
use crate::transform::Transform;

/// A linear sketch: a shared [`Transform`] writing into a register container `C`.
///
/// Cloning a sketch copies its registers and shares its transform.
pub struct Sketch<R, T, C> {
    transform: Arc<T>,
    registers: C,
    _register: PhantomData<fn() -> R>,
}

impl<R, T, C> Sketch<R, T, C>
where
    R: Register,
    T: Transform,
    C: RegisterContainer<R>,
{
    /// Creates an empty sketch with the default container configuration.
    pub fn new(transform: Arc<T>) -> Self {
        Self::with_config(transform, &ContainerConfig::default())
    }

    pub fn with_config(transform: Arc<T>, config: &ContainerConfig) -> Self {
        let registers = C::with_config(transform.range_size(), config);
        Self::from_parts(transform, registers)
    }

    pub(crate) fn from_parts(transform: Arc<T>, registers: C) -> Self {
        Self {
            transform,
            registers,
            _register: PhantomData,
        }
    }

    /// Returns a builder for configuring the container.
    pub fn builder(transform: Arc<T>) -> SketchBuilder<R, T, C> {
        SketchBuilder {
            transform,
            config: ContainerConfig::default(),
            _marker: PhantomData,
        }
    }

    /// Adds one occurrence of `item`.
    pub fn insert(&mut self, item: u64) {
        self.transform.apply(&mut self.registers, item, R::ONE);
    }

    /// Adds `multiplicity` occurrences of `item`. Negative multiplicities remove occurrences.
    pub fn insert_with_multiplicity(&mut self, item: u64, multiplicity: R) {
        self.transform
            .apply(&mut self.registers, item, multiplicity);
    }

    pub fn compactify(&mut self) {
        self.registers.compactify();
    }

    pub fn is_compact(&self) -> bool {
        self.registers.is_compact()
    }

    pub fn transform(&self) -> &Arc<T> {
        &self.transform
    }

    pub fn container(&self) -> &C {
        &self.registers
    }

    pub fn range_size(&self) -> usize {
        self.transform.range_size()
    }

    /// Returns the number of stored registers.
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn is_sparse(&self) -> bool {
        self.registers.is_sparse()
    }

    /// Returns true if both sketches project with equal transforms.
    pub fn same_transform(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.transform, &other.transform) || *self.transform == *other.transform
    }

    /// Merges `other` into this sketch.
    ///
    /// Fails if the transforms differ or if the container merge fails. On error this sketch
    /// is not modified.
    pub fn merge(&mut self, other: &Self) -> Result<(), Error> {
        if !self.same_transform(other) {
            debug!(
                lhs = %self.transform.description(),
                rhs = %other.transform.description(),
                "refusing to merge sketches with different transforms"
            );
            return Err(Error::invalid_argument(format!(
                "cannot merge sketches with different transforms: ({}) and ({})",
                self.transform.description(),
                other.transform.description()
            )));
        }
        self.registers.merge(&other.registers)
    }

    /// Returns the merge of both sketches.
    pub fn merged(&self, other: &Self) -> Result<Self, Error> {
        let mut ret = self.clone();
        ret.merge(other)?;
        Ok(ret)
    }

    /// Returns every register in index order. Sparse storage must be compact.
    pub fn to_dense_vector(&self) -> Result<Vec<R>, Error> {
        self.registers.to_dense_vector()
    }

    /// Returns the sum of squared registers, an estimate of the squared norm of the stream's
    /// frequency vector scaled by the transform's replication.
    pub fn squared_norm(&self) -> Result<f64, Error> {
        Ok(self
            .to_dense_vector()?
            .into_iter()
            .map(|r| r.to_f64() * r.to_f64())
            .sum())
    }

    /// Describes the register type, container and transform.
    pub fn description(&self) -> String {
        format!(
            "{} {} with {}",
            C::type_name(),
            R::TYPE_NAME,
            self.transform.description()
        )
    }
}

impl<R, T, C: Clone> Clone for Sketch<R, T, C> {
    fn clone(&self) -> Self {
        Self {
            transform: Arc::clone(&self.transform),
            registers: self.registers.clone(),
            _register: PhantomData,
        }
    }
}

impl<R, T, C> PartialEq for Sketch<R, T, C>
where
    R: Register,
    T: Transform,
    C: RegisterContainer<R>,
{
    fn eq(&self, other: &Self) -> bool {
        self.same_transform(other) && self.registers == other.registers
    }
}

impl<R, T: fmt::Debug, C: fmt::Debug> fmt::Debug for Sketch<R, T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sketch")
            .field("transform", &self.transform)
            .field("registers", &self.registers)
            .finish()
    }
}

impl<R, T, C: fmt::Display> fmt::Display for Sketch<R, T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.registers)
    }
}

/// Builder for [`Sketch`].
#[derive(Debug)]
pub struct SketchBuilder<R, T, C> {
    transform: Arc<T>,
    config: ContainerConfig,
    _marker: PhantomData<fn() -> (R, C)>,
}

impl<R, T, C> SketchBuilder<R, T, C>
where
    R: Register,
    T: Transform,
    C: RegisterContainer<R>,
{
    /// Sets the number of staged entries that triggers a compaction.
    ///
    /// # Panics
    ///
    /// Panics if `threshold` is zero.
    pub fn compaction_threshold(mut self, threshold: usize) -> Self {
        self.config = ContainerConfig::builder()
            .compaction_threshold(threshold)
            .promotion_threshold(self.config.promotion_threshold())
            .build();
        self
    }

    /// Sets the number of live sparse registers that triggers promotion.
    ///
    /// # Panics
    ///
    /// Panics if `threshold` is zero.
    pub fn promotion_threshold(mut self, threshold: usize) -> Self {
        self.config = ContainerConfig::builder()
            .compaction_threshold(self.config.compaction_threshold())
            .promotion_threshold(threshold)
            .build();
        self
    }

    /// Replaces the whole container configuration.
    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Sketch<R, T, C> {
        Sketch::with_config(self.transform, &self.config)
    }
}
