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

use crate::container::RegisterContainer;
use crate::error::Error;
use crate::hash::CountSketchHash;
use crate::hash::MulAddShift;
use crate::hash::RangeHash;
use crate::register::Register;
use crate::transform::Transform;
use crate::transform::TransformKind;
use crate::transform::TransformParams;
use crate::transform::update_register;

/// The CountSketch projection: each item adds `±multiplicity` to one register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountSketch<H = MulAddShift> {
    hash: CountSketchHash<H>,
}

impl<H: RangeHash> CountSketch<H> {
    /// Creates a projection onto `range_size` registers, rounded up to a power of two.
    pub fn new(range_size: u64, seed: u64) -> Self {
        Self {
            hash: CountSketchHash::new(range_size, seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.hash.seed()
    }

    pub fn hash(&self) -> &CountSketchHash<H> {
        &self.hash
    }
}

impl<H: RangeHash> Transform for CountSketch<H> {
    fn range_size(&self) -> usize {
        self.hash.size() as usize
    }

    fn apply<R, C>(&self, registers: &mut C, item: u64, multiplicity: R)
    where
        R: Register,
        C: RegisterContainer<R>,
    {
        let (index, polarity) = self.hash.hash(item);
        update_register(registers, index, polarity.apply(multiplicity));
    }

    fn name(&self) -> &'static str {
        "CountSketch"
    }

    fn description(&self) -> String {
        format!(
            "CountSketch onto {} registers using {} (seed {})",
            self.hash.size(),
            H::NAME,
            self.seed()
        )
    }

    fn params(&self) -> TransformParams {
        TransformParams {
            kind: TransformKind::CountSketch,
            hash_id: H::ID,
            tile_size: self.hash.size(),
            replication_count: 1,
            seed: self.seed(),
        }
    }

    fn from_params(params: &TransformParams) -> Result<Self, Error> {
        if params.kind != TransformKind::CountSketch {
            return Err(Error::deserial(format!(
                "expected CountSketch parameters, got {:?}",
                params.kind
            )));
        }
        if params.hash_id != H::ID {
            return Err(Error::deserial(format!(
                "hash mismatch: expected {} ({}), got {}",
                H::ID,
                H::NAME,
                params.hash_id
            )));
        }
        if params.replication_count != 1 || !params.tile_size.is_power_of_two() {
            return Err(Error::deserial(format!(
                "invalid CountSketch shape: {} x {}",
                params.replication_count, params.tile_size
            )));
        }
        Ok(Self::new(params.tile_size, params.seed))
    }
}
