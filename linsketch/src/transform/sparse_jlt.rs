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
use crate::hash::wang64;
use crate::register::Register;
use crate::transform::Transform;
use crate::transform::TransformKind;
use crate::transform::TransformParams;
use crate::transform::update_register;

/// Most tiles accepted from a serialized image.
const MAX_REPLICATION_COUNT: usize = 1 << 16;

/// Registers spanned by `replication_count` tiles of `tile_size`, if that fits in `usize`.
fn checked_range_size(tile_size: u64, replication_count: usize) -> Option<usize> {
    usize::try_from(tile_size)
        .ok()
        .and_then(|size| size.checked_mul(replication_count))
}

/// A sparse Johnson-Lindenstrauss transform built from independent CountSketch tiles.
///
/// Tile `i` owns registers `i * tile_size..(i + 1) * tile_size`. The first tile uses the
/// given seed and each following tile uses [`wang64`] of the previous seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseJlt<H = MulAddShift> {
    tiles: Vec<CountSketchHash<H>>,
}

impl<H: RangeHash> SparseJlt<H> {
    /// Creates `replication_count` tiles of `tile_size` registers, rounded up to a power of
    /// two.
    ///
    /// # Panics
    ///
    /// Panics if `replication_count` is zero or if the total number of registers overflows
    /// `usize`.
    pub fn new(tile_size: u64, replication_count: usize, seed: u64) -> Self {
        assert!(replication_count > 0, "replication_count must be positive");
        let first = CountSketchHash::new(tile_size, seed);
        assert!(
            checked_range_size(first.size(), replication_count).is_some(),
            "{replication_count} tiles of {} registers overflow usize",
            first.size()
        );
        let mut tiles = Vec::with_capacity(replication_count);
        tiles.push(first);
        let mut seed = wang64(seed);
        for _ in 1..replication_count {
            tiles.push(CountSketchHash::new(tile_size, seed));
            seed = wang64(seed);
        }
        Self { tiles }
    }

    /// Registers per tile.
    pub fn tile_size(&self) -> u64 {
        self.tiles[0].size()
    }

    pub fn replication_count(&self) -> usize {
        self.tiles.len()
    }

    /// Seed of the first tile.
    pub fn seed(&self) -> u64 {
        self.tiles[0].seed()
    }

    /// Factor by which the norm of the registers overestimates the norm of the input.
    pub fn scaling_factor(&self) -> f64 {
        (self.tiles.len() as f64).sqrt()
    }
}

impl<H: RangeHash> Transform for SparseJlt<H> {
    fn range_size(&self) -> usize {
        (self.tile_size() as usize) * self.tiles.len()
    }

    fn apply<R, C>(&self, registers: &mut C, item: u64, multiplicity: R)
    where
        R: Register,
        C: RegisterContainer<R>,
    {
        let tile_size = self.tile_size();
        for (i, tile) in self.tiles.iter().enumerate() {
            let (index, polarity) = tile.hash(item);
            let index = index + i as u64 * tile_size;
            update_register(registers, index, polarity.apply(multiplicity));
        }
    }

    fn name(&self) -> &'static str {
        "SparseJlt"
    }

    fn description(&self) -> String {
        format!(
            "SparseJlt with {} tiles of {} registers using {} (seed {})",
            self.tiles.len(),
            self.tile_size(),
            H::NAME,
            self.seed()
        )
    }

    fn params(&self) -> TransformParams {
        TransformParams {
            kind: TransformKind::SparseJlt,
            hash_id: H::ID,
            tile_size: self.tile_size(),
            replication_count: self.tiles.len() as u64,
            seed: self.seed(),
        }
    }

    fn from_params(params: &TransformParams) -> Result<Self, Error> {
        if params.kind != TransformKind::SparseJlt {
            return Err(Error::deserial(format!(
                "expected SparseJlt parameters, got {:?}",
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
        let replication_count = usize::try_from(params.replication_count)
            .ok()
            .filter(|count| (1..=MAX_REPLICATION_COUNT).contains(count));
        match replication_count {
            Some(count)
                if params.tile_size.is_power_of_two()
                    && checked_range_size(params.tile_size, count).is_some() =>
            {
                Ok(Self::new(params.tile_size, count, params.seed))
            }
            _ => Err(Error::deserial(format!(
                "invalid SparseJlt shape: {} x {}",
                params.replication_count, params.tile_size
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::DenseContainer;
    use crate::container::SparseContainer;

    #[test]
    fn test_each_tile_gets_one_update() {
        let transform = SparseJlt::<MulAddShift>::new(8, 4, 5);
        assert_eq!(transform.range_size(), 32);
        let mut registers = DenseContainer::<i64>::new(32);
        transform.apply(&mut registers, 1234, 1i64);
        for tile in registers.registers().chunks(8) {
            assert_eq!(tile.iter().map(|r| r.abs()).sum::<i64>(), 1);
        }
    }

    #[test]
    fn test_tile_seeds_are_chained() {
        let transform = SparseJlt::<MulAddShift>::new(8, 3, 5);
        let single = SparseJlt::<MulAddShift>::new(8, 1, wang64(5));
        let (index, polarity) = single.tiles[0].hash(77);
        assert_eq!(transform.tiles[1].hash(77), (index, polarity));
    }

    #[test]
    fn test_cancellation_erases_registers() {
        let transform = SparseJlt::<MulAddShift>::new(16, 3, 9);
        let mut registers = SparseContainer::<i32>::new(transform.range_size(), 4);
        transform.apply(&mut registers, 5, 2i32);
        transform.apply(&mut registers, 6, 1i32);
        transform.apply(&mut registers, 5, -2i32);
        transform.apply(&mut registers, 6, -1i32);
        assert!(registers.is_empty());
    }

    #[test]
    #[should_panic(expected = "replication_count must be positive")]
    fn test_zero_replications() {
        SparseJlt::<MulAddShift>::new(8, 0, 1);
    }

    #[test]
    #[should_panic(expected = "overflow usize")]
    fn test_register_count_overflow() {
        SparseJlt::<MulAddShift>::new(1 << 62, 8, 1);
    }

    #[test]
    fn test_from_params_rejects_oversized_shapes() {
        let mut params = SparseJlt::<MulAddShift>::new(8, 2, 1).params();
        params.tile_size = 1 << 62;
        params.replication_count = 8;
        let err = SparseJlt::<MulAddShift>::from_params(&params).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidData);

        params.tile_size = 4;
        params.replication_count = 1 << 40;
        assert!(SparseJlt::<MulAddShift>::from_params(&params).is_err());

        params.replication_count = 3;
        assert_eq!(
            SparseJlt::<MulAddShift>::from_params(&params)
                .unwrap()
                .range_size(),
            12
        );
    }
}
