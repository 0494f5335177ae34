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

//! Seeded hash functions onto power-of-two ranges.
//!
//! Every hash rounds its requested range up to the next power of two `2^k` and keeps the top
//! `k` bits of a 64-bit mix. Random parameters are drawn from a [`StdRng`] seeded with
//! [`wang64`] of the user seed, so equal seeds give equal functions.

use std::fmt;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::register::Register;

/// Seed used when none is given.
pub const DEFAULT_SEED: u64 = 1082087245;

/// Thomas Wang's 64-bit integer mix.
pub const fn wang64(x: u64) -> u64 {
    let mut y = (!x).wrapping_add(x << 21);
    y ^= y >> 24;
    y = y.wrapping_add(y << 3).wrapping_add(y << 8);
    y ^= y >> 14;
    y = y.wrapping_add(y << 2).wrapping_add(y << 4);
    y ^= y >> 28;
    y.wrapping_add(y << 31)
}

/// Returns `ceil(log2(value))`, with a floor of 1.
pub const fn ceil_log2(value: u64) -> u32 {
    if value < 2 {
        return 1;
    }
    let floor = 63 - value.leading_zeros();
    if value.is_power_of_two() {
        floor
    } else {
        floor + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RangeBits {
    shift: u32,
    seed: u64,
}

impl RangeBits {
    fn new(range: u64, seed: u64) -> Self {
        assert!(range <= 1 << 63, "hash range {range} exceeds 2^63");
        Self {
            shift: 64 - ceil_log2(range),
            seed,
        }
    }

    #[inline(always)]
    fn truncate(&self, value: u64) -> u64 {
        value >> self.shift
    }

    fn size(&self) -> u64 {
        1 << (64 - self.shift)
    }
}

fn parameter_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(wang64(seed))
}

/// A seeded hash function onto `0..size()`.
pub trait RangeHash: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Identifies the hash family in serialized images.
    const ID: u8;

    const NAME: &'static str;

    /// Creates a hash onto `range` rounded up to a power of two.
    ///
    /// # Panics
    ///
    /// Panics if `range` exceeds `2^63`.
    fn new(range: u64, seed: u64) -> Self;

    fn hash(&self, x: u64) -> u64;

    /// Size of the output range, a power of two.
    fn size(&self) -> u64;

    fn seed(&self) -> u64;
}

/// Thomas Wang's mix, truncated to the range. The seed is recorded but unused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WangHash {
    bits: RangeBits,
}

impl RangeHash for WangHash {
    const ID: u8 = 1;
    const NAME: &'static str = "WangHash";

    fn new(range: u64, seed: u64) -> Self {
        Self {
            bits: RangeBits::new(range, seed),
        }
    }

    #[inline(always)]
    fn hash(&self, x: u64) -> u64 {
        self.bits.truncate(wang64(x))
    }

    fn size(&self) -> u64 {
        self.bits.size()
    }

    fn seed(&self) -> u64 {
        self.bits.seed
    }
}

/// Multiply-shift hashing with a random odd multiplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulShift {
    bits: RangeBits,
    multiplier: u64,
}

impl MulShift {
    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }
}

impl RangeHash for MulShift {
    const ID: u8 = 2;
    const NAME: &'static str = "MulShift";

    fn new(range: u64, seed: u64) -> Self {
        let mut rng = parameter_rng(seed);
        Self {
            bits: RangeBits::new(range, seed),
            multiplier: rng.random::<u64>() | 1,
        }
    }

    #[inline(always)]
    fn hash(&self, x: u64) -> u64 {
        self.bits.truncate(self.multiplier.wrapping_mul(x))
    }

    fn size(&self) -> u64 {
        self.bits.size()
    }

    fn seed(&self) -> u64 {
        self.bits.seed
    }
}

/// Multiply-add-shift hashing with a random odd multiplier and a random summand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulAddShift {
    bits: RangeBits,
    multiplier: u64,
    summand: u64,
}

impl MulAddShift {
    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }

    pub fn summand(&self) -> u64 {
        self.summand
    }
}

impl RangeHash for MulAddShift {
    const ID: u8 = 3;
    const NAME: &'static str = "MulAddShift";

    fn new(range: u64, seed: u64) -> Self {
        let mut rng = parameter_rng(seed);
        let multiplier = rng.random::<u64>() | 1;
        let summand = rng.random::<u64>();
        Self {
            bits: RangeBits::new(range, seed),
            multiplier,
            summand,
        }
    }

    #[inline(always)]
    fn hash(&self, x: u64) -> u64 {
        self.bits
            .truncate(self.multiplier.wrapping_mul(x).wrapping_add(self.summand))
    }

    fn size(&self) -> u64 {
        self.bits.size()
    }

    fn seed(&self) -> u64 {
        self.bits.seed
    }
}

/// Sign applied to an update by a [`CountSketchHash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    #[inline(always)]
    pub fn apply<R: Register>(self, value: R) -> R {
        match self {
            Polarity::Positive => value,
            Polarity::Negative => value.neg(),
        }
    }
}

/// A register hash paired with an independent sign hash.
///
/// The sign hash is seeded with [`wang64`] of the register hash's seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountSketchHash<H = MulAddShift> {
    register: H,
    polarity: H,
}

impl<H: RangeHash> CountSketchHash<H> {
    pub fn new(range: u64, seed: u64) -> Self {
        Self {
            register: H::new(range, seed),
            polarity: H::new(2, wang64(seed)),
        }
    }

    /// Returns the register index and sign of `x`.
    #[inline(always)]
    pub fn hash(&self, x: u64) -> (u64, Polarity) {
        let polarity = if self.polarity.hash(x) == 1 {
            Polarity::Positive
        } else {
            Polarity::Negative
        };
        (self.register.hash(x), polarity)
    }

    pub fn size(&self) -> u64 {
        self.register.size()
    }

    pub fn seed(&self) -> u64 {
        self.register.seed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wang64_reference_values() {
        assert_eq!(wang64(0), 8633297058295171728);
        assert_eq!(wang64(1), 6614235796240398542);
        assert_eq!(wang64(DEFAULT_SEED), 2737549329525698583);
    }

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(0), 1);
        assert_eq!(ceil_log2(1), 1);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(1024), 10);
        assert_eq!(ceil_log2(1025), 11);
        assert_eq!(ceil_log2(u64::MAX), 64);
    }

    fn check_range<H: RangeHash>() {
        let hash = H::new(1000, DEFAULT_SEED);
        assert_eq!(hash.size(), 1024);
        assert_eq!(hash.seed(), DEFAULT_SEED);
        for x in 0..10_000u64 {
            assert!(hash.hash(x) < 1024);
        }
        assert_eq!(hash, H::new(1000, DEFAULT_SEED));
    }

    #[test]
    fn test_hash_ranges() {
        check_range::<WangHash>();
        check_range::<MulShift>();
        check_range::<MulAddShift>();
    }

    #[test]
    fn test_multiplier_is_odd() {
        for seed in 0..64 {
            assert_eq!(MulShift::new(16, seed).multiplier() % 2, 1);
            assert_eq!(MulAddShift::new(16, seed).multiplier() % 2, 1);
        }
    }

    #[test]
    fn test_seeds_give_different_functions() {
        let lhs = MulAddShift::new(1 << 20, 1);
        let rhs = MulAddShift::new(1 << 20, 2);
        assert_ne!(lhs, rhs);
        let differing = (0..100u64).filter(|x| lhs.hash(*x) != rhs.hash(*x)).count();
        assert!(differing > 90);
    }

    #[test]
    fn test_count_sketch_polarity_is_balanced() {
        let hash = CountSketchHash::<MulAddShift>::new(64, DEFAULT_SEED);
        assert_eq!(hash.size(), 64);
        let positive = (0..10_000u64)
            .filter(|x| hash.hash(*x).1 == Polarity::Positive)
            .count();
        assert!((4_000..6_000).contains(&positive), "positive = {positive}");
    }

    #[test]
    fn test_polarity_apply() {
        assert_eq!(Polarity::Positive.apply(3i32), 3);
        assert_eq!(Polarity::Negative.apply(3i32), -3);
        assert_eq!(Polarity::Negative.apply(1.5f64), -1.5);
    }
}
