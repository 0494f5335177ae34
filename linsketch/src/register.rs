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

//! Register values and the operators that merge them.

use std::fmt;

use crate::error::Error;

mod private {
    // Sealed trait to prevent external implementations of Register.
    pub trait Sealed {}
}

/// Numeric type held by each register of a sketch.
///
/// Integer registers use wrapping arithmetic, so the additive merge is an exact abelian group
/// and merging is insensitive to order even when intermediate sums overflow.
pub trait Register:
    private::Sealed
    + Copy
    + Default
    + PartialEq
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
{
    /// The additive identity. A register holding this value is considered absent.
    const ZERO: Self;

    /// One value for unit updates.
    const ONE: Self;

    /// Tag identifying the register type in serialized images.
    const TAG: u8;

    /// Name of the register type, used in descriptions and error messages.
    const TYPE_NAME: &'static str;

    /// Performs the + operation.
    fn add(self, other: Self) -> Self;

    /// Computes `-self`.
    fn neg(self) -> Self;

    /// Converts from `i64`, truncating integers to the register width.
    fn from_i64(value: i64) -> Self;

    /// Converts into `f64`.
    fn to_f64(self) -> f64;

    /// Returns the little-endian 8-byte encoding.
    fn to_bytes(self) -> [u8; 8];

    /// Decodes the little-endian 8-byte encoding.
    fn try_from_bytes(bytes: [u8; 8]) -> Result<Self, Error>;
}

macro_rules! impl_integer {
    ($name:ty, $tag:expr) => {
        impl private::Sealed for $name {}

        impl Register for $name {
            const ZERO: Self = 0;
            const ONE: Self = 1;
            const TAG: u8 = $tag;
            const TYPE_NAME: &'static str = stringify!($name);

            #[inline(always)]
            fn add(self, other: Self) -> Self {
                self.wrapping_add(other)
            }

            #[inline(always)]
            fn neg(self) -> Self {
                self.wrapping_neg()
            }

            #[inline(always)]
            fn from_i64(value: i64) -> Self {
                value as $name
            }

            #[inline(always)]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline(always)]
            fn to_bytes(self) -> [u8; 8] {
                (self as i64).to_le_bytes()
            }

            #[inline(always)]
            fn try_from_bytes(bytes: [u8; 8]) -> Result<Self, Error> {
                let value = i64::from_le_bytes(bytes);
                <$name>::try_from(value).map_err(|_| {
                    Error::deserial(format!(
                        "value {} out of range for {}",
                        value,
                        stringify!($name)
                    ))
                })
            }
        }
    };
}

impl_integer!(i8, 1);
impl_integer!(i16, 2);
impl_integer!(i32, 3);
impl_integer!(i64, 4);

macro_rules! impl_float {
    ($name:ty, $tag:expr) => {
        impl private::Sealed for $name {}

        impl Register for $name {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            const TAG: u8 = $tag;
            const TYPE_NAME: &'static str = stringify!($name);

            #[inline(always)]
            fn add(self, other: Self) -> Self {
                self + other
            }

            #[inline(always)]
            fn neg(self) -> Self {
                -self
            }

            #[inline(always)]
            fn from_i64(value: i64) -> Self {
                value as $name
            }

            #[inline(always)]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline(always)]
            fn to_bytes(self) -> [u8; 8] {
                (self as f64).to_le_bytes()
            }

            #[inline(always)]
            fn try_from_bytes(bytes: [u8; 8]) -> Result<Self, Error> {
                Ok(f64::from_le_bytes(bytes) as $name)
            }
        }
    };
}

impl_float!(f32, 5);
impl_float!(f64, 6);

/// An associative, commutative binary operator over registers with an identity element.
///
/// Containers use [`MergeOp::identity`] as the "absent" value: a sparse register whose merged
/// value equals the identity is dropped.
pub trait MergeOp<R: Register>:
    fmt::Debug + Clone + Default + PartialEq + Send + Sync + 'static
{
    /// Returns the identity element of the operator.
    fn identity(&self) -> R {
        R::ZERO
    }

    /// Combines two register values.
    fn merge(&self, lhs: R, rhs: R) -> R;

    /// Returns the name of the operator.
    fn name(&self) -> &'static str;
}

/// Register-wise addition, the merge operator of linear sketches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sum;

impl<R: Register> MergeOp<R> for Sum {
    #[inline(always)]
    fn merge(&self, lhs: R, rhs: R) -> R {
        lhs.add(rhs)
    }

    fn name(&self) -> &'static str {
        "Sum"
    }
}
