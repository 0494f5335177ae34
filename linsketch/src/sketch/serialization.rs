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

//! A sketch image is the container preamble with the sketch family id, followed by
//!
//! ```text
//! u8   transform kind
//! u8   hash id
//! u64  tile size
//! u64  replication count
//! u64  seed
//! u64  length of the container image
//! ...  container image
//! ```

use std::sync::Arc;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::assert::insufficient_data;
use crate::codec::family::Family;
use crate::container::RegisterContainer;
use crate::container::serialization::PREAMBLE_BYTES;
use crate::container::serialization::read_preamble;
use crate::container::serialization::read_usize;
use crate::container::serialization::write_preamble;
use crate::error::Error;
use crate::register::Register;
use crate::sketch::Sketch;
use crate::transform::Transform;
use crate::transform::TransformKind;
use crate::transform::TransformParams;

const TRANSFORM_BYTES: usize = 2 + 3 * 8;

fn read_transform_params(cursor: &mut SketchSlice<'_>) -> Result<TransformParams, Error> {
    let kind = cursor.read_u8().map_err(insufficient_data("transform_kind"))?;
    let hash_id = cursor.read_u8().map_err(insufficient_data("hash_id"))?;
    let tile_size = cursor.read_u64_le().map_err(insufficient_data("tile_size"))?;
    let replication_count = cursor
        .read_u64_le()
        .map_err(insufficient_data("replication_count"))?;
    let seed = cursor.read_u64_le().map_err(insufficient_data("seed"))?;
    Ok(TransformParams {
        kind: TransformKind::from_id(kind)?,
        hash_id,
        tile_size,
        replication_count,
        seed,
    })
}

impl<R, T, C> Sketch<R, T, C>
where
    R: Register,
    T: Transform,
    C: RegisterContainer<R>,
{
    /// Serializes the transform parameters and the registers. Sparse storage must be compact.
    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        let container = self.container().serialize()?;
        let params = self.transform().params();

        let mut bytes =
            SketchBytes::with_capacity(PREAMBLE_BYTES + TRANSFORM_BYTES + 8 + container.len());
        write_preamble::<R>(&mut bytes, Family::SKETCH, 0);
        bytes.write_u8(params.kind as u8);
        bytes.write_u8(params.hash_id);
        bytes.write_u64_le(params.tile_size);
        bytes.write_u64_le(params.replication_count);
        bytes.write_u64_le(params.seed);
        bytes.write_u64_le(container.len() as u64);
        bytes.write(&container);
        Ok(bytes.into_bytes())
    }

    /// Deserializes a sketch, rebuilding its transform from the stored parameters.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let (params, registers) = Self::read_parts(bytes)?;
        let transform = Arc::new(T::from_params(&params)?);
        Self::assemble(transform, registers)
    }

    /// Deserializes a sketch that must have been built with `transform`, sharing it instead
    /// of rebuilding a copy.
    pub fn deserialize_with_transform(bytes: &[u8], transform: Arc<T>) -> Result<Self, Error> {
        let (params, registers) = Self::read_parts(bytes)?;
        if params != transform.params() {
            return Err(Error::deserial(format!(
                "serialized transform {:?} does not match {}",
                params,
                transform.description()
            )));
        }
        Self::assemble(transform, registers)
    }

    fn read_parts(bytes: &[u8]) -> Result<(TransformParams, C), Error> {
        let mut cursor = SketchSlice::new(bytes);
        read_preamble::<R>(&mut cursor, Family::SKETCH)?;
        let params = read_transform_params(&mut cursor)?;
        let container_len = read_usize(&mut cursor, "container_len")?;
        if container_len != cursor.remaining() {
            return Err(Error::insufficient_data(format!(
                "container: expected {container_len} bytes, got {}",
                cursor.remaining()
            )));
        }
        let offset = bytes.len() - container_len;
        let registers = C::deserialize(&bytes[offset..])?;
        Ok((params, registers))
    }

    fn assemble(transform: Arc<T>, registers: C) -> Result<Self, Error> {
        if registers.range_size() != transform.range_size() {
            return Err(Error::deserial(format!(
                "container range size {} does not match transform range size {}",
                registers.range_size(),
                transform.range_size()
            )));
        }
        Ok(Self::from_parts(transform, registers))
    }
}
