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

//! Binary images of the register containers.
//!
//! Every image starts with an 8-byte preamble:
//!
//! ```text
//! byte 0      serial version
//! byte 1      family id
//! byte 2      flags (bit 0: empty, bit 1: dense storage)
//! byte 3      register type tag
//! bytes 4..8  reserved
//! ```
//!
//! followed by little-endian `u64` parameters and either `(index, value)` pairs in ascending
//! index order or one value per register. Values always take 8 bytes.

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::assert::ensure_fully_consumed;
use crate::codec::assert::ensure_payload_len;
use crate::codec::assert::ensure_register_tag_is;
use crate::codec::assert::ensure_serial_version_is;
use crate::codec::assert::insufficient_data;
use crate::codec::family::Family;
use crate::container::CompactingMap;
use crate::container::DenseContainer;
use crate::container::PromotableContainer;
use crate::container::SparseContainer;
use crate::container::promotable::Storage;
use crate::container::staging::StagingMap;
use crate::error::Error;
use crate::register::MergeOp;
use crate::register::Register;

pub(crate) const SERIAL_VERSION: u8 = 1;
pub(crate) const PREAMBLE_BYTES: usize = 8;

const FLAG_EMPTY: u8 = 1 << 0;
const FLAG_DENSE: u8 = 1 << 1;

const ENTRY_BYTES: usize = 16;
const VALUE_BYTES: usize = 8;

pub(crate) fn write_preamble<R: Register>(bytes: &mut SketchBytes, family: Family, flags: u8) {
    bytes.write_u8(SERIAL_VERSION);
    bytes.write_u8(family.id);
    bytes.write_u8(flags);
    bytes.write_u8(R::TAG);
    bytes.write_u32_le(0);
}

/// Reads and validates the preamble, returning the flags byte.
pub(crate) fn read_preamble<R: Register>(
    cursor: &mut SketchSlice<'_>,
    family: Family,
) -> Result<u8, Error> {
    let serial_version = cursor
        .read_u8()
        .map_err(insufficient_data("serial_version"))?;
    let family_id = cursor.read_u8().map_err(insufficient_data("family_id"))?;
    let flags = cursor.read_u8().map_err(insufficient_data("flags"))?;
    let register_tag = cursor.read_u8().map_err(insufficient_data("register_tag"))?;
    cursor.read_u32_le().map_err(insufficient_data("reserved"))?;

    family.validate_id(family_id)?;
    ensure_serial_version_is(SERIAL_VERSION, serial_version)?;
    ensure_register_tag_is(R::TAG, register_tag, R::TYPE_NAME)?;
    Ok(flags)
}

pub(crate) fn read_usize(cursor: &mut SketchSlice<'_>, tag: &'static str) -> Result<usize, Error> {
    let value = cursor.read_u64_le().map_err(insufficient_data(tag))?;
    usize::try_from(value)
        .map_err(|_| Error::deserial(format!("{tag} {value} overflows usize")))
}

/// Largest range whose dense vector of 8-byte registers stays addressable.
const MAX_RANGE_SIZE: usize = isize::MAX as usize / VALUE_BYTES;

fn read_range_size(cursor: &mut SketchSlice<'_>) -> Result<usize, Error> {
    let range_size = read_usize(cursor, "range_size")?;
    if range_size > MAX_RANGE_SIZE {
        return Err(Error::deserial(format!(
            "range_size {range_size} exceeds {MAX_RANGE_SIZE}"
        )));
    }
    Ok(range_size)
}

fn read_threshold(cursor: &mut SketchSlice<'_>, tag: &'static str) -> Result<usize, Error> {
    let threshold = read_usize(cursor, tag)?;
    if threshold == 0 {
        return Err(Error::deserial(format!("{tag} must be positive")));
    }
    Ok(threshold)
}

fn empty_flag(is_empty: bool) -> u8 {
    if is_empty { FLAG_EMPTY } else { 0 }
}

fn ensure_empty_flag(flags: u8, is_empty: bool) -> Result<(), Error> {
    if (flags & FLAG_EMPTY != 0) == is_empty {
        Ok(())
    } else {
        Err(Error::deserial(format!(
            "empty flag is {} but payload is {}",
            flags & FLAG_EMPTY != 0,
            if is_empty { "empty" } else { "not empty" }
        )))
    }
}

fn write_entries<R: Register>(bytes: &mut SketchBytes, entries: &[(u64, R)]) {
    bytes.write_u64_le(entries.len() as u64);
    for (index, value) in entries {
        bytes.write_u64_le(*index);
        bytes.write(&value.to_bytes());
    }
}

/// Reads `(index, value)` pairs, checking that indices strictly ascend, stay below
/// `range_size` when given, and that no value equals `absent` when given.
fn read_entries<R: Register>(
    cursor: &mut SketchSlice<'_>,
    range_size: Option<usize>,
    absent: Option<R>,
) -> Result<Vec<(u64, R)>, Error> {
    let num_entries = cursor
        .read_u64_le()
        .map_err(insufficient_data("num_entries"))?;
    let num_entries = ensure_payload_len(num_entries, ENTRY_BYTES, cursor.remaining(), "entries")?;

    let mut entries: Vec<(u64, R)> = Vec::with_capacity(num_entries);
    for _ in 0..num_entries {
        let index = cursor.read_u64_le().map_err(insufficient_data("index"))?;
        let value = cursor.read_array8().map_err(insufficient_data("value"))?;
        let value = R::try_from_bytes(value)?;

        if let Some(&(previous, _)) = entries.last() {
            if previous >= index {
                return Err(Error::deserial(format!(
                    "indices must be strictly ascending: {index} follows {previous}"
                )));
            }
        }
        if let Some(range_size) = range_size {
            if index >= range_size as u64 {
                return Err(Error::deserial(format!(
                    "index {index} out of range {range_size}"
                )));
            }
        }
        if absent == Some(value) {
            return Err(Error::deserial(format!(
                "index {index} stores the merge identity"
            )));
        }
        entries.push((index, value));
    }
    Ok(entries)
}

fn write_registers<R: Register>(bytes: &mut SketchBytes, registers: &[R]) {
    for value in registers {
        bytes.write(&value.to_bytes());
    }
}

fn read_registers<R: Register>(
    cursor: &mut SketchSlice<'_>,
    range_size: usize,
) -> Result<Vec<R>, Error> {
    let count = ensure_payload_len(
        range_size as u64,
        VALUE_BYTES,
        cursor.remaining(),
        "registers",
    )?;
    let mut registers = Vec::with_capacity(count);
    for _ in 0..count {
        let value = cursor.read_array8().map_err(insufficient_data("register"))?;
        registers.push(R::try_from_bytes(value)?);
    }
    Ok(registers)
}

impl<R, M> CompactingMap<u64, R, M>
where
    R: Register,
    M: StagingMap<u64, R>,
{
    /// Serializes a compact map.
    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        let entries = self.iter()?.collect::<Vec<_>>();
        let mut bytes = SketchBytes::with_capacity(
            PREAMBLE_BYTES + 16 + entries.len() * ENTRY_BYTES,
        );
        write_preamble::<R>(
            &mut bytes,
            Family::COMPACTING_MAP,
            empty_flag(entries.is_empty()),
        );
        bytes.write_u64_le(self.compaction_threshold() as u64);
        write_entries(&mut bytes, &entries);
        Ok(bytes.into_bytes())
    }

    /// Deserializes a map serialized by [`serialize`](Self::serialize). The result is compact.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let flags = read_preamble::<R>(&mut cursor, Family::COMPACTING_MAP)?;
        let compaction_threshold = read_threshold(&mut cursor, "compaction_threshold")?;
        let entries = read_entries::<R>(&mut cursor, None, None)?;
        ensure_empty_flag(flags, entries.is_empty())?;
        ensure_fully_consumed(cursor.remaining())?;
        Ok(Self::from_sorted(compaction_threshold, entries))
    }
}

impl<R, Op, M> SparseContainer<R, Op, M>
where
    R: Register,
    Op: MergeOp<R>,
    M: StagingMap<u64, R>,
{
    /// Serializes a compact container.
    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        if !self.is_compact() {
            return Err(Error::not_compact("serialize"));
        }
        let entries = self.compacted_entries();
        let mut bytes = SketchBytes::with_capacity(
            PREAMBLE_BYTES + 24 + entries.len() * ENTRY_BYTES,
        );
        write_preamble::<R>(&mut bytes, Family::SPARSE, empty_flag(entries.is_empty()));
        bytes.write_u64_le(self.range_size() as u64);
        bytes.write_u64_le(self.compaction_threshold() as u64);
        write_entries(&mut bytes, entries);
        Ok(bytes.into_bytes())
    }

    /// Deserializes a container serialized by [`serialize`](Self::serialize).
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let flags = read_preamble::<R>(&mut cursor, Family::SPARSE)?;
        let range_size = read_range_size(&mut cursor)?;
        let compaction_threshold = read_threshold(&mut cursor, "compaction_threshold")?;
        let identity = Op::default().identity();
        let entries = read_entries(&mut cursor, Some(range_size), Some(identity))?;
        ensure_empty_flag(flags, entries.is_empty())?;
        ensure_fully_consumed(cursor.remaining())?;
        Ok(Self::from_map(
            range_size,
            CompactingMap::from_sorted(compaction_threshold, entries),
        ))
    }
}

impl<R, Op> DenseContainer<R, Op>
where
    R: Register,
    Op: MergeOp<R>,
{
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes =
            SketchBytes::with_capacity(PREAMBLE_BYTES + 8 + self.range_size() * VALUE_BYTES);
        write_preamble::<R>(
            &mut bytes,
            Family::DENSE,
            empty_flag(self.is_empty()) | FLAG_DENSE,
        );
        bytes.write_u64_le(self.range_size() as u64);
        write_registers(&mut bytes, self.registers());
        bytes.into_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let flags = read_preamble::<R>(&mut cursor, Family::DENSE)?;
        let range_size = read_range_size(&mut cursor)?;
        let registers = read_registers(&mut cursor, range_size)?;
        ensure_fully_consumed(cursor.remaining())?;
        let dense = Self::from_registers(registers);
        ensure_empty_flag(flags, dense.is_empty())?;
        Ok(dense)
    }
}

impl<R, Op, M> PromotableContainer<R, Op, M>
where
    R: Register,
    Op: MergeOp<R>,
    M: StagingMap<u64, R>,
{
    /// Serializes the container in its current mode. Sparse storage must be compact.
    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        if !self.is_compact() {
            return Err(Error::not_compact("serialize"));
        }
        let mut bytes = SketchBytes::with_capacity(PREAMBLE_BYTES + 32);
        let mode_flag = if self.is_sparse() { 0 } else { FLAG_DENSE };
        write_preamble::<R>(
            &mut bytes,
            Family::PROMOTABLE,
            empty_flag(self.is_empty()) | mode_flag,
        );
        bytes.write_u64_le(self.range_size() as u64);
        bytes.write_u64_le(self.compaction_threshold() as u64);
        bytes.write_u64_le(self.promotion_threshold() as u64);
        match self.storage() {
            Storage::Sparse(sparse) => write_entries(&mut bytes, sparse.compacted_entries()),
            Storage::Dense(dense) => write_registers(&mut bytes, dense.registers()),
        }
        Ok(bytes.into_bytes())
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let flags = read_preamble::<R>(&mut cursor, Family::PROMOTABLE)?;
        let range_size = read_range_size(&mut cursor)?;
        let compaction_threshold = read_threshold(&mut cursor, "compaction_threshold")?;
        let promotion_threshold = read_threshold(&mut cursor, "promotion_threshold")?;

        let storage = if flags & FLAG_DENSE != 0 {
            let registers = read_registers(&mut cursor, range_size)?;
            Storage::Dense(DenseContainer::from_registers(registers))
        } else {
            let identity = Op::default().identity();
            let entries = read_entries(&mut cursor, Some(range_size), Some(identity))?;
            if entries.len() >= promotion_threshold {
                return Err(Error::deserial(format!(
                    "sparse image holds {} registers, promotion threshold is {promotion_threshold}",
                    entries.len()
                )));
            }
            Storage::Sparse(SparseContainer::from_map(
                range_size,
                CompactingMap::from_sorted(compaction_threshold, entries),
            ))
        };
        ensure_fully_consumed(cursor.remaining())?;

        let container = Self::from_storage(
            range_size,
            compaction_threshold,
            promotion_threshold,
            storage,
        );
        ensure_empty_flag(flags, container.is_empty())?;
        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_sparse_preamble_layout() {
        let mut sparse = SparseContainer::<i32>::new(64, 4);
        *sparse.register_mut(5) += 3;
        sparse.compactify();
        let bytes = sparse.serialize().unwrap();
        assert_eq!(&bytes[..4], &[SERIAL_VERSION, 41, 0, 3]);
        assert_eq!(bytes.len(), PREAMBLE_BYTES + 24 + ENTRY_BYTES);
    }

    #[test]
    fn test_empty_flag() {
        let sparse = SparseContainer::<i64>::new(64, 4);
        let bytes = sparse.serialize().unwrap();
        assert_eq!(bytes[2], FLAG_EMPTY);
        let restored = SparseContainer::<i64>::deserialize(&bytes).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn test_rejects_identity_entry() {
        let mut bytes = SketchBytes::with_capacity(64);
        write_preamble::<i64>(&mut bytes, Family::SPARSE, 0);
        bytes.write_u64_le(8);
        bytes.write_u64_le(4);
        write_entries(&mut bytes, &[(2u64, 0i64)]);
        let err = SparseContainer::<i64>::deserialize(&bytes.into_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.message().contains("merge identity"));
    }

    #[test]
    fn test_rejects_unsorted_entries() {
        let mut bytes = SketchBytes::with_capacity(64);
        write_preamble::<i64>(&mut bytes, Family::COMPACTING_MAP, 0);
        bytes.write_u64_le(4);
        write_entries(&mut bytes, &[(5u64, 1i64), (5, 2)]);
        let err = CompactingMap::<u64, i64>::deserialize(&bytes.into_bytes()).unwrap_err();
        assert!(err.message().contains("strictly ascending"));
    }

    #[test]
    fn test_rejects_index_out_of_range() {
        let mut bytes = SketchBytes::with_capacity(64);
        write_preamble::<i64>(&mut bytes, Family::SPARSE, 0);
        bytes.write_u64_le(8);
        bytes.write_u64_le(4);
        write_entries(&mut bytes, &[(8u64, 1i64)]);
        let err = SparseContainer::<i64>::deserialize(&bytes.into_bytes()).unwrap_err();
        assert!(err.message().contains("out of range"));
    }

    #[test]
    fn test_rejects_truncated_registers() {
        let dense = DenseContainer::<i64>::new(4);
        let bytes = dense.serialize();
        let err = DenseContainer::<i64>::deserialize(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.message().starts_with("insufficient data"));
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let dense = DenseContainer::<i64>::new(2);
        let mut bytes = dense.serialize();
        bytes.push(0);
        assert!(DenseContainer::<i64>::deserialize(&bytes).is_err());
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let mut bytes = SketchBytes::with_capacity(64);
        write_preamble::<i64>(&mut bytes, Family::COMPACTING_MAP, FLAG_EMPTY);
        bytes.write_u64_le(0);
        bytes.write_u64_le(0);
        let err = CompactingMap::<u64, i64>::deserialize(&bytes.into_bytes()).unwrap_err();
        assert!(err.message().contains("must be positive"));
    }

    #[test]
    fn test_rejects_unaddressable_range() {
        let mut bytes = SketchBytes::with_capacity(64);
        write_preamble::<i64>(&mut bytes, Family::SPARSE, FLAG_EMPTY);
        bytes.write_u64_le(u64::MAX >> 1);
        bytes.write_u64_le(4);
        write_entries::<i64>(&mut bytes, &[]);
        let err = SparseContainer::<i64>::deserialize(&bytes.into_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.message().contains("range_size"));
    }

    #[test]
    fn test_rejects_sparse_image_at_promotion_threshold() {
        let mut bytes = SketchBytes::with_capacity(128);
        write_preamble::<i64>(&mut bytes, Family::PROMOTABLE, 0);
        bytes.write_u64_le(16);
        bytes.write_u64_le(4);
        bytes.write_u64_le(2);
        write_entries(&mut bytes, &[(1u64, 1i64), (7, -2)]);
        let err = PromotableContainer::<i64>::deserialize(&bytes.into_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.message().contains("promotion threshold"));
    }
}
