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

use std::sync::Arc;

use googletest::assert_that;
use googletest::matchers::contains_substring;
use googletest::matchers::eq;
use linsketch::container::CompactingMap;
use linsketch::container::DenseContainer;
use linsketch::container::Mode;
use linsketch::container::PromotableContainer;
use linsketch::container::SparseContainer;
use linsketch::error::ErrorKind;
use linsketch::hash::MulAddShift;
use linsketch::hash::MulShift;
use linsketch::sketch::Sketch;
use linsketch::transform::CountSketch;
use linsketch::transform::SparseJlt;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn hex_rows(bytes: &[u8]) -> String {
    bytes
        .chunks(8)
        .map(|row| {
            row.iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_dense_image_layout() {
    let dense = DenseContainer::<i32>::from_registers(vec![1, -1]);
    insta::assert_snapshot!(hex_rows(&dense.serialize()), @r"
    01 2a 02 03 00 00 00 00
    02 00 00 00 00 00 00 00
    01 00 00 00 00 00 00 00
    ff ff ff ff ff ff ff ff
    ");
}

#[test]
fn test_compacting_map_round_trip() {
    let mut map = CompactingMap::<u64, i16>::new(3);
    for (key, value) in [(40, 4), (10, 1), (30, -3), (20, 2)] {
        map.insert(key, value);
    }
    map.erase(&30);
    assert!(map.serialize().is_err());

    map.compactify();
    let bytes = map.serialize().unwrap();
    let restored = CompactingMap::<u64, i16>::deserialize(&bytes).unwrap();
    assert_eq!(restored, map);
    assert_eq!(restored.compaction_threshold(), 3);
}

#[test]
fn test_promotable_round_trip_in_both_modes() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut container = PromotableContainer::<i64>::new(256, 16, 64);
    while container.mode() == Mode::Sparse {
        let index = rng.random_range(0..256u64);
        *container.register_mut(index) += rng.random_range(1..10i64);
        if container.len() == 20 {
            container.compactify();
            let bytes = container.serialize().unwrap();
            let restored = PromotableContainer::<i64>::deserialize(&bytes).unwrap();
            assert_eq!(restored, container);
            assert!(restored.is_sparse());
        }
    }

    let bytes = container.serialize().unwrap();
    let restored = PromotableContainer::<i64>::deserialize(&bytes).unwrap();
    assert_eq!(restored.mode(), Mode::Dense);
    assert_eq!(restored, container);
    assert_eq!(restored.promotion_threshold(), 64);
}

#[test]
fn test_float_registers_round_trip() {
    let mut sparse = SparseContainer::<f32>::new(1 << 16, 4);
    for (index, value) in [(9, 0.25f32), (65535, -3.5), (0, 1e-3)] {
        *sparse.register_mut(index) += value;
    }
    sparse.compactify();
    let restored = SparseContainer::<f32>::deserialize(&sparse.serialize().unwrap()).unwrap();
    assert_eq!(restored, sparse);
    assert_eq!(restored.get(65535), -3.5);
}

#[test]
fn test_every_truncation_is_rejected() {
    let mut sparse = SparseContainer::<i64>::new(128, 4);
    for index in [3, 17, 99] {
        *sparse.register_mut(index) += 1;
    }
    sparse.compactify();
    let bytes = sparse.serialize().unwrap();
    for len in 0..bytes.len() {
        let err = SparseContainer::<i64>::deserialize(&bytes[..len]).unwrap_err();
        assert_that!(err.kind(), eq(ErrorKind::InvalidData));
    }

    let mut padded = bytes.clone();
    padded.push(0);
    let err = SparseContainer::<i64>::deserialize(&padded).unwrap_err();
    assert_that!(err.message(), contains_substring("trailing bytes"));
}

#[test]
fn test_rejects_foreign_images() {
    let dense = DenseContainer::<i64>::from_registers(vec![0, 5, 0]);
    let bytes = dense.serialize();

    let err = SparseContainer::<i64>::deserialize(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("invalid family"));

    let err = DenseContainer::<i32>::deserialize(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("register type mismatch"));

    let mut bumped = bytes.clone();
    bumped[0] = 2;
    let err = DenseContainer::<i64>::deserialize(&bumped).unwrap_err();
    assert_that!(
        err.message(),
        contains_substring("unsupported serial version")
    );
}

#[test]
fn test_rejects_out_of_range_narrowing() {
    let dense = DenseContainer::<i64>::from_registers(vec![i64::from(i8::MAX) + 1]);
    let mut bytes = dense.serialize();
    bytes[3] = 1;
    let err = DenseContainer::<i8>::deserialize(&bytes).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvalidData));
}

#[test]
fn test_sketch_round_trip_rebuilds_transform() {
    type JltSketch = Sketch<i32, SparseJlt<MulShift>, PromotableContainer<i32>>;

    let transform = Arc::new(SparseJlt::<MulShift>::new(64, 4, 11));
    let mut sketch = JltSketch::builder(transform)
        .promotion_threshold(32)
        .build();
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        sketch.insert(rng.random_range(0..1000u64));
    }
    sketch.compactify();

    let bytes = sketch.serialize().unwrap();
    let restored = JltSketch::deserialize(&bytes).unwrap();
    assert_eq!(restored, sketch);
    assert!(!Arc::ptr_eq(restored.transform(), sketch.transform()));

    let shared =
        JltSketch::deserialize_with_transform(&bytes, Arc::clone(sketch.transform())).unwrap();
    assert!(Arc::ptr_eq(shared.transform(), sketch.transform()));
}

#[test]
fn test_sketch_rejects_other_hash_family() {
    let transform = Arc::new(CountSketch::<MulAddShift>::new(32, 2));
    let sketch = Sketch::<i64, _, DenseContainer<i64>>::new(transform);
    let bytes = sketch.serialize().unwrap();
    let err = Sketch::<i64, CountSketch<MulShift>, DenseContainer<i64>>::deserialize(&bytes)
        .unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvalidData));
}
