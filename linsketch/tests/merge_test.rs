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

use linsketch::container::ContainerConfig;
use linsketch::container::DenseContainer;
use linsketch::container::Mode;
use linsketch::container::PromotableContainer;
use linsketch::container::RegisterContainer;
use linsketch::container::SparseContainer;
use linsketch::hash::MulAddShift;
use linsketch::sketch::Sketch;
use linsketch::transform::SparseJlt;
use proptest::prelude::*;

const TILE_SIZE: u64 = 32;
const REPLICATION_COUNT: usize = 3;
const SEED: u64 = 1082087245;

type Update = (u64, i64);
type Jlt = SparseJlt<MulAddShift>;

fn transform() -> Arc<Jlt> {
    Arc::new(SparseJlt::new(TILE_SIZE, REPLICATION_COUNT, SEED))
}

fn config() -> ContainerConfig {
    ContainerConfig::builder()
        .compaction_threshold(5)
        .promotion_threshold(40)
        .build()
}

fn sketch_of<C: RegisterContainer<i64>>(
    transform: &Arc<Jlt>,
    updates: &[Update],
) -> Sketch<i64, Jlt, C> {
    sketch_with_config(transform, &config(), updates)
}

fn sketch_with_config<C: RegisterContainer<i64>>(
    transform: &Arc<Jlt>,
    config: &ContainerConfig,
    updates: &[Update],
) -> Sketch<i64, Jlt, C> {
    let mut sketch = Sketch::with_config(Arc::clone(transform), config);
    for &(item, multiplicity) in updates {
        sketch.insert_with_multiplicity(item, multiplicity);
    }
    sketch.compactify();
    sketch
}

fn stream() -> impl Strategy<Value = Vec<Update>> {
    prop::collection::vec((0u64..200, -3i64..=3), 0..300)
}

fn check_merge_matches_full_stream<C: RegisterContainer<i64>>(
    lhs: &[Update],
    rhs: &[Update],
) -> Result<(), TestCaseError> {
    let transform = transform();
    let full: Vec<Update> = lhs.iter().chain(rhs).copied().collect();
    let expected = sketch_of::<C>(&transform, &full).to_dense_vector().unwrap();

    let merged = sketch_of::<C>(&transform, lhs)
        .merged(&sketch_of::<C>(&transform, rhs))
        .unwrap();
    prop_assert_eq!(merged.to_dense_vector().unwrap(), expected);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_merge_equals_sketch_of_concatenation(lhs in stream(), rhs in stream()) {
        check_merge_matches_full_stream::<DenseContainer<i64>>(&lhs, &rhs)?;
        check_merge_matches_full_stream::<SparseContainer<i64>>(&lhs, &rhs)?;
        check_merge_matches_full_stream::<PromotableContainer<i64>>(&lhs, &rhs)?;
    }

    #[test]
    fn prop_sparse_merge_is_commutative(lhs in stream(), rhs in stream()) {
        let transform = transform();
        let a = sketch_of::<SparseContainer<i64>>(&transform, &lhs);
        let b = sketch_of::<SparseContainer<i64>>(&transform, &rhs);
        prop_assert_eq!(a.merged(&b).unwrap(), b.merged(&a).unwrap());
    }

    #[test]
    fn prop_promotable_merge_is_associative(a in stream(), b in stream(), c in stream()) {
        let transform = transform();
        let a = sketch_of::<PromotableContainer<i64>>(&transform, &a);
        let b = sketch_of::<PromotableContainer<i64>>(&transform, &b);
        let c = sketch_of::<PromotableContainer<i64>>(&transform, &c);

        let left = a.merged(&b).unwrap().merged(&c).unwrap();
        let right = a.merged(&b.merged(&c).unwrap()).unwrap();
        prop_assert_eq!(left.to_dense_vector().unwrap(), right.to_dense_vector().unwrap());
    }

    #[test]
    fn prop_empty_sketch_is_merge_identity(updates in stream()) {
        let transform = transform();
        let empty = sketch_of::<SparseContainer<i64>>(&transform, &[]);
        let sketch = sketch_of::<SparseContainer<i64>>(&transform, &updates);
        prop_assert_eq!(&sketch.merged(&empty).unwrap(), &sketch);
        prop_assert_eq!(&empty.merged(&sketch).unwrap(), &sketch);
    }

    #[test]
    fn prop_sparse_storage_holds_no_identity(lhs in stream(), rhs in stream()) {
        let transform = transform();
        let merged = sketch_of::<SparseContainer<i64>>(&transform, &lhs)
            .merged(&sketch_of::<SparseContainer<i64>>(&transform, &rhs))
            .unwrap();
        for (_, value) in merged.container().iter().unwrap() {
            prop_assert_ne!(value, 0);
        }
    }

    #[test]
    fn prop_promotion_is_monotonic(updates in stream()) {
        let mut sketch =
            Sketch::<i64, Jlt, PromotableContainer<i64>>::with_config(transform(), &config());
        let mut promoted = false;
        for (item, multiplicity) in updates {
            sketch.insert_with_multiplicity(item, multiplicity);
            let mode = sketch.container().mode();
            if promoted {
                prop_assert_eq!(mode, Mode::Dense);
            }
            if mode == Mode::Sparse {
                prop_assert!(sketch.len() < config().promotion_threshold());
            }
            promoted = mode == Mode::Dense;
        }
    }

    #[test]
    fn prop_storage_modes_agree(updates in stream()) {
        let transform = transform();
        let dense = sketch_of::<DenseContainer<i64>>(&transform, &updates);
        let sparse = sketch_of::<SparseContainer<i64>>(&transform, &updates);
        let promotable = sketch_of::<PromotableContainer<i64>>(&transform, &updates);
        let expected = dense.to_dense_vector().unwrap();
        prop_assert_eq!(sparse.to_dense_vector().unwrap(), expected.clone());
        prop_assert_eq!(promotable.to_dense_vector().unwrap(), expected);
    }

    #[test]
    fn prop_early_and_late_promotion_agree(updates in stream()) {
        let transform = transform();
        let early_config = ContainerConfig::builder().promotion_threshold(1).build();
        let late_config = ContainerConfig::builder().promotion_threshold(1 << 20).build();
        let early =
            sketch_with_config::<PromotableContainer<i64>>(&transform, &early_config, &updates);
        let late =
            sketch_with_config::<PromotableContainer<i64>>(&transform, &late_config, &updates);
        if !updates.is_empty() {
            prop_assert!(!early.is_sparse());
        }
        prop_assert!(late.is_sparse());
        prop_assert_eq!(early.to_dense_vector().unwrap(), late.to_dense_vector().unwrap());
    }

    #[test]
    fn prop_compactify_is_idempotent(updates in stream()) {
        let transform = transform();
        let mut sketch = sketch_of::<SparseContainer<i64>>(&transform, &updates);
        let once = sketch.clone();
        sketch.compactify();
        prop_assert_eq!(sketch, once);
    }
}
