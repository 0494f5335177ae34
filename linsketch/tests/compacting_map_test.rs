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

use std::collections::BTreeMap;

use googletest::assert_that;
use googletest::matchers::contains_substring;
use googletest::matchers::eq;
use linsketch::container::CompactingMap;
use linsketch::container::SortedVecMap;
use linsketch::container::StagingMap;
use linsketch::error::ErrorKind;
use linsketch::register::Sum;
use proptest::prelude::*;

#[test]
fn test_threshold_two_walkthrough() {
    let mut map = CompactingMap::<u64, i64>::new(2);
    for key in [5, 3, 9, 1] {
        assert!(map.insert(key, key as i64));
    }
    assert!(map.is_compact());
    let keys: Vec<u64> = map.iter().unwrap().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![1, 3, 5, 9]);

    assert!(map.erase(&3));
    assert_that!(map.len(), eq(3));
    assert_that!(map.at(&3).unwrap_err().kind(), eq(ErrorKind::NotFound));

    map.compactify();
    assert_that!(map.archive_len(), eq(3));

    assert!(map.insert(3, 33));
    assert_that!(map.len(), eq(4));
    assert_that!(map.at(&3).unwrap(), eq(33));
}

#[test]
fn test_state_dump() {
    let mut map = CompactingMap::<u64, i64>::new(3);
    map.insert(5, 50);
    map.insert(3, 30);
    map.insert(9, 90);
    map.erase(&5);
    map.insert(1, 10);
    insta::assert_snapshot!(map.state_dump(), @r"
    archive (3): (3, 30) (5, 50)~ (9, 90)
    staging (1): (1, 10)
    threshold: 3, tombstones: 1
    ");
}

#[test]
fn test_precondition_error_message() {
    let mut map = CompactingMap::<u64, i64>::new(8);
    map.insert(1, 1);
    let err = map.find(&1).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::Precondition));
    assert_that!(
        err.message(),
        contains_substring("bad invocation of `find` on uncompacted map")
    );
}

#[test]
fn test_merge_three_way() {
    let mut lhs = CompactingMap::<u64, i32>::new(4);
    let mut rhs = CompactingMap::<u64, i32>::new(4);
    for (key, value) in [(1, 1), (4, 4), (6, -6)] {
        lhs.insert(key, value);
    }
    for (key, value) in [(2, 2), (4, 1), (6, 6), (8, 8)] {
        rhs.insert(key, value);
    }
    lhs.compactify();
    rhs.compactify();
    lhs.merge(&rhs, &Sum).unwrap();
    let entries: Vec<_> = lhs.iter().unwrap().collect();
    assert_eq!(entries, vec![(1, 1), (2, 2), (4, 5), (8, 8)]);
    assert_that!(lhs.tombstone_count(), eq(0));
}

#[derive(Debug, Clone)]
enum Op {
    Insert(u64, i32),
    Add(u64, i32),
    Erase(u64),
    Get(u64),
    Compact,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = 0u64..64;
    let op = prop_oneof![
        30 => (key.clone(), any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        30 => (key.clone(), -8i32..8).prop_map(|(k, v)| Op::Add(k, v)),
        25 => key.clone().prop_map(Op::Erase),
        10 => key.clone().prop_map(Op::Get),
        5 => Just(Op::Compact),
    ];
    prop::collection::vec(op, 0..=500)
}

fn run_model<M: StagingMap<u64, i32>>(
    threshold: usize,
    ops: Vec<Op>,
) -> std::result::Result<(), TestCaseError> {
    let mut map = CompactingMap::<u64, i32, M>::new(threshold);
    let mut model: BTreeMap<u64, i32> = BTreeMap::new();

    for op in ops {
        match op {
            Op::Insert(key, value) => {
                let inserted = map.insert(key, value);
                let expected = !model.contains_key(&key);
                if expected {
                    model.insert(key, value);
                }
                prop_assert_eq!(inserted, expected);
            }
            Op::Add(key, delta) => {
                let value = map.get_or_insert_default(key);
                *value = value.wrapping_add(delta);
                let entry = model.entry(key).or_insert(0);
                *entry = entry.wrapping_add(delta);
            }
            Op::Erase(key) => {
                prop_assert_eq!(map.erase(&key), model.remove(&key).is_some());
            }
            Op::Get(key) => {
                let expected = model.get(&key).copied().unwrap_or(i32::MIN);
                prop_assert_eq!(map.at_or(&key, i32::MIN), expected);
            }
            Op::Compact => {
                map.compactify();
                prop_assert!(map.is_compact());
            }
        }
        prop_assert_eq!(map.len(), model.len());
        prop_assert!(map.staging_len() < threshold);
        prop_assert!(map.tombstone_count() <= map.archive_len());
    }

    map.compactify();
    let got: Vec<(u64, i32)> = map.iter().unwrap().collect();
    let expected: Vec<(u64, i32)> = model.into_iter().collect();
    prop_assert_eq!(got, expected);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_matches_btree_model(threshold in 1usize..12, ops in ops_strategy()) {
        run_model::<BTreeMap<u64, i32>>(threshold, ops)?;
    }

    #[test]
    fn prop_sorted_vec_staging_matches_model(threshold in 1usize..12, ops in ops_strategy()) {
        run_model::<SortedVecMap<u64, i32>>(threshold, ops)?;
    }

    #[test]
    fn prop_compactify_is_idempotent(threshold in 1usize..12, ops in ops_strategy()) {
        let mut map = CompactingMap::<u64, i32>::new(threshold);
        for op in ops {
            match op {
                Op::Insert(key, value) => { map.insert(key, value); }
                Op::Add(key, delta) => {
                    let value = map.get_or_insert_default(key);
                    *value = value.wrapping_add(delta);
                }
                Op::Erase(key) => { map.erase(&key); }
                Op::Get(_) | Op::Compact => {}
            }
        }
        map.compactify();
        let once = map.clone();
        map.compactify();
        prop_assert_eq!(map, once);
    }
}
