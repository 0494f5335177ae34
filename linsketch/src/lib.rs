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

//! # linsketch
//!
//! Mergeable linear sketches with adaptive register storage.
//!
//! A linear sketch projects a stream of `(item, multiplicity)` updates onto a vector of
//! registers. Because the projection is linear, sketches of two streams built with the same
//! projection can be merged register by register into the sketch of the combined stream.
//!
//! Small sketches are mostly empty, so registers can be stored sparsely in a
//! [`CompactingMap`](container::CompactingMap) and promoted to a dense vector once they fill
//! up. See the [`container`] module.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use linsketch::container::PromotableContainer;
//! use linsketch::hash::MulAddShift;
//! use linsketch::sketch::Sketch;
//! use linsketch::transform::CountSketch;
//!
//! let transform = Arc::new(CountSketch::<MulAddShift>::new(256, 1082087245));
//! let mut sketch = Sketch::<i32, _, PromotableContainer<i32>>::new(transform);
//! sketch.insert(17);
//! sketch.insert_with_multiplicity(17, -1);
//! sketch.compactify();
//! assert!(sketch.is_empty());
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod codec;

pub mod container;
pub mod error;
pub mod hash;
pub mod register;
pub mod sketch;
pub mod transform;
