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

//! Linear sketches: a shared projection plus register storage.
//!
//! Sketches built with the same transform can be merged, and the merge of sketches over
//! disjoint parts of a stream equals the sketch of the whole stream.
//!
//! # Usage
//!
//! ```rust
//! # use std::sync::Arc;
//! # use linsketch::container::PromotableContainer;
//! # use linsketch::sketch::Sketch;
//! # use linsketch::transform::SparseJlt;
//! let transform = Arc::new(SparseJlt::<linsketch::hash::MulAddShift>::new(16, 4, 42));
//! let mut lhs = Sketch::<i64, _, PromotableContainer<i64>>::new(Arc::clone(&transform));
//! let mut rhs = Sketch::<i64, _, PromotableContainer<i64>>::new(Arc::clone(&transform));
//! let mut whole = Sketch::<i64, _, PromotableContainer<i64>>::new(transform);
//! for item in 0..100u64 {
//!     whole.insert(item);
//!     if item % 2 == 0 { lhs.insert(item) } else { rhs.insert(item) }
//! }
//! lhs.compactify();
//! rhs.compactify();
//! whole.compactify();
//! lhs.merge(&rhs).unwrap();
//! assert_eq!(lhs.to_dense_vector().unwrap(), whole.to_dense_vector().unwrap());
//! ```
//!
//! # Configuration
//!
//! ```rust
//! # use std::sync::Arc;
//! # use linsketch::container::PromotableContainer;
//! # use linsketch::sketch::Sketch;
//! # use linsketch::transform::CountSketch;
//! let transform = Arc::new(CountSketch::<linsketch::hash::MulShift>::new(1024, 7));
//! let sketch = Sketch::<f64, _, PromotableContainer<f64>>::builder(transform)
//!     .compaction_threshold(16)
//!     .promotion_threshold(256)
//!     .build();
//! assert!(sketch.is_sparse());
//! ```

mod serialization;

mod sketch;
pub use self::sketch::Sketch;
pub use self::sketch::SketchBuilder;
