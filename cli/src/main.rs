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

//! Exercises linsketch on synthetic streams.
//!
//! Usage:
//!   linsketch-cli merge-check --stream-size 100000 --shards 8 --container promotable
//!   linsketch-cli describe --tile-size 512 --replication-count 2
//!
//! Set `RUST_LOG=linsketch=debug` to see promotions and cross-mode merges.

use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use linsketch::container::ContainerConfig;
use linsketch::container::DenseContainer;
use linsketch::container::PromotableContainer;
use linsketch::container::RegisterContainer;
use linsketch::container::SparseContainer;
use linsketch::error::Error;
use linsketch::hash::DEFAULT_SEED;
use linsketch::hash::MulAddShift;
use linsketch::sketch::Sketch;
use linsketch::transform::SparseJlt;
use linsketch::transform::Transform;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

type Jlt = SparseJlt<MulAddShift>;

#[derive(Parser, Debug)]
#[command(name = "linsketch-cli")]
#[command(about = "Build and merge linear sketches over synthetic streams")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sketch a stream whole and in shards, then check that the merged shards match
    MergeCheck(MergeCheckArgs),
    /// Print the description of the configured sketch
    Describe(SketchArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Dense,
    Sparse,
    Promotable,
}

#[derive(clap::Args, Debug)]
struct SketchArgs {
    /// Registers per JLT tile, rounded up to a power of two
    #[arg(long, default_value_t = 1024)]
    tile_size: u64,

    /// Number of JLT tiles
    #[arg(long, default_value_t = 4, value_parser = parse_positive)]
    replication_count: usize,

    /// Seed of the projection hashes
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Register storage
    #[arg(long, value_enum, default_value_t = ContainerKind::Promotable)]
    container: ContainerKind,

    /// Staged entries that trigger a compaction of sparse storage
    #[arg(long, default_value_t = 100, value_parser = parse_positive)]
    compaction_threshold: usize,

    /// Live sparse registers that trigger promotion to dense storage
    #[arg(long, default_value_t = 4096, value_parser = parse_positive)]
    promotion_threshold: usize,
}

#[derive(clap::Args, Debug)]
struct MergeCheckArgs {
    #[command(flatten)]
    sketch: SketchArgs,

    /// Number of updates in the stream
    #[arg(long, default_value_t = 100_000)]
    stream_size: usize,

    /// Items are drawn uniformly from 0..domain-size
    #[arg(long, default_value_t = 1 << 20, value_parser = parse_positive_u64)]
    domain_size: u64,

    /// Number of shards the stream is dealt into
    #[arg(long, default_value_t = 8, value_parser = parse_positive)]
    shards: usize,
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be positive".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_positive_u64(s: &str) -> Result<u64, String> {
    match s.parse::<u64>() {
        Ok(0) => Err("must be positive".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl SketchArgs {
    fn transform(&self) -> Arc<Jlt> {
        Arc::new(SparseJlt::new(
            self.tile_size,
            self.replication_count,
            self.seed,
        ))
    }

    fn config(&self) -> ContainerConfig {
        ContainerConfig::builder()
            .compaction_threshold(self.compaction_threshold)
            .promotion_threshold(self.promotion_threshold)
            .build()
    }
}

struct Report {
    matches: bool,
    stored_registers: usize,
    sparse: bool,
    squared_norm: f64,
}

fn synthetic_stream(args: &MergeCheckArgs) -> Vec<(u64, i64)> {
    let mut rng = StdRng::seed_from_u64(args.sketch.seed);
    (0..args.stream_size)
        .map(|_| {
            let item = rng.random_range(0..args.domain_size);
            let multiplicity = rng.random_range(-1..=3i64);
            (item, multiplicity)
        })
        .collect()
}

fn merge_check<C: RegisterContainer<i64>>(
    args: &MergeCheckArgs,
    stream: &[(u64, i64)],
) -> Result<Report, Error> {
    let transform = args.sketch.transform();
    let config = args.sketch.config();
    let new_sketch = || Sketch::<i64, Jlt, C>::with_config(Arc::clone(&transform), &config);

    let mut full = new_sketch();
    let mut shards: Vec<_> = (0..args.shards).map(|_| new_sketch()).collect();
    for (i, &(item, multiplicity)) in stream.iter().enumerate() {
        full.insert_with_multiplicity(item, multiplicity);
        shards[i % args.shards].insert_with_multiplicity(item, multiplicity);
    }
    full.compactify();

    let mut merged = new_sketch();
    for (i, shard) in shards.iter_mut().enumerate() {
        shard.compactify();
        info!(shard = i, registers = shard.len(), sparse = shard.is_sparse(), "sketched shard");
        merged.merge(shard)?;
    }

    let scale = transform.scaling_factor();
    Ok(Report {
        matches: merged.to_dense_vector()? == full.to_dense_vector()?,
        stored_registers: full.len(),
        sparse: full.is_sparse(),
        squared_norm: full.squared_norm()? / (scale * scale),
    })
}

fn run_merge_check(args: &MergeCheckArgs) -> Result<ExitCode, Error> {
    let stream = synthetic_stream(args);
    let report = match args.sketch.container {
        ContainerKind::Dense => merge_check::<DenseContainer<i64>>(args, &stream)?,
        ContainerKind::Sparse => merge_check::<SparseContainer<i64>>(args, &stream)?,
        ContainerKind::Promotable => merge_check::<PromotableContainer<i64>>(args, &stream)?,
    };

    let mut frequencies: HashMap<u64, i64> = HashMap::new();
    for &(item, multiplicity) in &stream {
        *frequencies.entry(item).or_default() += multiplicity;
    }
    let exact: f64 = frequencies.values().map(|f| (*f * *f) as f64).sum();

    println!("updates:           {}", stream.len());
    println!("shards:            {}", args.shards);
    println!("stored registers:  {}", report.stored_registers);
    println!(
        "storage:           {}",
        if report.sparse { "sparse" } else { "dense" }
    );
    println!("squared norm:      {:.1} (exact {exact:.1})", report.squared_norm);
    println!(
        "merge check:       {}",
        if report.matches { "ok" } else { "MISMATCH" }
    );
    Ok(if report.matches {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn describe<C: RegisterContainer<i64>>(args: &SketchArgs) -> String {
    let sketch = Sketch::<i64, Jlt, C>::with_config(args.transform(), &args.config());
    sketch.description()
}

fn run_describe(args: &SketchArgs) -> ExitCode {
    let description = match args.container {
        ContainerKind::Dense => describe::<DenseContainer<i64>>(args),
        ContainerKind::Sparse => describe::<SparseContainer<i64>>(args),
        ContainerKind::Promotable => describe::<PromotableContainer<i64>>(args),
    };
    println!("{description}");
    println!("range size:           {}", args.transform().range_size());
    println!("compaction threshold: {}", args.compaction_threshold);
    println!("promotion threshold:  {}", args.promotion_threshold);
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let result = match &args.command {
        Command::MergeCheck(args) => run_merge_check(args),
        Command::Describe(args) => Ok(run_describe(args)),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
