//! `hf bench`: time ticks on a generated hypergraph.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use hyperforce_layout::{LayoutEngine, StageTimings};

use crate::config::Config;
use crate::generate::{random_hypergraph, GeneratorSpec};

#[derive(Debug, Clone)]
pub struct BenchOptions {
    pub generator: GeneratorSpec,
    pub warmup: u32,
    pub ticks: u32,
}

/// Averages over the measured ticks.
#[derive(Debug, Clone)]
pub struct BenchSummary {
    pub ticks: u32,
    pub threads: usize,
    pub wall: Duration,
    pub per_stage: StageTimings,
}

impl BenchSummary {
    pub fn per_tick(&self) -> Duration {
        self.wall / self.ticks.max(1)
    }

    pub fn ticks_per_sec(&self) -> f64 {
        f64::from(self.ticks) / self.wall.as_secs_f64().max(f64::EPSILON)
    }
}

/// Execute the `hf bench` command.
///
/// Alpha is held constant so every measured tick runs the full pipeline.
pub fn execute(config: &Config, options: &BenchOptions) -> Result<BenchSummary> {
    let topology = random_hypergraph(options.generator)?;
    let mut params = config.simulation.clone();
    params.alpha_decay = 0.0;

    let mut engine =
        LayoutEngine::new(config.engine.clone()).context("Failed to create layout engine")?;
    engine
        .load(topology, params)
        .context("Failed to load hypergraph")?;

    println!(
        "⏱️  Benchmarking {} nodes, {} hyperedges (sort partition {})",
        engine.node_count(),
        engine.edge_count(),
        engine.config().sort_partition_size
    );

    for _ in 0..options.warmup {
        engine.tick()?;
    }

    let mut totals = StageTimings::default();
    let start = Instant::now();
    for _ in 0..options.ticks {
        let report = engine.tick()?;
        totals.accumulate(&report.timings);
    }
    let wall = start.elapsed();

    let divisor = options.ticks.max(1);
    let per_stage = StageTimings {
        keys: totals.keys / divisor,
        sort: totals.sort / divisor,
        build: totals.build / divisor,
        summarize: totals.summarize / divisor,
        repulsion: totals.repulsion / divisor,
        attraction: totals.attraction / divisor,
        center: totals.center / divisor,
        integrate: totals.integrate / divisor,
    };

    let summary = BenchSummary {
        ticks: options.ticks,
        threads: engine.worker_threads(),
        wall,
        per_stage,
    };
    print_summary(&summary);
    Ok(summary)
}

fn print_summary(summary: &BenchSummary) {
    println!();
    println!(
        "Completed {} ticks on {} threads in {:.2?} ({:.2?}/tick, {:.1} ticks/sec)",
        summary.ticks,
        summary.threads,
        summary.wall,
        summary.per_tick(),
        summary.ticks_per_sec()
    );
    println!("{:─<40}", "");
    let total = summary.per_stage.total().as_secs_f64().max(f64::EPSILON);
    for (name, duration) in summary.per_stage.stages() {
        println!(
            "  {:<10} {:>10.2?}  {:>5.1}%",
            name,
            duration,
            100.0 * duration.as_secs_f64() / total
        );
    }
}
