//! Throughput benchmark on a large random hypergraph.
//!
//! Run with: cargo run --example large_graph --release

use std::time::Instant;

use hyperforce_layout::{Hypergraph, LayoutConfig, LayoutEngine, SimulationParams, StageTimings};

fn main() {
    tracing_subscriber::fmt::init();

    let node_count = 200_000u32;
    let edge_count = 100_000u32;

    println!("=== Barnes-Hut Hypergraph Layout Benchmark ===");
    println!("Hypergraph: {} nodes, {} hyperedges", node_count, edge_count);
    println!();

    // Deterministic pseudo-random membership, 2-8 members per hyperedge
    let edges = (0..edge_count).map(|e| {
        let size = 2 + e % 7;
        (0..size)
            .map(|k| (e.wrapping_mul(2_654_435_761).wrapping_add(k * 40_503)) % node_count)
            .collect::<Vec<u32>>()
    });
    let topology = Hypergraph::from_edges(node_count, edges).expect("Invalid hypergraph");

    let mut engine = LayoutEngine::new(LayoutConfig::default()).expect("Failed to create engine");
    engine
        .load(topology, SimulationParams::default())
        .expect("Failed to load hypergraph");

    println!("Worker threads: {}", engine.worker_threads());

    // Warm up
    for _ in 0..5 {
        engine.tick().expect("Tick failed");
    }

    let iterations = 50;
    let mut totals = StageTimings::default();
    let start = Instant::now();
    for _ in 0..iterations {
        let report = engine.tick().expect("Tick failed");
        totals.accumulate(&report.timings);
    }
    let elapsed = start.elapsed();
    let per_tick = elapsed / iterations;

    println!("Completed {} ticks in {:.2?} ({:.2?}/tick)", iterations, elapsed, per_tick);
    println!();
    println!("Per-stage average:");
    for (name, total) in totals.stages() {
        println!("  {:<10} {:>10.2?}", name, total / iterations);
    }

    let ticks_per_sec = 1.0 / per_tick.as_secs_f64();
    if ticks_per_sec >= 60.0 {
        println!("\n✅ Performance target met: >= 60 ticks/sec");
    } else if ticks_per_sec >= 30.0 {
        println!("\n⚠️  Performance acceptable: 30-60 ticks/sec");
    } else {
        println!("\n❌ Performance below target: < 30 ticks/sec");
    }
}
