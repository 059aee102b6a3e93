//! `hf run`: lay out a generated hypergraph until it settles.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use hyperforce_layout::{Bounds, Hypergraph, LayoutEngine, LayoutState, Position, TickReport};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::generate::{random_hypergraph, GeneratorSpec};

/// Options for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub generator: GeneratorSpec,
    pub max_ticks: u32,
    pub progress_interval: u32,
    pub output: Option<PathBuf>,
}

/// Final state of a run, as written to `--output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    pub iteration: u64,
    pub alpha: f32,
    pub state: LayoutState,
    pub bounds: Bounds,
    pub topology: Hypergraph,
    pub positions: Vec<Position>,
}

/// Execute the `hf run` command.
pub async fn execute(config: &Config, options: RunOptions) -> Result<LayoutSnapshot> {
    let topology = random_hypergraph(options.generator)?;

    let mut engine =
        LayoutEngine::new(config.engine.clone()).context("Failed to create layout engine")?;
    engine
        .load(topology, config.simulation.clone())
        .context("Failed to load hypergraph")?;

    println!(
        "🔧 Laying out {} nodes, {} hyperedges on {} threads",
        engine.node_count(),
        engine.edge_count(),
        engine.worker_threads()
    );

    let start = Instant::now();
    let max_ticks = options.max_ticks;
    let interval = u64::from(options.progress_interval);

    // Ticks are CPU-bound; keep them off the async runtime's workers
    let (engine, last) = tokio::task::spawn_blocking(move || -> Result<(LayoutEngine, Option<TickReport>)> {
        let mut last = None;
        for _ in 0..max_ticks {
            let report = engine.tick()?;
            if !report.advanced {
                break;
            }
            if interval > 0 && report.iteration % interval == 0 {
                tracing::info!(
                    "Tick {}: alpha {:.4} ({}), max speed {:.2}",
                    report.iteration,
                    report.alpha,
                    report.state,
                    report.max_speed
                );
            }
            last = Some(report);
        }
        Ok((engine, last))
    })
    .await
    .context("Layout task panicked")??;
    let elapsed = start.elapsed();

    let positions = engine
        .read_positions()
        .await
        .context("Failed to read back positions")?;

    let topology = engine
        .topology()
        .cloned()
        .context("Layout engine lost its topology")?;

    let snapshot = LayoutSnapshot {
        iteration: engine.iteration(),
        alpha: engine.params().alpha,
        state: engine.state(),
        bounds: Bounds::from_points(positions.iter().map(|p| (p.x, p.y))),
        topology,
        positions,
    };

    print_summary(&snapshot, last.as_ref(), elapsed);

    if let Some(path) = &options.output {
        write_snapshot(&snapshot, path)?;
        println!("💾 Wrote layout to {}", path.display());
    }

    Ok(snapshot)
}

fn print_summary(snapshot: &LayoutSnapshot, last: Option<&TickReport>, elapsed: std::time::Duration) {
    let status = match snapshot.state {
        LayoutState::Settled => "✅ Settled",
        LayoutState::Cooling => "⏳ Still cooling",
        LayoutState::Hot => "🔥 Still hot",
    };
    println!();
    println!("{} after {} ticks in {:.2?}", status, snapshot.iteration, elapsed);
    println!("{:─<50}", "");
    println!("Alpha:      {:.5}", snapshot.alpha);
    if let Some(report) = last {
        println!("Max speed:  {:.3}", report.max_speed);
    }
    let b = &snapshot.bounds;
    println!(
        "Bounds:     ({:.1}, {:.1}) to ({:.1}, {:.1})",
        b.min_x, b.min_y, b.max_x, b.max_y
    );
    if snapshot.iteration > 0 {
        println!("Per tick:   {:.2?}", elapsed / snapshot.iteration as u32);
    }
}

fn write_snapshot(snapshot: &LayoutSnapshot, path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    let contents = serde_json::to_string(snapshot)?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write layout to {}", path.display()))
}
