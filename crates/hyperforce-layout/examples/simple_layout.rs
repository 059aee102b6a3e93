//! Lay out a small hypergraph and print how it settles.
//!
//! Run with: cargo run --example simple_layout

use hyperforce_layout::{sync, Hypergraph, LayoutConfig, LayoutEngine, SimulationParams};

fn main() {
    tracing_subscriber::fmt::init();

    // Rings of five nodes, each ring one hyperedge, chained by pair edges
    let rings = 20u32;
    let mut edges: Vec<Vec<u32>> = Vec::new();
    for r in 0..rings {
        edges.push((r * 5..r * 5 + 5).collect());
        if r > 0 {
            edges.push(vec![r * 5 - 1, r * 5]);
        }
    }
    let topology = Hypergraph::from_edges(rings * 5, edges).expect("Invalid hypergraph");

    println!(
        "Hypergraph: {} nodes, {} hyperedges",
        topology.node_count(),
        topology.edge_count()
    );

    let mut engine = LayoutEngine::new(LayoutConfig::default()).expect("Failed to create engine");
    engine
        .load(topology, SimulationParams::default())
        .expect("Failed to load hypergraph");

    loop {
        let report = engine.tick().expect("Tick failed");
        if !report.advanced {
            break;
        }
        if report.iteration % 50 == 0 {
            let bounds = report.bounds;
            println!(
                "Tick {:>3}: alpha = {:.4} ({}), max speed = {:.2}, bounds = ({:.1}, {:.1}) to ({:.1}, {:.1})",
                report.iteration,
                report.alpha,
                report.state,
                report.max_speed,
                bounds.min_x,
                bounds.min_y,
                bounds.max_x,
                bounds.max_y
            );
        }
    }

    println!("\nSettled after {} ticks", engine.iteration());

    let positions = sync::positions_blocking(&engine).expect("Readback failed");
    println!("\nFinal positions (first 5 nodes):");
    for (i, pos) in positions.iter().take(5).enumerate() {
        println!("  Node {}: ({:.2}, {:.2})", i, pos.x, pos.y);
    }
}
