//! End-to-end properties of the layout engine through its public API.

use std::time::{Duration, Instant};

use hyperforce_layout::{
    sync, Hypergraph, LayoutConfig, LayoutEngine, LayoutState, Position, SimulationParams,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ============================================================================
// Fixtures
// ============================================================================

fn engine(threads: usize) -> LayoutEngine {
    LayoutEngine::new(LayoutConfig {
        threads,
        sort_partition_size: 64,
        bounds_refresh_interval: 1,
        ..Default::default()
    })
    .unwrap()
}

fn random_hypergraph(nodes: u32, edges: usize, max_size: usize, seed: u64) -> Hypergraph {
    let mut rng = StdRng::seed_from_u64(seed);
    let edges: Vec<Vec<u32>> = (0..edges)
        .map(|_| {
            let size = rng.random_range(1..=max_size);
            (0..size).map(|_| rng.random_range(0..nodes)).collect()
        })
        .collect();
    Hypergraph::from_edges(nodes, edges).unwrap()
}

fn centroid(points: &[Position]) -> Position {
    let n = points.len() as f32;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |acc, p| (acc.0 + p.x, acc.1 + p.y));
    Position::new(sx / n, sy / n)
}

fn mean_distance_to_centroid(points: &[Position]) -> f32 {
    let c = centroid(points);
    points.iter().map(|p| p.distance(c)).sum::<f32>() / points.len() as f32
}

fn extent(points: &[Position]) -> f32 {
    let (min_x, max_x, min_y, max_y) = points.iter().fold(
        (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
        |(min_x, max_x, min_y, max_y), p| {
            (min_x.min(p.x), max_x.max(p.x), min_y.min(p.y), max_y.max(p.y))
        },
    );
    (max_x - min_x).max(max_y - min_y)
}

// ============================================================================
// Tick / readback
// ============================================================================

#[test]
fn test_readback_keeps_count_and_stays_finite() {
    for (nodes, edges) in [(1, 0), (2, 1), (37, 20), (1000, 400)] {
        let mut engine = engine(4);
        engine
            .load(random_hypergraph(nodes, edges, 6, nodes as u64), SimulationParams::default())
            .unwrap();

        for _ in 0..25 {
            engine.tick().unwrap();
        }

        let positions = sync::positions_blocking(&engine).unwrap();
        assert_eq!(positions.len(), nodes as usize);
        assert!(positions.iter().all(Position::is_finite), "{nodes} nodes");
    }
}

#[test]
fn test_readback_reflects_request_time() {
    let mut engine = engine(2);
    engine
        .load(random_hypergraph(200, 50, 4, 3), SimulationParams::default())
        .unwrap();
    engine.tick().unwrap();

    let expected = engine.positions();
    let readback = engine.read_positions();
    engine.tick().unwrap();
    engine.tick().unwrap();

    assert_eq!(pollster::block_on(readback).unwrap(), expected);
    assert_ne!(engine.positions(), expected);
}

#[test]
fn test_reload_with_more_nodes_reallocates() {
    let mut engine = engine(2);
    engine.load(Hypergraph::empty(10), SimulationParams::default()).unwrap();
    engine.tick().unwrap();

    engine
        .load(random_hypergraph(5000, 1000, 8, 1), SimulationParams::default())
        .unwrap();
    assert_eq!(engine.iteration(), 0);
    engine.tick().unwrap();
    assert_eq!(engine.node_count(), 5000);
    assert_eq!(engine.edge_count(), 1000);

    engine.load(Hypergraph::empty(3), SimulationParams::default()).unwrap();
    engine.tick().unwrap();
    assert_eq!(sync::positions_blocking(&engine).unwrap().len(), 3);
}

#[test]
fn test_bounds_refresh_off_the_tick_path() {
    let mut engine = engine(2);
    let params = SimulationParams {
        alpha_decay: 0.0,
        ..Default::default()
    };
    engine.load(Hypergraph::empty(300), params).unwrap();
    let initial = engine.bounds();

    let deadline = Instant::now() + Duration::from_secs(10);
    while engine.bounds() == initial {
        assert!(Instant::now() < deadline, "bounds were never refreshed");
        engine.tick().unwrap();
        std::thread::sleep(Duration::from_millis(1));
    }

    // Nodes only spread out, so a fresh box is wider
    assert!(engine.bounds().width() > initial.width());
}

// ============================================================================
// Cooldown
// ============================================================================

#[test]
fn test_alpha_non_increasing_and_settles_on_schedule() {
    let mut engine = engine(2);
    let params = SimulationParams::default();
    let predicted = params.ticks_to_settle().unwrap();
    engine.load(random_hypergraph(100, 30, 5, 8), params).unwrap();

    let mut previous = engine.params().alpha;
    let mut ticks = 0u32;
    while engine.state() != LayoutState::Settled {
        let report = engine.tick().unwrap();
        assert!(report.advanced);
        assert!(report.alpha <= previous);
        previous = report.alpha;
        ticks += 1;
        assert!(ticks < 10_000);
    }
    assert!(ticks.abs_diff(predicted) <= 1, "{ticks} vs {predicted}");

    let frozen = engine.positions();
    let report = engine.tick().unwrap();
    assert!(!report.advanced);
    assert_eq!(engine.positions(), frozen);
}

#[test]
fn test_cooling_passes_through_states_in_order() {
    let mut engine = engine(1);
    engine.load(Hypergraph::empty(20), SimulationParams::default()).unwrap();
    assert_eq!(engine.state(), LayoutState::Hot);

    let mut seen = vec![LayoutState::Hot];
    while engine.state() != LayoutState::Settled {
        let state = engine.tick().unwrap().state;
        if seen.last() != Some(&state) {
            seen.push(state);
        }
    }
    assert_eq!(seen, vec![LayoutState::Hot, LayoutState::Cooling, LayoutState::Settled]);

    engine.reset_alpha();
    assert_eq!(engine.state(), LayoutState::Hot);
    assert!(engine.tick().unwrap().advanced);
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_single_hyperedge_pulls_members_together() {
    let mut engine = engine(2);
    let topology = Hypergraph::from_edges(3, [[0u32, 1, 2]]).unwrap();
    let start = [
        Position::new(-100.0, 0.0),
        Position::new(100.0, 0.0),
        Position::new(0.0, 150.0),
    ];
    engine
        .load_with_positions(topology, &start, SimulationParams::default())
        .unwrap();

    engine.tick().unwrap();
    let after_one = engine.positions();
    for (before, after) in start.iter().zip(&after_one) {
        assert_ne!(before, after);
    }

    let mut spread = mean_distance_to_centroid(&start);
    for _ in 0..5 {
        engine.tick().unwrap();
        let now = mean_distance_to_centroid(&engine.positions());
        assert!(now < spread, "{now} >= {spread}");
        spread = now;
    }
}

#[test]
fn test_without_hyperedges_nodes_disperse() {
    let params = SimulationParams::default();

    let mut isolated = engine(2);
    isolated.load(Hypergraph::empty(80), params.clone()).unwrap();
    let initial = extent(&isolated.positions());

    let mut connected = engine(2);
    connected
        .load(random_hypergraph(80, 40, 5, 12), params)
        .unwrap();

    for _ in 0..30 {
        let a = isolated.tick().unwrap();
        let b = connected.tick().unwrap();
        assert_eq!(a.alpha, b.alpha);
    }

    assert!(extent(&isolated.positions()) > initial);
}

#[test]
fn test_drag_while_settled_reheats_neighbors() {
    let mut engine = engine(2);
    let topology = Hypergraph::from_edges(5, [vec![0u32, 1, 2], vec![3, 4]]).unwrap();
    let params = SimulationParams::default();
    let settled = SimulationParams {
        alpha: params.alpha_min,
        ..params.clone()
    };
    engine.load(topology.clone(), settled).unwrap();
    assert_eq!(engine.state(), LayoutState::Settled);
    assert_eq!(topology.neighbors(0), vec![1, 2]);

    let before = engine.positions();
    assert!(!engine.tick().unwrap().advanced);

    engine.upload_position(0, 300.0, 300.0, 0.0, 0.0).unwrap();
    assert!(engine.params().alpha >= params.alpha_reheat);
    assert_eq!(engine.state(), LayoutState::Hot);

    engine.tick().unwrap();
    let after = engine.positions();
    for neighbor in topology.neighbors(0) {
        let i = neighbor as usize;
        assert!(before[i].distance(after[i]) > 0.1, "neighbor {neighbor} did not move");
    }
}

#[test]
fn test_thread_count_does_not_change_node_count_or_finiteness() {
    let topology = random_hypergraph(3000, 800, 10, 77);
    for threads in [1, 3, 8] {
        let mut engine = engine(threads);
        engine.load(topology.clone(), SimulationParams::default()).unwrap();
        for _ in 0..5 {
            engine.tick().unwrap();
        }
        let positions = engine.positions();
        assert_eq!(positions.len(), 3000);
        assert!(positions.iter().all(Position::is_finite));
    }
}
