//! High-level layout interface.

use std::time::{Duration, Instant};

use crate::accumulator::ForceAccumulator;
use crate::bounds::BoundsTracker;
use crate::integrator::Damping;
use crate::{
    attraction, center, integrator, morton, repulsion, Bounds, Hypergraph, LayoutConfig,
    LayoutError, LayoutState, NodeState, Position, PositionsReadback, QuadTree, RadixSorter,
    Result, SimulationParams,
};

/// Scale of the phyllotaxis spiral used for default initial positions.
const INITIAL_RADIUS: f32 = 10.0;

/// Wall-clock time spent in each stage of the last tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTimings {
    pub keys: Duration,
    pub sort: Duration,
    pub build: Duration,
    pub summarize: Duration,
    pub repulsion: Duration,
    pub attraction: Duration,
    pub center: Duration,
    pub integrate: Duration,
}

impl StageTimings {
    /// Stages in pipeline order.
    pub fn stages(&self) -> [(&'static str, Duration); 8] {
        [
            ("keys", self.keys),
            ("sort", self.sort),
            ("build", self.build),
            ("summarize", self.summarize),
            ("repulsion", self.repulsion),
            ("attraction", self.attraction),
            ("center", self.center),
            ("integrate", self.integrate),
        ]
    }

    pub fn total(&self) -> Duration {
        self.stages().iter().map(|(_, d)| *d).sum()
    }

    /// Element-wise sum, for averaging over several ticks.
    pub fn accumulate(&mut self, other: &StageTimings) {
        self.keys += other.keys;
        self.sort += other.sort;
        self.build += other.build;
        self.summarize += other.summarize;
        self.repulsion += other.repulsion;
        self.attraction += other.attraction;
        self.center += other.center;
        self.integrate += other.integrate;
    }
}

/// Outcome of one call to [`LayoutEngine::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Ticks that actually ran since the last load.
    pub iteration: u64,
    /// Alpha after this tick's cooldown.
    pub alpha: f32,
    pub state: LayoutState,
    /// Largest node speed after damping.
    pub max_speed: f32,
    /// Bounding box stage 1 used.
    pub bounds: Bounds,
    pub timings: StageTimings,
    /// False when the tick was a no-op (settled or empty layout).
    pub advanced: bool,
}

/// Optional collaborator notified after every tick that ran, e.g. hull
/// computation or hit-testing caches.
pub trait LayoutObserver: Send {
    fn on_tick(&mut self, _report: &TickReport, _states: &[NodeState]) {}

    /// Called once on the tick that brings alpha to `alpha_min`.
    fn on_settled(&mut self, _report: &TickReport) {}
}

/// Per-node and per-tick storage, sized at load time.
struct LayoutBuffers {
    states: Vec<NodeState>,
    pinned: Vec<bool>,
    forces: ForceAccumulator,
    sorter: RadixSorter,
    tree: QuadTree,
}

impl LayoutBuffers {
    fn new(config: &LayoutConfig) -> Self {
        Self {
            states: Vec::new(),
            pinned: Vec::new(),
            forces: ForceAccumulator::new(config.fixed_point_scale),
            sorter: RadixSorter::new(config.sort_partition_size),
            tree: QuadTree::new(),
        }
    }

    /// Size every buffer for `n` nodes. Returns true if anything reallocated.
    fn resize(&mut self, n: usize) -> bool {
        let sorter = self.sorter.ensure_capacity(n);
        let forces = self.forces.ensure_capacity(n);
        let tree = self.tree.ensure_geometry(n);
        self.pinned.clear();
        self.pinned.resize(n, false);
        self.forces.clear();
        sorter || forces || tree
    }
}

/// Run `f` as one pipeline stage, recording its duration into `slot`.
fn timed<R>(slot: &mut Duration, stage: &'static str, f: impl FnOnce() -> R) -> R {
    let _span = tracing::trace_span!("stage", name = stage).entered();
    let start = Instant::now();
    let out = f();
    *slot = start.elapsed();
    out
}

/// Sunflower spiral around `(cx, cy)`: evenly spread, no coincident points.
fn phyllotaxis(n: usize, cx: f32, cy: f32) -> Vec<NodeState> {
    let golden_angle = std::f32::consts::PI * (3.0 - 5.0f32.sqrt());
    (0..n)
        .map(|i| {
            let radius = INITIAL_RADIUS * (0.5 + i as f32).sqrt();
            let angle = i as f32 * golden_angle;
            NodeState::at(cx + radius * angle.cos(), cy + radius * angle.sin())
        })
        .collect()
}

/// Parallel force-directed hypergraph layout.
pub struct LayoutEngine {
    pool: rayon::ThreadPool,
    config: LayoutConfig,
    params: SimulationParams,
    topology: Option<Hypergraph>,
    buffers: LayoutBuffers,
    bounds: Bounds,
    tracker: BoundsTracker,
    iteration: u64,
    timings: StageTimings,
    observer: Option<Box<dyn LayoutObserver>>,
}

impl LayoutEngine {
    /// Create a new layout engine with its own worker pool.
    pub fn new(config: LayoutConfig) -> Result<Self> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("hyperforce-worker-{i}"))
            .build()?;

        tracing::info!(
            "Layout engine created: {} worker threads, sort partition {}",
            pool.current_num_threads(),
            config.sort_partition_size
        );

        Ok(Self {
            pool,
            buffers: LayoutBuffers::new(&config),
            tracker: BoundsTracker::new(config.bounds_refresh_interval, config.bounds_padding),
            config,
            params: SimulationParams::default(),
            topology: None,
            bounds: Bounds::default(),
            iteration: 0,
            timings: StageTimings::default(),
            observer: None,
        })
    }

    /// Load a dataset with nodes spread on a spiral around the center point.
    pub fn load(&mut self, topology: Hypergraph, params: SimulationParams) -> Result<()> {
        params.validate()?;
        let states = phyllotaxis(topology.node_count() as usize, params.center_x, params.center_y);
        self.load_states(topology, states, params);
        Ok(())
    }

    /// Load a dataset with caller-provided initial positions.
    pub fn load_with_positions(
        &mut self,
        topology: Hypergraph,
        positions: &[Position],
        params: SimulationParams,
    ) -> Result<()> {
        params.validate()?;
        let expected = topology.node_count() as usize;
        if positions.len() != expected {
            return Err(LayoutError::PositionCountMismatch {
                expected,
                actual: positions.len(),
            });
        }
        if let Some((node, p)) = positions.iter().enumerate().find(|(_, p)| !p.is_finite()) {
            return Err(LayoutError::NonFinitePosition {
                node: node as u32,
                x: p.x,
                y: p.y,
            });
        }

        let states = positions.iter().map(|p| NodeState::at(p.x, p.y)).collect();
        self.load_states(topology, states, params);
        Ok(())
    }

    fn load_states(&mut self, topology: Hypergraph, states: Vec<NodeState>, params: SimulationParams) {
        let n = states.len();
        if self.buffers.resize(n) {
            tracing::info!("Reallocated layout buffers for {} nodes", n);
        }
        self.buffers.states = states;

        self.bounds = Bounds::for_keys(&self.buffers.states, self.tracker.padding());
        self.tracker.reset();
        self.params = params;
        self.iteration = 0;
        self.timings = StageTimings::default();

        tracing::info!(
            "Layout loaded: {} nodes, {} hyperedges, {} incidences",
            n,
            topology.edge_count(),
            topology.incidence_count()
        );
        self.topology = Some(topology);
    }

    /// Advance the simulation by one tick.
    ///
    /// Runs the eight stages in order on the worker pool, then cools alpha
    /// down. Does nothing once the layout is settled or empty.
    pub fn tick(&mut self) -> Result<TickReport> {
        let Self {
            pool,
            params,
            topology,
            buffers,
            bounds,
            tracker,
            iteration,
            timings,
            observer,
            ..
        } = self;
        let topology = topology.as_ref().ok_or(LayoutError::NotInitialized)?;
        params.validate()?;

        let n = buffers.states.len();
        if n == 0 || params.is_settled() {
            return Ok(TickReport {
                iteration: *iteration,
                alpha: params.alpha,
                state: params.state(),
                max_speed: 0.0,
                bounds: *bounds,
                timings: StageTimings::default(),
                advanced: false,
            });
        }

        if tracker.is_in_flight() {
            tracing::trace!("Bounds readback still in flight at tick {}", iteration);
        } else if let Some(fresh) = tracker.poll() {
            tracing::debug!(
                "Adopted bounds [{:.1}, {:.1}] x [{:.1}, {:.1}] at tick {}",
                fresh.min_x,
                fresh.max_x,
                fresh.min_y,
                fresh.max_y,
                iteration
            );
            *bounds = fresh;
        }

        let alpha = params.alpha;
        let key_bounds = *bounds;
        let damping = Damping {
            velocity_decay: params.velocity_decay,
            max_velocity: params.max_velocity,
        };
        let mut stage = StageTimings::default();

        let max_speed = pool.install(|| {
            timed(&mut stage.keys, "keys", || {
                let (keys, values) = buffers.sorter.input_mut(n);
                morton::generate_keys(&buffers.states, &key_bounds, keys, values);
            });
            timed(&mut stage.sort, "sort", || buffers.sorter.sort(n));
            timed(&mut stage.build, "build", || {
                buffers.tree.build(&buffers.states, buffers.sorter.values(n));
            });
            timed(&mut stage.summarize, "summarize", || buffers.tree.summarize());
            timed(&mut stage.repulsion, "repulsion", || {
                repulsion::accumulate(
                    &buffers.tree,
                    buffers.sorter.values(n),
                    &buffers.states,
                    params.repulsion_strength * alpha,
                    params.theta,
                    &buffers.forces,
                );
            });
            timed(&mut stage.attraction, "attraction", || {
                attraction::accumulate(
                    topology,
                    &buffers.states,
                    params.attraction_strength * alpha,
                    params.rest_length,
                    &buffers.forces,
                );
            });
            let uniform = timed(&mut stage.center, "center", || {
                center::uniform_force(
                    &buffers.states,
                    (params.center_x, params.center_y),
                    params.center_strength * alpha,
                )
            });
            timed(&mut stage.integrate, "integrate", || {
                integrator::integrate(
                    &mut buffers.states,
                    &buffers.pinned,
                    &buffers.forces,
                    uniform,
                    damping,
                )
            })
        });

        *timings = stage;
        params.decay_alpha();
        *iteration += 1;

        if tracker.on_tick(pool, &buffers.states) {
            tracing::trace!("Requested bounds readback at tick {}", iteration);
        }

        let report = TickReport {
            iteration: *iteration,
            alpha: params.alpha,
            state: params.state(),
            max_speed,
            bounds: key_bounds,
            timings: stage,
            advanced: true,
        };

        let settled = report.state == LayoutState::Settled;
        if settled {
            tracing::debug!("Layout settled after {} ticks", iteration);
        }
        if let Some(observer) = observer.as_mut() {
            observer.on_tick(&report, &buffers.states);
            if settled {
                observer.on_settled(&report);
            }
        }

        Ok(report)
    }

    /// Overwrite one node's state between ticks and reheat the layout.
    pub fn upload_position(&mut self, node: u32, x: f32, y: f32, vx: f32, vy: f32) -> Result<()> {
        let index = self.check_node(node)?;
        Self::check_finite(node, x, y)?;
        if !(vx.is_finite() && vy.is_finite()) {
            return Err(LayoutError::InvalidParams(format!(
                "velocity of node {node} must be finite, got ({vx}, {vy})"
            )));
        }

        self.buffers.states[index] = NodeState { x, y, vx, vy };
        self.params.reheat();
        tracing::debug!("Uploaded node {} at ({:.1}, {:.1}), alpha {:.3}", node, x, y, self.params.alpha);
        Ok(())
    }

    /// Hold a node at `(x, y)` until [`unpin`](Self::unpin), e.g. while dragged.
    pub fn pin(&mut self, node: u32, x: f32, y: f32) -> Result<()> {
        let index = self.check_node(node)?;
        Self::check_finite(node, x, y)?;
        self.buffers.states[index] = NodeState::at(x, y);
        self.buffers.pinned[index] = true;
        self.params.reheat();
        Ok(())
    }

    pub fn unpin(&mut self, node: u32) -> Result<()> {
        let index = self.check_node(node)?;
        self.buffers.pinned[index] = false;
        Ok(())
    }

    pub fn is_pinned(&self, node: u32) -> bool {
        self.buffers.pinned.get(node as usize).copied().unwrap_or(false)
    }

    fn check_node(&self, node: u32) -> Result<usize> {
        let topology = self.topology.as_ref().ok_or(LayoutError::NotInitialized)?;
        if node >= topology.node_count() {
            return Err(LayoutError::NodeOutOfRange {
                node,
                node_count: topology.node_count(),
            });
        }
        Ok(node as usize)
    }

    fn check_finite(node: u32, x: f32, y: f32) -> Result<()> {
        if x.is_finite() && y.is_finite() {
            Ok(())
        } else {
            Err(LayoutError::NonFinitePosition { node, x, y })
        }
    }

    /// Snapshot the current positions without blocking the tick loop.
    ///
    /// The state is copied now; later ticks do not affect the result.
    pub fn read_positions(&self) -> PositionsReadback {
        if self.topology.is_none() {
            return PositionsReadback::ready(Err(LayoutError::NotInitialized));
        }
        if self.buffers.states.is_empty() {
            return PositionsReadback::ready(Ok(Vec::new()));
        }
        PositionsReadback::spawn(&self.pool, self.buffers.states.clone())
    }

    /// Current node state, for in-process renderers.
    pub fn states(&self) -> &[NodeState] {
        &self.buffers.states
    }

    /// Current positions (without going through the worker pool).
    pub fn positions(&self) -> Vec<Position> {
        self.buffers.states.iter().map(NodeState::position).collect()
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Parameters are validated at the start of the next tick.
    pub fn params_mut(&mut self) -> &mut SimulationParams {
        &mut self.params
    }

    pub fn set_params(&mut self, params: SimulationParams) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// Raise alpha to at least the reheat floor.
    pub fn reheat(&mut self) {
        self.params.reheat();
    }

    /// Restart the cooldown from full energy.
    pub fn reset_alpha(&mut self) {
        self.params.alpha = 1.0;
    }

    pub fn state(&self) -> LayoutState {
        self.params.state()
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn topology(&self) -> Option<&Hypergraph> {
        self.topology.as_ref()
    }

    pub fn node_count(&self) -> usize {
        self.buffers.states.len()
    }

    pub fn edge_count(&self) -> usize {
        self.topology.as_ref().map_or(0, Hypergraph::edge_count)
    }

    /// Bounding box the next tick will key against.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn last_timings(&self) -> StageTimings {
        self.timings
    }

    pub fn set_observer(&mut self, observer: Box<dyn LayoutObserver>) {
        self.observer = Some(observer);
    }

    pub fn clear_observer(&mut self) -> Option<Box<dyn LayoutObserver>> {
        self.observer.take()
    }
}

/// Blocking helpers for callers without an async runtime (native only).
#[cfg(not(target_arch = "wasm32"))]
pub mod sync {
    use super::*;

    /// Read back positions, blocking until the snapshot is packed.
    pub fn positions_blocking(engine: &LayoutEngine) -> Result<Vec<Position>> {
        pollster::block_on(engine.read_positions())
    }
}
