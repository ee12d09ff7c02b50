// mascot_core/src/planning/rrt_star.rs

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::PlanningError;
use super::tree::{Cost, NodeId, PlanningTree};
use super::PlanningContext;
use crate::types::Location;

/// Steps shorter than this would duplicate an existing node.
const MIN_EDGE_LENGTH: f64 = 1e-9;
/// A rewire must beat the current cost by at least this much.
const REWIRE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RrtStarConfig {
    pub max_iterations: usize,
    /// Wall-clock cap per plan, in milliseconds. `None` runs until
    /// `max_iterations`.
    pub max_duration_ms: Option<u64>,
    /// Longest edge the tree may add in one iteration.
    pub step_size: f64,
    /// Probability of sampling the goal instead of a uniform point.
    pub goal_sample_rate: f64,
    pub neighbour_radius: f64,
    pub goal_acceptance_radius: f64,
    /// Interior points at which an edge samples the cost valley.
    pub segment_samples: usize,
}

impl Default for RrtStarConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1500,
            max_duration_ms: None,
            step_size: 1.0,
            goal_sample_rate: 0.1,
            neighbour_radius: 2.0,
            goal_acceptance_radius: 0.5,
            segment_samples: 3,
        }
    }
}

impl RrtStarConfig {
    pub fn validate(&self) -> Result<(), PlanningError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if self.max_iterations == 0 {
            return Err(PlanningError::InvalidConfig("max_iterations must be at least 1".into()));
        }
        if !positive(self.step_size) {
            return Err(PlanningError::InvalidConfig(format!(
                "step_size must be positive, got {}",
                self.step_size
            )));
        }
        if !(0.0..=1.0).contains(&self.goal_sample_rate) {
            return Err(PlanningError::InvalidConfig(format!(
                "goal_sample_rate must lie in [0, 1], got {}",
                self.goal_sample_rate
            )));
        }
        if !positive(self.neighbour_radius) || !positive(self.goal_acceptance_radius) {
            return Err(PlanningError::InvalidConfig(
                "neighbour_radius and goal_acceptance_radius must be positive".into(),
            ));
        }
        if self.segment_samples == 0 {
            return Err(PlanningError::InvalidConfig("segment_samples must be at least 1".into()));
        }
        Ok(())
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_ms.map(Duration::from_millis)
    }
}

/// Where the planner is in its iteration. Each call to [`RrtStar::step`]
/// performs exactly one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerPhase {
    /// Sample, steer, and attach a new node to the cheapest feasible parent.
    Growing,
    /// Offer the freshly added node as a cheaper parent to its neighbours.
    Rewiring { node: NodeId },
    /// Record the node if it landed within the goal acceptance radius.
    GoalCheck { node: NodeId },
    /// Iteration or time budget spent; the tree no longer changes.
    Terminated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPath {
    /// Root (current location) first.
    pub waypoints: Vec<Location>,
    pub cost: Cost,
}

pub struct RrtStar<'a> {
    config: RrtStarConfig,
    context: PlanningContext<'a>,
    goal: Location,
    bounds: (Location, Location),
    tree: PlanningTree,
    phase: PlannerPhase,
    iterations: usize,
    started: Option<Instant>,
    /// Neighbour set of the last inserted node, consumed by the rewiring phase.
    neighbours: Vec<NodeId>,
    goal_nodes: Vec<NodeId>,
}

impl<'a> RrtStar<'a> {
    pub fn new(
        config: RrtStarConfig,
        context: PlanningContext<'a>,
        start: Location,
        goal: Location,
    ) -> Result<Self, PlanningError> {
        config.validate()?;
        if context.cost_field.len() != context.grid.len() {
            return Err(PlanningError::FieldSizeMismatch {
                field: context.cost_field.len(),
                grid: context.grid.len(),
            });
        }
        if context.grid.is_empty() || !context.area.is_free(&start) {
            return Err(PlanningError::StartOutsideGrid(start));
        }
        let bounds = context.area.bounding_box().ok_or_else(|| {
            PlanningError::InvalidConfig("operational area has an empty border".into())
        })?;

        let tree = PlanningTree::with_root(start);
        let mut goal_nodes = Vec::new();
        if nalgebra::distance(&start, &goal) <= config.goal_acceptance_radius {
            goal_nodes.push(PlanningTree::ROOT);
        }
        debug!(%start, %goal, "RRT* initialized");
        Ok(Self {
            config,
            context,
            goal,
            bounds,
            tree,
            phase: PlannerPhase::Growing,
            iterations: 0,
            started: None,
            neighbours: Vec::new(),
            goal_nodes,
        })
    }

    pub fn tree(&self) -> &PlanningTree {
        &self.tree
    }

    pub fn phase(&self) -> PlannerPhase {
        self.phase
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Advances the planner by one phase transition and returns the new phase.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> PlannerPhase {
        let started = *self.started.get_or_insert_with(Instant::now);
        self.phase = match self.phase {
            PlannerPhase::Growing => {
                if self.budget_spent(started) {
                    PlannerPhase::Terminated
                } else {
                    self.iterations += 1;
                    match self.grow(rng) {
                        Some(node) => PlannerPhase::Rewiring { node },
                        None => PlannerPhase::Growing,
                    }
                }
            }
            PlannerPhase::Rewiring { node } => {
                self.rewire(node);
                PlannerPhase::GoalCheck { node }
            }
            PlannerPhase::GoalCheck { node } => {
                let location = self.tree.node(node).location;
                if nalgebra::distance(&location, &self.goal) <= self.config.goal_acceptance_radius {
                    self.goal_nodes.push(node);
                }
                PlannerPhase::Growing
            }
            PlannerPhase::Terminated => PlannerPhase::Terminated,
        };
        self.phase
    }

    /// Runs to termination and extracts the cheapest path to the goal region.
    pub fn plan<R: Rng>(mut self, rng: &mut R) -> Result<PlannedPath, PlanningError> {
        while self.step(rng) != PlannerPhase::Terminated {}
        self.best_path()
    }

    /// Cheapest root-to-goal path found so far.
    pub fn best_path(&self) -> Result<PlannedPath, PlanningError> {
        let best = self
            .goal_nodes
            .iter()
            .copied()
            .min_by(|&a, &b| self.tree.node(a).cost.total_cmp(&self.tree.node(b).cost));
        match best {
            Some(node) => {
                let path = PlannedPath {
                    waypoints: self.tree.path_to(node),
                    cost: self.tree.node(node).cost,
                };
                info!(
                    iterations = self.iterations,
                    nodes = self.tree.len(),
                    cost = path.cost,
                    vertices = path.waypoints.len(),
                    "RRT* found a path"
                );
                Ok(path)
            }
            None => Err(PlanningError::PlanningFailed {
                start: self.tree.node(PlanningTree::ROOT).location,
                goal: self.goal,
                iterations: self.iterations,
                nodes: self.tree.len(),
            }),
        }
    }

    fn budget_spent(&self, started: Instant) -> bool {
        if self.iterations >= self.config.max_iterations {
            return true;
        }
        self.config
            .max_duration()
            .is_some_and(|limit| started.elapsed() >= limit)
    }

    fn grow<R: Rng>(&mut self, rng: &mut R) -> Option<NodeId> {
        let sample = self.sample(rng);
        let nearest = self.tree.nearest(&sample);
        let from = self.tree.node(nearest).location;
        let new = self.steer(&from, &sample);
        if nalgebra::distance(&from, &new) < MIN_EDGE_LENGTH {
            return None;
        }

        // --- Choose parent ---
        let mut parent = nearest;
        let mut cost = self.tree.node(nearest).cost + self.edge_cost(&from, &new)?;
        let neighbours = self.tree.near(&new, self.config.neighbour_radius);
        for &candidate in &neighbours {
            let node = self.tree.node(candidate);
            if candidate == nearest || node.cost >= cost {
                continue;
            }
            if let Some(edge) = self.edge_cost(&node.location, &new) {
                if node.cost + edge < cost {
                    parent = candidate;
                    cost = node.cost + edge;
                }
            }
        }

        let id = self.tree.insert(new, parent, cost);
        self.neighbours = neighbours;
        Some(id)
    }

    fn rewire(&mut self, node: NodeId) {
        let neighbours = std::mem::take(&mut self.neighbours);
        let origin = self.tree.node(node).location;
        let origin_cost = self.tree.node(node).cost;
        let parent = self.tree.node(node).parent;
        let mut rewired = 0;
        for candidate in neighbours {
            if candidate == node || Some(candidate) == parent {
                continue;
            }
            let target = self.tree.node(candidate).location;
            let current = self.tree.node(candidate).cost;
            let Some(edge) = self.edge_cost(&origin, &target) else {
                continue;
            };
            let through = origin_cost + edge;
            if through < current - REWIRE_TOLERANCE {
                self.tree.reparent(candidate, node, through);
                rewired += 1;
            }
        }
        if rewired > 0 {
            debug!(node, rewired, "Rewired neighbours");
        }
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> Location {
        if rng.gen_bool(self.config.goal_sample_rate) {
            return self.goal;
        }
        let (min, max) = self.bounds;
        Location::new(rng.gen_range(min.x..=max.x), rng.gen_range(min.y..=max.y))
    }

    fn steer(&self, from: &Location, towards: &Location) -> Location {
        let delta = towards - from;
        let length = delta.norm();
        if length <= self.config.step_size {
            *towards
        } else {
            *from + delta * (self.config.step_size / length)
        }
    }

    /// Segment length plus the mean cost valley at evenly spaced interior
    /// points. `None` if the segment leaves the free area or touches an
    /// infinite cost.
    fn edge_cost(&self, from: &Location, to: &Location) -> Option<Cost> {
        if !self.context.area.is_segment_free(from, to) {
            return None;
        }
        let samples = self.config.segment_samples;
        let mut penalty = 0.0;
        for k in 1..=samples {
            let t = k as f64 / (samples + 1) as f64;
            let point = Location::from(from.coords.lerp(&to.coords, t));
            let value = self.context.cost_at(&point)?;
            if !value.is_finite() {
                return None;
            }
            penalty += value;
        }
        if !self.context.cost_at(to)?.is_finite() {
            return None;
        }
        Some(nalgebra::distance(from, to) + penalty / samples as f64)
    }
}
