// mascot_core/src/pipeline.rs

//! One planning cycle: fields, cost valley, RRT*, next waypoint.

use rand::Rng;
use tracing::{debug, info};

use crate::belief::SpatialBeliefField;
use crate::error::BeliefError;
use crate::fields::constraints::{obstacle_field, ConstraintParams};
use crate::fields::cost_valley::{CostValley, FieldContext};
use crate::geometry::OperationalArea;
use crate::grid::Grid;
use crate::planning::{PlannedPath, PlanningContext, PlanningError, RrtStar, RrtStarConfig};
use crate::types::Location;
use crate::vehicle::VehicleState;

/// Distances below this count as "the same spot".
const SAME_LOCATION: f64 = 1e-9;

/// The outcome of one cycle: where to go next and the full path that led to
/// that choice.
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointPlan {
    pub waypoint: Location,
    pub path: Vec<Location>,
    pub cost: f64,
}

impl WaypointPlan {
    /// The next waypoint is the second path vertex; a path that never left
    /// the root means we are already at the goal.
    fn from_path(path: PlannedPath, goal: Location) -> Self {
        let waypoint = path.waypoints.get(1).copied().unwrap_or(goal);
        Self {
            waypoint,
            path: path.waypoints,
            cost: path.cost,
        }
    }
}

/// Owns the static mission geometry and parameters and runs the per-cycle
/// planning pipeline. The belief and vehicle state are borrowed per call.
#[derive(Debug, Clone)]
pub struct CyclePlanner {
    grid: Grid,
    area: OperationalArea,
    threshold: f64,
    constraints: ConstraintParams,
    rrt: RrtStarConfig,
    cost_valley: CostValley,
}

impl CyclePlanner {
    pub fn new(
        grid: Grid,
        area: OperationalArea,
        threshold: f64,
        constraints: ConstraintParams,
        rrt: RrtStarConfig,
    ) -> Result<Self, PlanningError> {
        rrt.validate()?;
        if !threshold.is_finite() {
            return Err(PlanningError::InvalidConfig(format!(
                "threshold must be finite, got {threshold}"
            )));
        }
        Ok(Self {
            grid,
            area,
            threshold,
            constraints,
            rrt,
            cost_valley: CostValley::new(),
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn area(&self) -> &OperationalArea {
        &self.area
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn rrt_config(&self) -> &RrtStarConfig {
        &self.rrt
    }

    pub fn cost_valley(&self) -> &CostValley {
        &self.cost_valley
    }

    /// Rebuilds the cost valley for `belief` and `vehicle` and plans a path
    /// through it to the goal.
    ///
    /// Returns `ReturnToGoalRequired` when the budget no longer allows
    /// exploring, and `PlanningFailed` when the tree never reached the goal.
    pub fn plan_next_waypoint<R: Rng>(
        &mut self,
        belief: &SpatialBeliefField,
        vehicle: &VehicleState,
        rng: &mut R,
    ) -> Result<WaypointPlan, PlanningError> {
        let ctx = FieldContext {
            grid: &self.grid,
            area: &self.area,
            threshold: self.threshold,
            params: &self.constraints,
        };
        let cost_field = self.cost_valley.update(belief, vehicle, &ctx)?;
        let context = PlanningContext::new(&self.grid, &self.area, cost_field);
        let path = RrtStar::new(self.rrt.clone(), context, vehicle.current, vehicle.goal)?.plan(rng)?;
        let plan = WaypointPlan::from_path(path, vehicle.goal);
        info!(
            waypoint = %plan.waypoint,
            cost = plan.cost,
            budget = vehicle.budget,
            "Planned next waypoint"
        );
        Ok(plan)
    }

    /// Homing plan: RRT* over the obstacle field alone, ignoring information.
    pub fn plan_return_to_goal<R: Rng>(
        &self,
        vehicle: &VehicleState,
        rng: &mut R,
    ) -> Result<WaypointPlan, PlanningError> {
        let obstacles = obstacle_field(&self.grid, &self.area);
        let context = PlanningContext::new(&self.grid, &self.area, &obstacles);
        let path = RrtStar::new(self.rrt.clone(), context, vehicle.current, vehicle.goal)?.plan(rng)?;
        let plan = WaypointPlan::from_path(path, vehicle.goal);
        info!(waypoint = %plan.waypoint, "Planned return to goal");
        Ok(plan)
    }

    /// Cheapest finite grid location of the last cost valley within one
    /// step of the vehicle, reachable in a straight free line.
    pub fn greedy_step(&self, vehicle: &VehicleState) -> Option<Location> {
        let total = self.cost_valley.total()?;
        let step = self.rrt.step_size;
        let best = self
            .grid
            .locations()
            .iter()
            .zip(total.iter())
            .filter(|(p, cost)| {
                let d = nalgebra::distance(*p, &vehicle.current);
                cost.is_finite() && d > SAME_LOCATION && d <= step
            })
            .filter(|(p, _)| self.area.is_segment_free(&vehicle.current, p))
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(p, _)| *p);
        debug!(found = best.is_some(), "Greedy step");
        best
    }
}

/// Folds a batch of measurements into the belief. The only place a cycle
/// mutates the belief.
pub fn update_belief(
    belief: &mut SpatialBeliefField,
    selection: &[usize],
    values: &[f64],
) -> Result<(), BeliefError> {
    let before = belief.total_variance();
    belief.assimilate(selection, values)?;
    debug!(
        samples = selection.len(),
        variance_before = before,
        variance_after = belief.total_variance(),
        "Belief updated"
    );
    Ok(())
}
