// mascot_core/src/planning/mod.rs

//! Informative path planning over the cost valley.

pub mod error;
pub mod rrt_star;
pub mod tree;

pub use error::PlanningError;
pub use rrt_star::{PlannedPath, PlannerPhase, RrtStar, RrtStarConfig};
pub use tree::{Cost, NodeId, PlanningTree, TreeNode};

use crate::geometry::OperationalArea;
use crate::grid::Grid;
use crate::types::{CostField, Location};

/// Everything the planner reads but never writes during one plan.
#[derive(Debug, Clone, Copy)]
pub struct PlanningContext<'a> {
    pub grid: &'a Grid,
    pub area: &'a OperationalArea,
    /// One cost per grid index.
    pub cost_field: &'a CostField,
}

impl<'a> PlanningContext<'a> {
    pub fn new(grid: &'a Grid, area: &'a OperationalArea, cost_field: &'a CostField) -> Self {
        Self {
            grid,
            area,
            cost_field,
        }
    }

    /// Cost valley value at the grid point nearest `location`.
    pub fn cost_at(&self, location: &Location) -> Option<f64> {
        self.grid
            .nearest_index(location)
            .and_then(|i| self.cost_field.get(i).copied())
    }
}
