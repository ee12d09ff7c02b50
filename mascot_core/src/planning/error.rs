// mascot_core/src/planning/error.rs

use thiserror::Error;

use crate::types::Location;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanningError {
    /// The remaining budget leaves no room for anything but heading home.
    /// Callers switch to return-to-goal planning; this is not fatal.
    #[error("remaining budget {budget:.2} only allows returning to the goal")]
    ReturnToGoalRequired { budget: f64 },

    /// The tree never reached the goal within its iteration/time budget.
    #[error("no path from {start} to {goal} after {iterations} iterations ({nodes} tree nodes)")]
    PlanningFailed {
        start: Location,
        goal: Location,
        iterations: usize,
        nodes: usize,
    },

    /// The vehicle is not on a free grid location, so no field is defined there.
    #[error("start location {0} is outside the grid or inside an obstacle")]
    StartOutsideGrid(Location),

    #[error("cost field has {field} entries but the grid has {grid}")]
    FieldSizeMismatch { field: usize, grid: usize },

    #[error("invalid planner configuration: {0}")]
    InvalidConfig(String),
}
