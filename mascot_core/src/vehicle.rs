// mascot_core/src/vehicle.rs

use crate::types::Location;

/// Where the vehicle is, where it came from, where it must end up, and how
/// much distance it may still travel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub current: Location,
    /// Previous waypoint; equal to `current` before the first move.
    pub previous: Location,
    pub goal: Location,
    /// Remaining travel budget in metres.
    pub budget: f64,
}

impl VehicleState {
    pub fn new(start: Location, goal: Location, budget: f64) -> Self {
        Self {
            current: start,
            previous: start,
            goal,
            budget,
        }
    }

    /// Moves to `next`, charging the straight-line distance to the budget.
    /// Returns the distance travelled.
    pub fn advance_to(&mut self, next: Location) -> f64 {
        let travelled = nalgebra::distance(&self.current, &next);
        self.previous = self.current;
        self.current = next;
        self.budget = (self.budget - travelled).max(0.0);
        travelled
    }

    pub fn distance_to_goal(&self) -> f64 {
        nalgebra::distance(&self.current, &self.goal)
    }

    pub fn has_arrived(&self, radius: f64) -> bool {
        self.distance_to_goal() <= radius
    }
}
