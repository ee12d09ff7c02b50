// mascot_core/src/fields/constraints.rs

//! Geometric constraint surfaces: obstacles, remaining travel budget, and
//! heading consistency.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::geometry::OperationalArea;
use crate::grid::Grid;
use crate::planning::error::PlanningError;
use crate::types::{CostField, Location};

/// Tunables for the constraint fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConstraintParams {
    /// Finite cost added to candidates behind the vehicle.
    pub heading_penalty: f64,
    /// Below this remaining budget the vehicle must head home.
    pub budget_margin: f64,
    /// Below this semi-minor axis the ellipse leaves no room to manoeuvre.
    pub ellipse_minor_margin: f64,
}

impl Default for ConstraintParams {
    fn default() -> Self {
        Self {
            heading_penalty: 10.0,
            budget_margin: 0.0,
            ellipse_minor_margin: 0.1,
        }
    }
}

/// `+inf` for grid points inside an obstacle or outside the border, `0` elsewhere.
pub fn obstacle_field(grid: &Grid, area: &OperationalArea) -> CostField {
    let field = CostField::from_iterator(
        grid.len(),
        grid.locations()
            .iter()
            .map(|p| if area.is_free(p) { 0.0 } else { f64::INFINITY }),
    );
    debug!(
        blocked = field.iter().filter(|v| v.is_infinite()).count(),
        "Obstacle field computed"
    );
    field
}

/// The reachable region under the remaining budget: an ellipse with foci at
/// the current location and the goal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetEllipse {
    pub centre: Location,
    /// Heading of the major axis, radians from the +x axis.
    pub angle: f64,
    /// Semi-major axis, half the remaining budget.
    pub a: f64,
    /// Semi-minor axis.
    pub b: f64,
    /// Half the focal distance.
    pub c: f64,
}

impl BudgetEllipse {
    /// Returns `ReturnToGoalRequired` when the budget is too small to leave
    /// any meaningful detour (including budget <= straight-line distance).
    pub fn new(
        current: &Location,
        goal: &Location,
        budget: f64,
        params: &ConstraintParams,
    ) -> Result<Self, PlanningError> {
        let c = nalgebra::distance(current, goal) / 2.0;
        let a = budget / 2.0;
        let b_squared = a * a - c * c;
        if !budget.is_finite() || budget < params.budget_margin || b_squared <= 0.0 {
            info!(budget, distance = 2.0 * c, "Budget exhausted, must return to goal");
            return Err(PlanningError::ReturnToGoalRequired { budget });
        }
        let b = b_squared.sqrt();
        if b <= params.ellipse_minor_margin {
            info!(budget, b, "Budget ellipse collapsed, must return to goal");
            return Err(PlanningError::ReturnToGoalRequired { budget });
        }
        let delta = goal - current;
        Ok(Self {
            centre: nalgebra::center(current, goal),
            angle: delta.y.atan2(delta.x),
            a,
            b,
            c,
        })
    }

    pub fn contains(&self, point: &Location) -> bool {
        let d = point - self.centre;
        let (sin, cos) = self.angle.sin_cos();
        let along = d.x * cos + d.y * sin;
        let across = -d.x * sin + d.y * cos;
        (along / self.a).powi(2) + (across / self.b).powi(2) <= 1.0
    }
}

/// `0` inside the budget ellipse, `+inf` outside.
pub fn budget_field(grid: &Grid, ellipse: &BudgetEllipse) -> CostField {
    CostField::from_iterator(
        grid.len(),
        grid.locations()
            .iter()
            .map(|p| if ellipse.contains(p) { 0.0 } else { f64::INFINITY }),
    )
}

/// `0` for candidates ahead of the vehicle (non-negative dot product with the
/// travel direction), `penalty` for those behind. With no previous motion
/// every candidate counts as ahead.
pub fn direction_field(
    grid: &Grid,
    current: &Location,
    previous: &Location,
    penalty: f64,
) -> CostField {
    let heading = current - previous;
    CostField::from_iterator(
        grid.len(),
        grid.locations().iter().map(|p| {
            if heading.dot(&(p - current)) >= 0.0 {
                0.0
            } else {
                penalty
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;

    fn grid() -> Grid {
        Grid::regular(Location::new(0.5, 0.5), 1.0, 10, 10)
    }

    #[test]
    fn obstacle_field_is_binary() {
        let area = OperationalArea::new(
            Polygon::rectangle(Location::new(0.0, 0.0), Location::new(10.0, 10.0)),
            vec![Polygon::rectangle(Location::new(3.0, 3.0), Location::new(6.0, 6.0))],
        );
        let field = obstacle_field(&grid(), &area);
        assert!(field.iter().all(|&v| v == 0.0 || v == f64::INFINITY));
        assert_eq!(field.iter().filter(|v| v.is_infinite()).count(), 9);
        // Outside the border counts as blocked too.
        let small = OperationalArea::new(
            Polygon::rectangle(Location::new(0.0, 0.0), Location::new(5.0, 10.0)),
            vec![],
        );
        let field = obstacle_field(&grid(), &small);
        assert_eq!(field.iter().filter(|v| v.is_infinite()).count(), 50);
    }

    #[test]
    fn budget_field_is_binary_and_contains_foci() {
        let current = Location::new(1.5, 1.5);
        let goal = Location::new(8.5, 8.5);
        let ellipse =
            BudgetEllipse::new(&current, &goal, 12.0, &ConstraintParams::default()).unwrap();
        let grid = grid();
        let field = budget_field(&grid, &ellipse);
        assert!(field.iter().all(|&v| v == 0.0 || v == f64::INFINITY));
        assert_eq!(field[grid.nearest_index(&current).unwrap()], 0.0);
        assert_eq!(field[grid.nearest_index(&goal).unwrap()], 0.0);
        // Far off-axis corner is out of reach.
        assert_eq!(field[grid.nearest_index(&Location::new(9.5, 0.5)).unwrap()], f64::INFINITY);
    }

    #[test]
    fn budget_equal_to_distance_requires_return() {
        let current = Location::new(0.0, 0.0);
        let goal = Location::new(3.0, 4.0);
        let result = BudgetEllipse::new(&current, &goal, 5.0, &ConstraintParams::default());
        assert_eq!(result, Err(PlanningError::ReturnToGoalRequired { budget: 5.0 }));
        let result = BudgetEllipse::new(&current, &goal, 4.0, &ConstraintParams::default());
        assert!(matches!(result, Err(PlanningError::ReturnToGoalRequired { .. })));
    }

    #[test]
    fn budget_below_margin_requires_return() {
        let params = ConstraintParams {
            budget_margin: 2.0,
            ..ConstraintParams::default()
        };
        let here = Location::new(1.0, 1.0);
        let result = BudgetEllipse::new(&here, &here, 1.5, &params);
        assert!(matches!(result, Err(PlanningError::ReturnToGoalRequired { .. })));
    }

    #[test]
    fn direction_field_penalizes_backtracking() {
        let grid = grid();
        let current = Location::new(5.5, 5.5);
        let previous = Location::new(4.5, 5.5);
        let field = direction_field(&grid, &current, &previous, 10.0);
        assert_eq!(field[grid.nearest_index(&Location::new(8.5, 2.5)).unwrap()], 0.0);
        assert_eq!(field[grid.nearest_index(&Location::new(1.5, 5.5)).unwrap()], 10.0);
        assert!(field.iter().all(|&v| v == 0.0 || v == 10.0));
        // No motion yet: nothing is behind.
        let still = direction_field(&grid, &current, &current, 10.0);
        assert!(still.iter().all(|&v| v == 0.0));
    }
}
