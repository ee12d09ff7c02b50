// mascot_core/src/fields/cost_valley.rs

use tracing::debug;

use crate::belief::SpatialBeliefField;
use crate::fields::constraints::{
    budget_field, direction_field, obstacle_field, BudgetEllipse, ConstraintParams,
};
use crate::fields::information::InformationFields;
use crate::geometry::OperationalArea;
use crate::grid::Grid;
use crate::planning::error::PlanningError;
use crate::types::CostField;
use crate::vehicle::VehicleState;

/// Everything a cost valley is built from, borrowed for one cycle.
pub struct FieldContext<'a> {
    pub grid: &'a Grid,
    pub area: &'a OperationalArea,
    /// Excursion threshold for the EIBV field.
    pub threshold: f64,
    pub params: &'a ConstraintParams,
}

/// The individual layers of the last computed valley, kept for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct CostValleyLayers {
    pub eibv: CostField,
    pub variance_reduction: CostField,
    pub obstacle: CostField,
    pub budget: CostField,
    pub direction: CostField,
    pub total: CostField,
    pub ellipse: BudgetEllipse,
}

/// Elementwise sum of the five layers. Infinity in any layer stays infinite.
pub fn combine(
    eibv: &CostField,
    variance_reduction: &CostField,
    obstacle: &CostField,
    budget: &CostField,
    direction: &CostField,
) -> CostField {
    eibv + variance_reduction + obstacle + budget + direction
}

/// The fused cost surface. Rebuilt from scratch on every `update`; the only
/// thing carried between cycles is the last result, for callers to inspect.
#[derive(Debug, Clone, Default)]
pub struct CostValley {
    last: Option<CostValleyLayers>,
}

impl CostValley {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes every layer for the current belief and vehicle state.
    ///
    /// The budget is checked first so that a `ReturnToGoalRequired` cycle
    /// skips the expensive information fields entirely.
    pub fn update(
        &mut self,
        belief: &SpatialBeliefField,
        vehicle: &VehicleState,
        ctx: &FieldContext,
    ) -> Result<&CostField, PlanningError> {
        if belief.len() != ctx.grid.len() {
            return Err(PlanningError::FieldSizeMismatch {
                field: belief.len(),
                grid: ctx.grid.len(),
            });
        }
        let ellipse = BudgetEllipse::new(&vehicle.current, &vehicle.goal, vehicle.budget, ctx.params)?;

        let information = InformationFields::compute(belief, ctx.threshold);
        let obstacle = obstacle_field(ctx.grid, ctx.area);
        let budget = budget_field(ctx.grid, &ellipse);
        let direction = direction_field(
            ctx.grid,
            &vehicle.current,
            &vehicle.previous,
            ctx.params.heading_penalty,
        );
        let total = combine(
            &information.eibv,
            &information.variance_reduction,
            &obstacle,
            &budget,
            &direction,
        );
        debug!(
            feasible = total.iter().filter(|v| v.is_finite()).count(),
            "Cost valley updated"
        );

        let layers = self.last.insert(CostValleyLayers {
            eibv: information.eibv,
            variance_reduction: information.variance_reduction,
            obstacle,
            budget,
            direction,
            total,
            ellipse,
        });
        Ok(&layers.total)
    }

    pub fn layers(&self) -> Option<&CostValleyLayers> {
        self.last.as_ref()
    }

    pub fn total(&self) -> Option<&CostField> {
        self.last.as_ref().map(|l| &l.total)
    }
}
