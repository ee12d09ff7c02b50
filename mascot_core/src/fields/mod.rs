// mascot_core/src/fields/mod.rs

//! Per-grid-location cost surfaces and their fusion into the cost valley.

pub mod constraints;
pub mod cost_valley;
pub mod information;

pub use constraints::{BudgetEllipse, ConstraintParams};
pub use cost_valley::{combine, CostValley, CostValleyLayers, FieldContext};
pub use information::InformationFields;
