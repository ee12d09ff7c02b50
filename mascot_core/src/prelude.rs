// mascot_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::belief::CovarianceKernel;
pub use crate::interfaces::{GeoCoordinate, GeometryConverter, GroundTruthProvider};

// --- Core Data Structures ---
pub use crate::belief::{BeliefState, PriorMean, SpatialBeliefField};
pub use crate::geometry::{OperationalArea, Polygon};
pub use crate::grid::Grid;
pub use crate::types::{CostField, Displacement, Location};
pub use crate::vehicle::VehicleState;

// --- Fields and Planning ---
pub use crate::fields::{ConstraintParams, CostValley, CostValleyLayers, InformationFields};
pub use crate::pipeline::{update_belief, CyclePlanner, WaypointPlan};
pub use crate::planning::{PlannedPath, PlannerPhase, PlanningTree, RrtStar, RrtStarConfig};

// --- Errors ---
pub use crate::error::BeliefError;
pub use crate::planning::PlanningError;

// --- Concrete Kernels ---
pub use crate::belief::{ExponentialKernel, Matern32Kernel};
