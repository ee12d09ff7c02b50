// mascot_sim/src/prelude.rs

// Re-export the entire mascot_core prelude so you can easily access
// pure types like `Grid`, `SpatialBeliefField`, `CyclePlanner`, etc.
pub use mascot_core::prelude::*;

// Re-export common simulation-specific types for easy access.
pub use crate::cli::Cli;
pub use crate::config::{KernelKind, MissionConfig};
pub use crate::error::{ConfigError, SimError};
pub use crate::geo::FlatEarthConverter;
pub use crate::ground_truth::GaussianFieldTruth;
pub use crate::logging::init_logging;
pub use crate::prng::SimulationRng;
pub use crate::runner::{MissionMetrics, MissionRunner, MissionStatus, WaypointSource};
