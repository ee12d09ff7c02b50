// mascot_sim/src/config.rs

//! Scenario loading: a TOML file, overridable from `MASCOT_`-prefixed
//! environment variables, validated and turned into core types.

use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use mascot_core::belief::{CovarianceKernel, ExponentialKernel, Matern32Kernel};
use mascot_core::fields::ConstraintParams;
use mascot_core::geometry::{OperationalArea, Polygon};
use mascot_core::grid::Grid;
use mascot_core::interfaces::{GeoCoordinate, GeometryConverter};
use mascot_core::planning::RrtStarConfig;
use mascot_core::types::Location;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::geo::FlatEarthConverter;

/// The whole scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MissionConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    pub grid: GridConfig,
    pub field: FieldConfig,
    pub area: AreaConfig,
    pub mission: MissionParams,
    #[serde(default)]
    pub planner: RrtStarConfig,
    #[serde(default)]
    pub constraints: ConstraintParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// `None` seeds from the OS.
    pub seed: Option<u64>,
    pub max_steps: usize,
    /// Seconds of mission time per cycle.
    pub time_step: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_steps: 100,
            time_step: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    /// Lattice spacing in metres; only points inside the operational area are kept.
    pub spacing: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    #[default]
    Matern32,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    #[serde(default)]
    pub kernel: KernelKind,
    pub sigma: f64,
    pub lateral_range: f64,
    /// Measurement noise variance.
    pub nugget: f64,
    /// Excursion threshold.
    pub threshold: f64,
    pub prior_mean: f64,
    /// Temporal correlation of the simulated truth between cycles; `None`
    /// keeps the truth frozen.
    #[serde(default)]
    pub ar1_correlation: Option<f64>,
}

/// Polygon rings as `[x, y]` pairs in metres, or `[lat, lon]` pairs when
/// `wgs_origin` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AreaConfig {
    #[serde(default)]
    pub wgs_origin: Option<GeoCoordinate>,
    pub border: Vec<[f64; 2]>,
    #[serde(default)]
    pub obstacles: Vec<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MissionParams {
    /// Same coordinate convention as the area polygons.
    pub start: [f64; 2],
    pub goal: [f64; 2],
    /// Total travel distance allowed, metres.
    pub budget: f64,
    #[serde(default = "default_arrival_radius")]
    pub arrival_radius: f64,
}

fn default_arrival_radius() -> f64 {
    0.5
}

impl MissionConfig {
    /// Loads `path`, applies environment overrides (`MASCOT_PLANNER__STEP_SIZE=2`
    /// sets `planner.step_size`), and validates the result.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingScenario(path.to_path_buf()));
        }
        info!("Loading scenario from: {}", path.display());
        let config: Self = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("MASCOT_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses an in-memory scenario (no environment overrides).
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Toml::string(source)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.simulation.max_steps == 0 {
            return invalid("simulation.max_steps must be at least 1".into());
        }
        if !positive(self.simulation.time_step) {
            return invalid(format!("simulation.time_step must be positive, got {}", self.simulation.time_step));
        }
        if !positive(self.grid.spacing) {
            return invalid(format!("grid.spacing must be positive, got {}", self.grid.spacing));
        }
        let field = &self.field;
        if !positive(field.sigma) || !positive(field.lateral_range) {
            return invalid("field.sigma and field.lateral_range must be positive".into());
        }
        if !field.nugget.is_finite() || field.nugget < 0.0 {
            return invalid(format!("field.nugget must be non-negative, got {}", field.nugget));
        }
        if !field.threshold.is_finite() || !field.prior_mean.is_finite() {
            return invalid("field.threshold and field.prior_mean must be finite".into());
        }
        if let Some(rho) = field.ar1_correlation {
            if !(0.0..=1.0).contains(&rho) {
                return invalid(format!("field.ar1_correlation must lie in [0, 1], got {rho}"));
            }
        }
        if self.area.border.len() < 3 {
            return invalid("area.border needs at least three vertices".into());
        }
        if let Some(i) = self.area.obstacles.iter().position(|o| o.len() < 3) {
            return invalid(format!("area.obstacles[{i}] needs at least three vertices"));
        }
        if !positive(self.mission.budget) || !positive(self.mission.arrival_radius) {
            return invalid("mission.budget and mission.arrival_radius must be positive".into());
        }
        self.planner
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let area = self.operational_area();
        if !area.is_free(&self.start()) {
            return invalid(format!("mission.start {} is not in the free area", self.start()));
        }
        if !area.is_free(&self.goal()) {
            return invalid(format!("mission.goal {} is not in the free area", self.goal()));
        }
        Ok(())
    }

    // --- Conversion into core types ---

    pub fn converter(&self) -> Option<FlatEarthConverter> {
        self.area.wgs_origin.map(FlatEarthConverter::new)
    }

    fn to_location(&self, pair: &[f64; 2]) -> Location {
        match self.converter() {
            Some(converter) => converter.to_planar(&GeoCoordinate::new(pair[0], pair[1])),
            None => Location::new(pair[0], pair[1]),
        }
    }

    fn to_polygon(&self, ring: &[[f64; 2]]) -> Polygon {
        match self.converter() {
            Some(converter) => {
                let ring: Vec<GeoCoordinate> =
                    ring.iter().map(|p| GeoCoordinate::new(p[0], p[1])).collect();
                Polygon::new(converter.ring_to_planar(&ring))
            }
            None => Polygon::from_xy(ring),
        }
    }

    pub fn operational_area(&self) -> OperationalArea {
        OperationalArea::new(
            self.to_polygon(&self.area.border),
            self.area.obstacles.iter().map(|o| self.to_polygon(o)).collect(),
        )
    }

    pub fn start(&self) -> Location {
        self.to_location(&self.mission.start)
    }

    pub fn goal(&self) -> Location {
        self.to_location(&self.mission.goal)
    }

    pub fn grid(&self, area: &OperationalArea) -> Result<Grid, ConfigError> {
        let grid = Grid::within_area(area, self.grid.spacing);
        if grid.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "no grid points with spacing {} fit inside the operational area",
                self.grid.spacing
            )));
        }
        Ok(grid)
    }

    pub fn kernel(&self) -> Box<dyn CovarianceKernel> {
        let FieldConfig { sigma, lateral_range, .. } = self.field;
        match self.field.kernel {
            KernelKind::Matern32 => Box::new(Matern32Kernel::from_lateral_range(sigma, lateral_range)),
            KernelKind::Exponential => {
                Box::new(ExponentialKernel::from_lateral_range(sigma, lateral_range))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"
        [simulation]
        seed = 3
        max_steps = 10

        [grid]
        spacing = 1.0

        [field]
        sigma = 1.0
        lateral_range = 2.0
        nugget = 0.1
        threshold = 27.0
        prior_mean = 20.0

        [area]
        border = [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]

        [mission]
        start = [1.0, 1.0]
        goal = [9.0, 9.0]
        budget = 40.0
    "#;

    #[test]
    fn parses_with_defaults() {
        let config = MissionConfig::from_toml_str(SQUARE).unwrap();
        assert_eq!(config.simulation.seed, Some(3));
        assert_eq!(config.simulation.time_step, 1.0);
        assert_eq!(config.planner, RrtStarConfig::default());
        assert_eq!(config.field.kernel, KernelKind::Matern32);
        let area = config.operational_area();
        assert_eq!(config.grid(&area).unwrap().len(), 100);
    }

    #[test]
    fn rejects_unknown_keys() {
        let source = SQUARE.replace("spacing = 1.0", "spacing = 1.0\nspcing = 2.0");
        assert!(matches!(
            MissionConfig::from_toml_str(&source),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn rejects_start_outside_area() {
        let source = SQUARE.replace("start = [1.0, 1.0]", "start = [11.0, 1.0]");
        assert!(matches!(
            MissionConfig::from_toml_str(&source),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn toml_round_trip_preserves_config() {
        let config = MissionConfig::from_toml_str(SQUARE).unwrap();
        let again = MissionConfig::from_toml_str(&config.to_toml().unwrap()).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn geographic_polygons_are_projected() {
        let source = r#"
            [grid]
            spacing = 100.0

            [field]
            sigma = 1.0
            lateral_range = 500.0
            nugget = 0.1
            threshold = 27.0
            prior_mean = 20.0

            [area]
            wgs_origin = { latitude = 63.44, longitude = 10.38 }
            border = [[63.44, 10.38], [63.45, 10.38], [63.45, 10.40], [63.44, 10.40]]

            [mission]
            start = [63.441, 10.385]
            goal = [63.449, 10.395]
            budget = 5000.0
        "#;
        let config = MissionConfig::from_toml_str(source).unwrap();
        let start = config.start();
        assert!(start.x > 100.0 && start.y > 100.0);
        let area = config.operational_area();
        let (_, max) = area.bounding_box().unwrap();
        // 0.01 degrees of latitude is a little over a kilometre.
        assert!((max.x - 1113.2).abs() < 1.0);
        assert!(!config.grid(&area).unwrap().is_empty());
    }
}
