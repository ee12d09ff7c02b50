// mascot_core/src/interfaces.rs

//! The seams between the planning core and whatever drives it: a source of
//! field measurements and a map projection.

use std::fmt::Debug;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::types::Location;

/// A point on the globe, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

// --- MEASUREMENT SOURCE TRAIT ---
/// Anything that can report a scalar field value where the vehicle is.
/// A simulator draws from a synthetic truth; a deployment would read the
/// onboard sensor.
pub trait GroundTruthProvider: Debug {
    /// A (possibly noisy) measurement at `location` at mission time `time`.
    fn sample(&mut self, location: &Location, time: f64) -> f64;

    /// Noise-free values at every grid index, when the provider knows them.
    /// Used only for scoring the belief.
    fn field_snapshot(&self) -> Option<DVector<f64>> {
        None
    }
}

// --- PROJECTION TRAIT ---
/// Converts between geographic coordinates and the planar frame the grid,
/// polygons and planner work in.
pub trait GeometryConverter: Debug + Send + Sync {
    fn to_planar(&self, geographic: &GeoCoordinate) -> Location;

    fn to_geographic(&self, planar: &Location) -> GeoCoordinate;

    /// Projects a whole polygon ring.
    fn ring_to_planar(&self, ring: &[GeoCoordinate]) -> Vec<Location> {
        ring.iter().map(|g| self.to_planar(g)).collect()
    }
}
