// mascot_sim/src/geo.rs

//! Flat-earth projection between WGS84 degrees and local metres.

use mascot_core::interfaces::{GeoCoordinate, GeometryConverter};
use mascot_core::types::Location;

/// Equatorial circumference used for the degree-to-metre scale.
const EARTH_CIRCUMFERENCE: f64 = 40_075_000.0;

/// Local tangent-plane approximation around `origin`: `x` points north and
/// `y` points east, both in metres. Good to a few metres over the few
/// kilometres a mission covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatEarthConverter {
    origin: GeoCoordinate,
}

impl FlatEarthConverter {
    pub fn new(origin: GeoCoordinate) -> Self {
        Self { origin }
    }

    pub fn origin(&self) -> GeoCoordinate {
        self.origin
    }

    fn metres_per_degree_lon(&self) -> f64 {
        EARTH_CIRCUMFERENCE / 360.0 * self.origin.latitude.to_radians().cos()
    }
}

impl GeometryConverter for FlatEarthConverter {
    fn to_planar(&self, geographic: &GeoCoordinate) -> Location {
        let x = (geographic.latitude - self.origin.latitude) * EARTH_CIRCUMFERENCE / 360.0;
        let y = (geographic.longitude - self.origin.longitude) * self.metres_per_degree_lon();
        Location::new(x, y)
    }

    fn to_geographic(&self, planar: &Location) -> GeoCoordinate {
        GeoCoordinate::new(
            self.origin.latitude + planar.x * 360.0 / EARTH_CIRCUMFERENCE,
            self.origin.longitude + planar.y / self.metres_per_degree_lon(),
        )
    }
}
