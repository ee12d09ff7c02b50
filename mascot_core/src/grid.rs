// mascot_core/src/grid.rs

use nalgebra::DMatrix;

use crate::geometry::OperationalArea;
use crate::types::Location;

/// The fixed, ordered set of locations the belief is discretized over.
/// An index into `locations` is the identity of a grid point everywhere else
/// in the crate (belief entries, cost fields, selections).
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    locations: Vec<Location>,
}

impl Grid {
    pub fn new(locations: Vec<Location>) -> Self {
        Self { locations }
    }

    /// A regular `nx` x `ny` lattice whose first point sits at `origin`.
    /// Index order is row-major in y: index = iy * nx + ix.
    pub fn regular(origin: Location, spacing: f64, nx: usize, ny: usize) -> Self {
        let mut locations = Vec::with_capacity(nx * ny);
        for iy in 0..ny {
            for ix in 0..nx {
                locations.push(Location::new(
                    origin.x + ix as f64 * spacing,
                    origin.y + iy as f64 * spacing,
                ));
            }
        }
        Self { locations }
    }

    /// Regular lattice over the area's bounding box (offset by half a cell),
    /// keeping only the points that are inside the border and outside every
    /// obstacle.
    pub fn within_area(area: &OperationalArea, spacing: f64) -> Self {
        let Some((min, max)) = area.bounding_box() else {
            return Self::new(Vec::new());
        };
        if spacing <= 0.0 || !spacing.is_finite() {
            return Self::new(Vec::new());
        }
        let nx = ((max.x - min.x) / spacing).floor() as usize;
        let ny = ((max.y - min.y) / spacing).floor() as usize;
        let origin = Location::new(min.x + spacing / 2.0, min.y + spacing / 2.0);
        let locations = Self::regular(origin, spacing, nx, ny)
            .locations
            .into_iter()
            .filter(|p| area.is_free(p))
            .collect();
        Self { locations }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn location(&self, index: usize) -> Option<&Location> {
        self.locations.get(index)
    }

    pub fn distance(&self, i: usize, j: usize) -> f64 {
        nalgebra::distance(&self.locations[i], &self.locations[j])
    }

    /// Pairwise Euclidean distances, N x N.
    pub fn distance_matrix(&self) -> DMatrix<f64> {
        let n = self.len();
        DMatrix::from_fn(n, n, |i, j| self.distance(i, j))
    }

    /// Index of the grid point closest to `location`. Ties go to the lower index.
    pub fn nearest_index(&self, location: &Location) -> Option<usize> {
        self.locations
            .iter()
            .enumerate()
            .map(|(i, p)| (i, nalgebra::distance_squared(p, location)))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, best_d)) if best_d <= d => best,
                _ => Some((i, d)),
            })
            .map(|(i, _)| i)
    }

    /// Axis-aligned extent of the grid points, `None` for an empty grid.
    pub fn bounding_box(&self) -> Option<(Location, Location)> {
        let first = self.locations.first()?;
        Some(self.locations.iter().fold((*first, *first), |(lo, hi), p| {
            (
                Location::new(lo.x.min(p.x), lo.y.min(p.y)),
                Location::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }

    /// All other indices within `radius` of `index`.
    pub fn neighbours_within(&self, index: usize, radius: f64) -> Vec<usize> {
        (0..self.len())
            .filter(|&j| j != index && self.distance(index, j) <= radius)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;

    #[test]
    fn regular_grid_is_row_major() {
        let grid = Grid::regular(Location::new(0.5, 0.5), 1.0, 10, 10);
        assert_eq!(grid.len(), 100);
        assert_eq!(grid.location(0), Some(&Location::new(0.5, 0.5)));
        assert_eq!(grid.location(1), Some(&Location::new(1.5, 0.5)));
        assert_eq!(grid.location(10), Some(&Location::new(0.5, 1.5)));
        assert_eq!(grid.location(99), Some(&Location::new(9.5, 9.5)));
    }

    #[test]
    fn nearest_index_picks_closest_point() {
        let grid = Grid::regular(Location::new(0.5, 0.5), 1.0, 10, 10);
        assert_eq!(grid.nearest_index(&Location::new(0.4, 0.6)), Some(0));
        assert_eq!(grid.nearest_index(&Location::new(9.9, 9.9)), Some(99));
        assert_eq!(grid.nearest_index(&Location::new(3.6, 1.4)), Some(13));
        assert_eq!(Grid::new(Vec::new()).nearest_index(&Location::origin()), None);
    }

    #[test]
    fn bounding_box_spans_grid_points() {
        let grid = Grid::regular(Location::new(0.5, 0.5), 1.0, 4, 3);
        assert_eq!(
            grid.bounding_box(),
            Some((Location::new(0.5, 0.5), Location::new(3.5, 2.5)))
        );
        assert_eq!(Grid::new(Vec::new()).bounding_box(), None);
    }

    #[test]
    fn within_area_drops_obstacle_points() {
        let area = OperationalArea::new(
            Polygon::rectangle(Location::new(0.0, 0.0), Location::new(4.0, 4.0)),
            vec![Polygon::rectangle(
                Location::new(0.0, 0.0),
                Location::new(2.0, 2.0),
            )],
        );
        let grid = Grid::within_area(&area, 1.0);
        assert_eq!(grid.len(), 12);
        assert!(grid.locations().iter().all(|p| area.is_free(p)));
    }

    #[test]
    fn neighbours_within_excludes_self() {
        let grid = Grid::regular(Location::new(0.0, 0.0), 1.0, 3, 3);
        let mut neighbours = grid.neighbours_within(4, 1.0);
        neighbours.sort_unstable();
        assert_eq!(neighbours, vec![1, 3, 5, 7]);
    }
}
