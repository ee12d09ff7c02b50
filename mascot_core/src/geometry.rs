// mascot_core/src/geometry.rs

//! Planar polygon helpers used for obstacle membership and segment
//! feasibility. Everything here works in the local Cartesian frame.

use crate::types::Location;

/// A simple (non self-intersecting) polygon. The closing edge from the last
/// vertex back to the first is implicit.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<Location>,
}

impl Polygon {
    pub fn new(vertices: Vec<Location>) -> Self {
        Self { vertices }
    }

    /// Builds a polygon from raw `[x, y]` pairs, the shape used by scenario files.
    pub fn from_xy(points: &[[f64; 2]]) -> Self {
        Self::new(points.iter().map(|p| Location::new(p[0], p[1])).collect())
    }

    /// Axis-aligned rectangle spanning `min` to `max`.
    pub fn rectangle(min: Location, max: Location) -> Self {
        Self::new(vec![
            min,
            Location::new(max.x, min.y),
            max,
            Location::new(min.x, max.y),
        ])
    }

    pub fn vertices(&self) -> &[Location] {
        &self.vertices
    }

    /// Even-odd ray casting test. Degenerate polygons (< 3 vertices) contain nothing.
    pub fn contains(&self, point: &Location) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let pi = self.vertices[i];
            let pj = self.vertices[j];
            if (pi.y > point.y) != (pj.y > point.y) {
                let intersect_x = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
                if point.x < intersect_x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Iterates over the edges as `(start, end)` pairs, closing edge included.
    pub fn edges(&self) -> impl Iterator<Item = (Location, Location)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// True if the segment `a -> b` touches or crosses any edge of the polygon.
    pub fn intersects_segment(&self, a: &Location, b: &Location) -> bool {
        self.vertices.len() >= 2
            && self
                .edges()
                .any(|(p, q)| segments_intersect(a, b, &p, &q))
    }

    /// Returns `(min, max)` corners of the axis-aligned bounding box.
    pub fn bounding_box(&self) -> Option<(Location, Location)> {
        let first = self.vertices.first()?;
        let mut min = *first;
        let mut max = *first;
        for v in &self.vertices[1..] {
            min.x = min.x.min(v.x);
            min.y = min.y.min(v.y);
            max.x = max.x.max(v.x);
            max.y = max.y.max(v.y);
        }
        Some((min, max))
    }
}

/// Parametric segment/segment test: `a + t (b - a) == p + u (q - p)` for
/// `t, u` in [0, 1]. Parallel segments are treated as non-intersecting.
fn segments_intersect(a: &Location, b: &Location, p: &Location, q: &Location) -> bool {
    let d = b - a;
    let s = q - p;
    let denom = d.x * s.y - d.y * s.x;
    if denom.abs() < 1e-12 {
        return false;
    }
    let ap = p - a;
    let t = (ap.x * s.y - ap.y * s.x) / denom;
    let u = (ap.x * d.y - ap.y * d.x) / denom;
    (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)
}

/// The region the vehicle may operate in: inside `border`, outside every obstacle.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationalArea {
    pub border: Polygon,
    pub obstacles: Vec<Polygon>,
}

impl OperationalArea {
    pub fn new(border: Polygon, obstacles: Vec<Polygon>) -> Self {
        Self { border, obstacles }
    }

    /// True if `point` lies inside any obstacle polygon.
    pub fn is_within_obstacles(&self, point: &Location) -> bool {
        self.obstacles.iter().any(|o| o.contains(point))
    }

    /// Inside the border and not inside an obstacle.
    pub fn is_free(&self, point: &Location) -> bool {
        self.border.contains(point) && !self.is_within_obstacles(point)
    }

    /// Both endpoints free and no polygon edge crossed on the way.
    pub fn is_segment_free(&self, a: &Location, b: &Location) -> bool {
        if !self.is_free(a) || !self.is_free(b) {
            return false;
        }
        if self.border.intersects_segment(a, b) {
            return false;
        }
        !self.obstacles.iter().any(|o| o.intersects_segment(a, b))
    }

    pub fn bounding_box(&self) -> Option<(Location, Location)> {
        self.border.bounding_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Polygon {
        Polygon::rectangle(Location::new(0.0, 0.0), Location::new(1.0, 1.0))
    }

    #[test]
    fn contains_interior_not_exterior() {
        let square = unit_square();
        assert!(square.contains(&Location::new(0.5, 0.5)));
        assert!(!square.contains(&Location::new(1.5, 0.5)));
        assert!(!square.contains(&Location::new(-0.1, 0.2)));
    }

    #[test]
    fn concave_polygon_notch_is_outside() {
        // L-shape: unit square cut out of the lower-left of a 2x2 square.
        let l_shape = Polygon::from_xy(&[
            [1.0, 0.0],
            [2.0, 0.0],
            [2.0, 2.0],
            [0.0, 2.0],
            [0.0, 1.0],
            [1.0, 1.0],
        ]);
        assert!(!l_shape.contains(&Location::new(0.5, 0.5)));
        assert!(l_shape.contains(&Location::new(1.5, 0.5)));
        assert!(l_shape.contains(&Location::new(0.5, 1.5)));
    }

    #[test]
    fn segment_crossing_obstacle_is_blocked() {
        let area = OperationalArea::new(
            Polygon::rectangle(Location::new(0.0, 0.0), Location::new(10.0, 10.0)),
            vec![Polygon::rectangle(
                Location::new(4.0, 0.0),
                Location::new(6.0, 8.0),
            )],
        );
        let a = Location::new(2.0, 2.0);
        let b = Location::new(8.0, 2.0);
        assert!(!area.is_segment_free(&a, &b));
        // Going over the top of the wall is fine.
        let c = Location::new(2.0, 9.0);
        let d = Location::new(8.0, 9.0);
        assert!(area.is_segment_free(&c, &d));
    }

    #[test]
    fn bounding_box_covers_all_vertices() {
        let poly = Polygon::from_xy(&[[1.0, -2.0], [3.0, 4.0], [-1.0, 0.5]]);
        let (min, max) = poly.bounding_box().unwrap();
        assert_eq!(min, Location::new(-1.0, -2.0));
        assert_eq!(max, Location::new(3.0, 4.0));
    }
}
