// mascot_core/src/types.rs

use nalgebra::{DVector, Point2, Vector2};

// --- Core Type Aliases ---
/// A planar location in the mission's local Cartesian frame (metres).
pub type Location = Point2<f64>;
/// A planar displacement between two `Location`s.
pub type Displacement = Vector2<f64>;
/// One scalar per grid index. `f64::INFINITY` marks a forbidden location.
pub type CostField = DVector<f64>;

/// Rescales a field to [0, 1] using its own min/max.
///
/// A constant (or empty) field maps to all zeros instead of NaN.
pub fn normalize(field: &CostField) -> CostField {
    if field.is_empty() {
        return CostField::zeros(0);
    }
    let min = field.min();
    let span = field.max() - min;
    if !span.is_finite() || span <= f64::EPSILON {
        return CostField::zeros(field.len());
    }
    field.map(|v| (v - min) / span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalize_maps_extremes_to_unit_interval() {
        let field = CostField::from_vec(vec![2.0, 4.0, 3.0]);
        let normalized = normalize(&field);
        assert_relative_eq!(normalized[0], 0.0);
        assert_relative_eq!(normalized[1], 1.0);
        assert_relative_eq!(normalized[2], 0.5);
    }

    #[test]
    fn normalize_constant_field_is_zero() {
        let field = CostField::from_element(4, 7.5);
        assert_eq!(normalize(&field), CostField::zeros(4));
    }
}
