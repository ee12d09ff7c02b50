// mascot_core/src/fields/information.rs

//! Information-gain surfaces derived from the current belief. Nothing here
//! writes to the belief: every "what if we sampled at i" update happens on a
//! per-candidate scratch vector.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::belief::{excursion_probability, InnovationSolver, SpatialBeliefField};
use crate::error::BeliefError;
use crate::types::{normalize, CostField};

/// Below this the hypothetical innovation `P_ii + R` is considered singular.
const SINGULAR_INNOVATION: f64 = 1e-12;

/// Both information fields for one planning cycle. Lower cost means more
/// information gained by sampling there.
#[derive(Debug, Clone, PartialEq)]
pub struct InformationFields {
    pub eibv: CostField,
    pub variance_reduction: CostField,
}

impl InformationFields {
    pub fn compute(belief: &SpatialBeliefField, threshold: f64) -> Self {
        Self {
            eibv: eibv_field(belief, threshold),
            variance_reduction: variance_reduction_field(belief),
        }
    }
}

/// Normalized EIBV per candidate location, in [0, 1].
pub fn eibv_field(belief: &SpatialBeliefField, threshold: f64) -> CostField {
    let raw = per_candidate(belief.len(), |i| expected_ibv_at(belief, threshold, i));
    let raw = CostField::from_vec(raw);
    debug!(
        min = raw.min(),
        max = raw.max(),
        "EIBV field computed over {} candidates",
        raw.len()
    );
    normalize(&raw)
}

/// `1 - normalized variance reduction` per candidate location, in [0, 1].
pub fn variance_reduction_field(belief: &SpatialBeliefField) -> CostField {
    let raw = CostField::from_vec(per_candidate(belief.len(), |i| {
        variance_reduction_at(belief, i)
    }));
    debug!(
        min = raw.min(),
        max = raw.max(),
        "Variance reduction field computed over {} candidates",
        raw.len()
    );
    normalize(&raw).map(|v| 1.0 - v)
}

/// Expected integrated Bernoulli variance if grid index `candidate` were
/// sampled next (closed-form single-point update).
pub fn expected_ibv_at(belief: &SpatialBeliefField, threshold: f64, candidate: usize) -> f64 {
    let posterior_variance = single_point_posterior_variance(belief, candidate);
    integrated_bernoulli_variance(belief.mean(), &posterior_variance, threshold)
}

/// Trace of the covariance reduction from sampling `candidate`:
/// `Σ_j P_ji² / (P_ii + R)`. Zero when the innovation is singular.
pub fn variance_reduction_at(belief: &SpatialBeliefField, candidate: usize) -> f64 {
    let p = belief.covariance();
    let s = p[(candidate, candidate)] + belief.noise_variance();
    if s <= SINGULAR_INNOVATION {
        return 0.0;
    }
    p.column(candidate).norm_squared() / s
}

/// Marginal variances after a hypothetical sample at `candidate`, computed on
/// a scratch copy: `v_j - P_ji² / (P_ii + R)`.
pub fn single_point_posterior_variance(
    belief: &SpatialBeliefField,
    candidate: usize,
) -> DVector<f64> {
    let p = belief.covariance();
    let mut scratch = p.diagonal();
    let s = p[(candidate, candidate)] + belief.noise_variance();
    if s <= SINGULAR_INNOVATION {
        return scratch;
    }
    let column = p.column(candidate);
    for (v, c) in scratch.iter_mut().zip(column.iter()) {
        *v = (*v - c * c / s).max(0.0);
    }
    scratch
}

/// Marginal variances after hypothetically sampling every index in
/// `selection` at once, via a k x k solve against the innovation matrix.
/// A singular innovation leaves the variances unchanged.
pub fn hypothetical_posterior_variance(
    belief: &SpatialBeliefField,
    selection: &[usize],
) -> Result<DVector<f64>, BeliefError> {
    let n = belief.len();
    if let Some(&index) = selection.iter().find(|&&i| i >= n) {
        return Err(BeliefError::IndexOutOfRange { index, len: n });
    }
    let p = belief.covariance();
    let mut scratch = p.diagonal();
    if selection.is_empty() {
        return Ok(scratch);
    }
    let k = selection.len();
    let p_ft = DMatrix::from_fn(n, k, |r, c| p[(r, selection[c])]);
    let s = DMatrix::from_fn(k, k, |a, b| {
        p[(selection[a], selection[b])] + if a == b { belief.noise_variance() } else { 0.0 }
    });
    let x = match InnovationSolver::factorize(s).and_then(|solver| solver.solve(&p_ft.transpose())) {
        Ok(x) => x,
        Err(BeliefError::SingularInnovation) => return Ok(scratch),
        Err(e) => return Err(e),
    };
    // diag(P Fᵀ S⁻¹ F P), row by row.
    for j in 0..n {
        let reduction = p_ft.row(j).transpose().dot(&x.column(j));
        scratch[j] = (scratch[j] - reduction).max(0.0);
    }
    Ok(scratch)
}

/// EIBV for a batch design (general solve). Used for reporting the
/// information value of the sample actually taken.
pub fn expected_ibv(
    belief: &SpatialBeliefField,
    threshold: f64,
    selection: &[usize],
) -> Result<f64, BeliefError> {
    let variance = hypothetical_posterior_variance(belief, selection)?;
    Ok(integrated_bernoulli_variance(belief.mean(), &variance, threshold))
}

fn integrated_bernoulli_variance(mean: &DVector<f64>, variance: &DVector<f64>, threshold: f64) -> f64 {
    mean.iter()
        .zip(variance.iter())
        .map(|(&m, &v)| {
            let p = excursion_probability(m, v, threshold);
            p * (1.0 - p)
        })
        .sum()
}

/// Evaluates `f` for every candidate index. Candidates share nothing mutable,
/// so the parallel build simply fans them out.
#[cfg(feature = "parallel")]
fn per_candidate<F>(n: usize, f: F) -> Vec<f64>
where
    F: Fn(usize) -> f64 + Sync + Send,
{
    use rayon::prelude::*;
    (0..n).into_par_iter().map(f).collect()
}

#[cfg(not(feature = "parallel"))]
fn per_candidate<F>(n: usize, f: F) -> Vec<f64>
where
    F: Fn(usize) -> f64,
{
    (0..n).map(f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::{Matern32Kernel, PriorMean};
    use crate::grid::Grid;
    use crate::types::Location;
    use approx::assert_abs_diff_eq;

    fn belief(noise: f64) -> SpatialBeliefField {
        let grid = Grid::regular(Location::new(0.5, 0.5), 1.0, 8, 8);
        let kernel = Box::new(Matern32Kernel::from_lateral_range(1.0, 2.5));
        let mut mean = DVector::from_element(grid.len(), 20.0);
        // A fresh water plume in one corner so the excursion set is non-trivial.
        for (i, p) in grid.locations().iter().enumerate() {
            mean[i] -= 8.0 * (-(p.coords.norm_squared()) / 10.0).exp();
        }
        SpatialBeliefField::initialize(&grid, PriorMean::Field(mean), kernel, noise).unwrap()
    }

    #[test]
    fn closed_form_matches_general_solve() {
        let belief = belief(0.1);
        for candidate in [0, 9, 27, 63] {
            let closed = single_point_posterior_variance(&belief, candidate);
            let general = hypothetical_posterior_variance(&belief, &[candidate]).unwrap();
            assert_abs_diff_eq!((closed - general).amax(), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn fields_are_normalized() {
        let belief = belief(0.1);
        let fields = InformationFields::compute(&belief, 17.0);
        for v in fields.eibv.iter().chain(fields.variance_reduction.iter()) {
            assert!((0.0..=1.0).contains(v));
        }
        assert_abs_diff_eq!(fields.eibv.min(), 0.0);
        assert_abs_diff_eq!(fields.eibv.max(), 1.0);
        assert_abs_diff_eq!(fields.variance_reduction.min(), 0.0);
        assert_abs_diff_eq!(fields.variance_reduction.max(), 1.0);
    }

    #[test]
    fn computing_fields_leaves_belief_untouched() {
        let belief = belief(0.1);
        let snapshot = belief.clone();
        let _ = InformationFields::compute(&belief, 17.0);
        let _ = hypothetical_posterior_variance(&belief, &[1, 2, 3]).unwrap();
        assert_eq!(belief.state(), snapshot.state());
    }

    #[test]
    fn sampled_location_has_low_variance_reduction_value() {
        let mut belief = belief(0.01);
        belief.assimilate(&[36], &[19.0]).unwrap();
        let vr = variance_reduction_field(&belief);
        // Sampling the same spot again gains the least: highest cost.
        let worst = vr.iter().cloned().fold(f64::MIN, f64::max);
        assert!(vr[36] > 0.9 * worst);
    }

    #[test]
    fn singular_candidate_contributes_zero_reduction() {
        let mut belief = belief(0.0);
        belief.assimilate(&[5], &[20.0]).unwrap();
        assert_eq!(variance_reduction_at(&belief, 5), 0.0);
        let unchanged = single_point_posterior_variance(&belief, 5);
        assert_abs_diff_eq!((unchanged - belief.variance()).amax(), 0.0);
    }

    #[test]
    fn batch_eibv_is_not_above_prior_ibv() {
        let belief = belief(0.1);
        let prior_ibv = belief.integrated_bernoulli_variance(17.0);
        let eibv = expected_ibv(&belief, 17.0, &[0, 10, 20]).unwrap();
        assert!(eibv <= prior_ibv + 1e-12);
    }
}
