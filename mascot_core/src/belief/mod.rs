// mascot_core/src/belief/mod.rs

//! The Gaussian belief over the unknown field at every grid location, and the
//! exact conditioning step that folds new measurements into it.

use std::collections::BTreeMap;

use nalgebra::{Cholesky, DMatrix, DVector, Dyn, LU};
use statrs::function::erf::erfc;
use tracing::{debug, warn};

use crate::error::BeliefError;
use crate::grid::Grid;
use crate::types::Location;

pub mod kernel;

pub use kernel::{CovarianceKernel, ExponentialKernel, Matern32Kernel};

/// Relative jitter added to the diagonal when checking that a covariance is PSD.
const PSD_JITTER: f64 = 1e-9;
/// Negative variances smaller than this (relative to the prior variance) are
/// treated as round-off and clamped to zero.
const NEGATIVE_VARIANCE_TOLERANCE: f64 = 1e-8;
/// Asymmetry above this (relative to the largest variance) triggers a re-symmetrization.
const ASYMMETRY_TOLERANCE: f64 = 1e-10;

/// Prior mean of the field, either flat or supplied per grid index.
#[derive(Debug, Clone, PartialEq)]
pub enum PriorMean {
    Constant(f64),
    Field(DVector<f64>),
}

/// The posterior mean and covariance over the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct BeliefState {
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
}

impl BeliefState {
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Marginal variances, the covariance diagonal.
    pub fn variance(&self) -> DVector<f64> {
        self.covariance.diagonal()
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// Maintains the belief state and conditions it on measurements.
///
/// Cloning is the supported way to snapshot the belief before a speculative
/// update: `assimilate` mutates in place and there is no rollback.
#[derive(Debug, Clone)]
pub struct SpatialBeliefField {
    state: BeliefState,
    kernel: Box<dyn CovarianceKernel>,
    /// Measurement noise variance `R` (the nugget), shared by every sample.
    noise_variance: f64,
}

impl SpatialBeliefField {
    /// Builds the prior: mean from `prior`, covariance `k(|x_i - x_j|)`.
    pub fn initialize(
        grid: &Grid,
        prior: PriorMean,
        kernel: Box<dyn CovarianceKernel>,
        noise_variance: f64,
    ) -> Result<Self, BeliefError> {
        if grid.is_empty() {
            return Err(BeliefError::InvalidKernelParameters(
                "the grid has no locations".to_string(),
            ));
        }
        kernel.validate()?;
        if !noise_variance.is_finite() || noise_variance < 0.0 {
            return Err(BeliefError::InvalidKernelParameters(format!(
                "noise variance must be finite and non-negative, got {noise_variance}"
            )));
        }

        let n = grid.len();
        let mean = match prior {
            PriorMean::Constant(value) => DVector::from_element(n, value),
            PriorMean::Field(values) if values.len() == n => values,
            PriorMean::Field(values) => {
                return Err(BeliefError::InvalidKernelParameters(format!(
                    "prior mean has {} entries but the grid has {n}",
                    values.len()
                )))
            }
        };

        let covariance = grid.distance_matrix().map(|d| kernel.covariance(d));
        check_covariance(&covariance)?;

        debug!(
            locations = n,
            variance = kernel.variance(),
            noise_variance,
            "Spatial belief initialized"
        );

        Ok(Self {
            state: BeliefState { mean, covariance },
            kernel,
            noise_variance,
        })
    }

    // --- Read-only accessors ---

    pub fn state(&self) -> &BeliefState {
        &self.state
    }

    pub fn mean(&self) -> &DVector<f64> {
        self.state.mean()
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        self.state.covariance()
    }

    pub fn variance(&self) -> DVector<f64> {
        self.state.variance()
    }

    pub fn std_dev(&self) -> DVector<f64> {
        self.state.variance().map(|v| v.max(0.0).sqrt())
    }

    pub fn kernel(&self) -> &dyn CovarianceKernel {
        &*self.kernel
    }

    pub fn noise_variance(&self) -> f64 {
        self.noise_variance
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Conditions the belief on `values` observed at grid indices `selection`.
    ///
    /// With `F` the selection matrix, `S = F P Fᵀ + R` and `K = P Fᵀ S⁻¹`:
    /// `m ← m + K (y - F m)` and `P ← P - K F P`. `S⁻¹` is never formed; both
    /// products come from one factorization of `S`.
    ///
    /// A singular `S` carries no new information, so the update is skipped.
    pub fn assimilate(&mut self, selection: &[usize], values: &[f64]) -> Result<(), BeliefError> {
        if selection.len() != values.len() {
            return Err(BeliefError::DimensionMismatch {
                selection: selection.len(),
                values: values.len(),
            });
        }
        let n = self.len();
        if let Some(&index) = selection.iter().find(|&&i| i >= n) {
            return Err(BeliefError::IndexOutOfRange { index, len: n });
        }
        if selection.is_empty() {
            return Ok(());
        }

        let p = &self.state.covariance;
        let k = selection.len();

        // P Fᵀ: the columns of P at the sampled indices (N x k).
        let p_ft = DMatrix::from_fn(n, k, |r, c| p[(r, selection[c])]);
        // S = F P Fᵀ + R (k x k).
        let s = DMatrix::from_fn(k, k, |a, b| {
            let prior = p[(selection[a], selection[b])];
            if a == b {
                prior + self.noise_variance
            } else {
                prior
            }
        });
        let innovation = DVector::from_fn(k, |a, _| values[a] - self.state.mean[selection[a]]);

        let solved = InnovationSolver::factorize(s).and_then(|solver| {
            Ok((solver.solve(&innovation)?, solver.solve(&p_ft.transpose())?))
        });
        let (weights, reduction_factor) = match solved {
            Ok(solved) => solved,
            Err(BeliefError::SingularInnovation) => {
                warn!(
                    ?selection,
                    "Innovation matrix is singular, measurement carries no information; skipping"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let new_mean = &self.state.mean + &p_ft * weights;
        let mut new_covariance = p - &p_ft * reduction_factor;
        guard_posterior(&mut new_covariance, p)?;

        self.state.mean = new_mean;
        self.state.covariance = new_covariance;
        debug!(samples = k, "Belief conditioned on new measurements");
        Ok(())
    }

    /// Maps each `(location, value)` pair to its nearest grid index, averages
    /// repeated hits on the same index, and assimilates them as one batch.
    /// Returns the indices that were updated.
    pub fn assimilate_at_locations(
        &mut self,
        grid: &Grid,
        measurements: &[(Location, f64)],
    ) -> Result<Vec<usize>, BeliefError> {
        let mut binned: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
        for (location, value) in measurements {
            if let Some(index) = grid.nearest_index(location) {
                let entry = binned.entry(index).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }
        let selection: Vec<usize> = binned.keys().copied().collect();
        let values: Vec<f64> = binned
            .values()
            .map(|(sum, count)| sum / *count as f64)
            .collect();
        self.assimilate(&selection, &values)?;
        Ok(selection)
    }

    /// Per-index probability that the true value lies below `threshold`.
    pub fn excursion_probability(&self, threshold: f64) -> DVector<f64> {
        let variance = self.variance();
        DVector::from_fn(self.len(), |i, _| {
            excursion_probability(self.state.mean[i], variance[i], threshold)
        })
    }

    /// Sum of all marginal variances (trace of the covariance).
    pub fn total_variance(&self) -> f64 {
        self.state.covariance.trace()
    }

    /// Integrated Bernoulli variance of the excursion set: `Σ p (1 - p)`.
    pub fn integrated_bernoulli_variance(&self, threshold: f64) -> f64 {
        self.excursion_probability(threshold)
            .iter()
            .map(|p| p * (1.0 - p))
            .sum()
    }

    /// Root-mean-squared error of the posterior mean against a known field.
    pub fn rmse_against(&self, truth: &DVector<f64>) -> f64 {
        if truth.len() != self.len() || self.is_empty() {
            return f64::NAN;
        }
        let diff = &self.state.mean - truth;
        (diff.norm_squared() / self.len() as f64).sqrt()
    }
}

/// `P(X < threshold)` for `X ~ N(mean, variance)`. A (numerically) zero
/// variance collapses the distribution onto the mean.
pub fn excursion_probability(mean: f64, variance: f64, threshold: f64) -> f64 {
    if variance <= f64::EPSILON {
        return if mean < threshold { 1.0 } else { 0.0 };
    }
    standard_normal_cdf((threshold - mean) / variance.sqrt())
}

fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// One factorization of the innovation matrix `S`, reused for every
/// right-hand side. Cholesky first, LU if `S` is not numerically SPD.
pub(crate) enum InnovationSolver {
    Cholesky(Cholesky<f64, Dyn>),
    Lu(LU<f64, Dyn, Dyn>),
}

impl InnovationSolver {
    pub(crate) fn factorize(s: DMatrix<f64>) -> Result<Self, BeliefError> {
        if let Some(chol) = Cholesky::new(s.clone()) {
            return Ok(Self::Cholesky(chol));
        }
        let lu = s.lu();
        if lu.is_invertible() {
            Ok(Self::Lu(lu))
        } else {
            Err(BeliefError::SingularInnovation)
        }
    }

    /// Solves `S x = rhs`. A non-finite solution means `S` was numerically
    /// singular after all.
    pub(crate) fn solve<C: nalgebra::Dim, S>(
        &self,
        rhs: &nalgebra::Matrix<f64, Dyn, C, S>,
    ) -> Result<nalgebra::OMatrix<f64, Dyn, C>, BeliefError>
    where
        S: nalgebra::storage::Storage<f64, Dyn, C>,
        nalgebra::DefaultAllocator: nalgebra::allocator::Allocator<Dyn, C>,
    {
        let solution = match self {
            Self::Cholesky(chol) => chol.solve(rhs),
            Self::Lu(lu) => lu.solve(rhs).ok_or(BeliefError::SingularInnovation)?,
        };
        if solution.iter().all(|v| v.is_finite()) {
            Ok(solution)
        } else {
            Err(BeliefError::SingularInnovation)
        }
    }
}

/// Confirms a freshly built prior covariance is symmetric PSD within tolerance.
fn check_covariance(covariance: &DMatrix<f64>) -> Result<(), BeliefError> {
    let n = covariance.nrows();
    let scale = covariance.diagonal().max().max(f64::MIN_POSITIVE);
    for i in 0..n {
        if covariance[(i, i)] < 0.0 || !covariance[(i, i)].is_finite() {
            return Err(BeliefError::InvalidKernelParameters(format!(
                "variance at index {i} is {}",
                covariance[(i, i)]
            )));
        }
        for j in (i + 1)..n {
            if (covariance[(i, j)] - covariance[(j, i)]).abs() > ASYMMETRY_TOLERANCE * scale {
                return Err(BeliefError::InvalidKernelParameters(format!(
                    "covariance is not symmetric at ({i}, {j})"
                )));
            }
        }
    }
    let jittered = covariance + DMatrix::identity(n, n) * (PSD_JITTER * scale);
    if Cholesky::new(jittered).is_none() {
        return Err(BeliefError::InvalidKernelParameters(
            "covariance is not positive semi-definite".to_string(),
        ));
    }
    Ok(())
}

/// Keeps a conditioned covariance physically meaningful: variances stay in
/// `[0, prior]`, and round-off asymmetry is folded back. Clearly negative
/// variances are reported instead of clamped.
fn guard_posterior(posterior: &mut DMatrix<f64>, prior: &DMatrix<f64>) -> Result<(), BeliefError> {
    let n = posterior.nrows();
    for i in 0..n {
        let before = prior[(i, i)];
        let after = posterior[(i, i)];
        if !after.is_finite() || after < -NEGATIVE_VARIANCE_TOLERANCE * before.max(1.0) {
            return Err(BeliefError::NumericalInstability {
                index: i,
                variance: after,
            });
        }
        posterior[(i, i)] = after.clamp(0.0, before);
    }

    let scale = prior.diagonal().max().max(f64::MIN_POSITIVE);
    let asymmetry = (&*posterior - posterior.transpose()).amax();
    if asymmetry > ASYMMETRY_TOLERANCE * scale {
        debug!(asymmetry, "Re-symmetrizing posterior covariance");
        *posterior = (&*posterior + posterior.transpose()) * 0.5;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn square_belief(noise: f64) -> (Grid, SpatialBeliefField) {
        let grid = Grid::regular(Location::new(0.5, 0.5), 1.0, 10, 10);
        let kernel = Box::new(Matern32Kernel::from_lateral_range(1.0, 2.0));
        let belief =
            SpatialBeliefField::initialize(&grid, PriorMean::Constant(20.0), kernel, noise).unwrap();
        (grid, belief)
    }

    #[test]
    fn prior_covariance_is_symmetric_with_nonnegative_diagonal() {
        let (_, belief) = square_belief(0.1);
        let p = belief.covariance();
        assert_abs_diff_eq!((p - p.transpose()).amax(), 0.0);
        assert!(belief.variance().iter().all(|&v| v >= 0.0));
        assert_relative_eq!(belief.total_variance(), 100.0);
    }

    #[test]
    fn batch_assimilation_never_increases_variance() {
        let (_, mut belief) = square_belief(0.1);
        let before = belief.variance();
        belief
            .assimilate(&[3, 44, 45, 90], &[18.0, 25.0, 26.0, 10.0])
            .unwrap();
        let after = belief.variance();
        for i in 0..before.len() {
            assert!(after[i] <= before[i], "variance grew at {i}");
        }
        assert!(after[44] < before[44]);
    }

    #[test]
    fn mean_moves_toward_observation() {
        let (_, mut belief) = square_belief(0.1);
        belief.assimilate(&[55], &[10.0]).unwrap();
        assert!(belief.mean()[55] < 11.0);
        assert!(belief.mean()[55] > 10.0);
        // Correlated neighbour is pulled down as well, but less.
        assert!(belief.mean()[56] < 20.0);
        assert!(belief.mean()[56] > belief.mean()[55]);
    }

    #[test]
    fn repeated_sampling_converges_to_noise_floor() {
        let (_, mut belief) = square_belief(0.1);
        let sigma2 = belief.kernel().variance();
        let r = belief.noise_variance();
        let repeats = 50;
        for _ in 0..repeats {
            belief.assimilate(&[12], &[21.0]).unwrap();
        }
        let floor = 1.0 / (1.0 / sigma2 + repeats as f64 / r);
        assert_relative_eq!(belief.variance()[12], floor, max_relative = 1e-6);
        assert!(belief.variance()[12] > 0.0);
    }

    #[test]
    fn singular_innovation_is_skipped() {
        let (_, mut belief) = square_belief(0.0);
        belief.assimilate(&[7], &[15.0]).unwrap();
        let snapshot = belief.clone();
        assert_abs_diff_eq!(belief.variance()[7], 0.0, epsilon = 1e-12);
        // Same point again with zero noise: S = 0, nothing to learn.
        belief.assimilate(&[7], &[30.0]).unwrap();
        assert_eq!(belief.state(), snapshot.state());
    }

    #[test]
    fn rejects_malformed_selections() {
        let (_, mut belief) = square_belief(0.1);
        assert_eq!(
            belief.assimilate(&[1, 2], &[1.0]),
            Err(BeliefError::DimensionMismatch {
                selection: 2,
                values: 1
            })
        );
        assert_eq!(
            belief.assimilate(&[100], &[1.0]),
            Err(BeliefError::IndexOutOfRange { index: 100, len: 100 })
        );
    }

    #[test]
    fn rejects_mismatched_prior_and_bad_noise() {
        let grid = Grid::regular(Location::origin(), 1.0, 3, 3);
        let kernel = Box::new(Matern32Kernel::from_lateral_range(1.0, 2.0));
        let err = SpatialBeliefField::initialize(
            &grid,
            PriorMean::Field(DVector::zeros(4)),
            kernel.clone(),
            0.1,
        )
        .unwrap_err();
        assert!(matches!(err, BeliefError::InvalidKernelParameters(_)));
        let err =
            SpatialBeliefField::initialize(&grid, PriorMean::Constant(0.0), kernel, -1.0).unwrap_err();
        assert!(matches!(err, BeliefError::InvalidKernelParameters(_)));
    }

    #[test]
    fn excursion_probability_follows_mean_and_threshold() {
        let (_, belief) = square_belief(0.1);
        let p = belief.excursion_probability(27.0);
        // Prior mean 20, sd 1: threshold is 7 sd above, so almost surely below.
        assert!(p.iter().all(|&v| v > 0.999));
        let p = belief.excursion_probability(20.0);
        assert!(p.iter().all(|&v| (v - 0.5).abs() < 1e-12));
        assert_eq!(excursion_probability(10.0, 0.0, 12.0), 1.0);
        assert_eq!(excursion_probability(14.0, 0.0, 12.0), 0.0);
    }

    #[test]
    fn location_measurements_are_binned_and_averaged() {
        let (grid, mut belief) = square_belief(0.1);
        let mut twin = belief.clone();
        let updated = belief
            .assimilate_at_locations(
                &grid,
                &[
                    (Location::new(0.45, 0.55), 18.0),
                    (Location::new(0.6, 0.4), 22.0),
                    (Location::new(9.5, 9.4), 10.0),
                ],
            )
            .unwrap();
        assert_eq!(updated, vec![0, 99]);
        twin.assimilate(&[0, 99], &[20.0, 10.0]).unwrap();
        assert_abs_diff_eq!((belief.mean() - twin.mean()).amax(), 0.0, epsilon = 1e-12);
    }

    /// Fully correlated within one metre, anti-correlated beyond: not a valid
    /// covariance once three collinear points are involved.
    #[derive(Debug, Clone)]
    struct StepKernel;

    impl CovarianceKernel for StepKernel {
        fn covariance(&self, distance: f64) -> f64 {
            if distance <= 1.0 {
                1.0
            } else {
                -1.0
            }
        }

        fn validate(&self) -> Result<(), BeliefError> {
            Ok(())
        }
    }

    #[test]
    fn rejects_kernel_that_is_not_positive_semidefinite() {
        let grid = Grid::regular(Location::origin(), 1.0, 3, 1);
        let err = SpatialBeliefField::initialize(
            &grid,
            PriorMean::Constant(0.0),
            Box::new(StepKernel),
            0.1,
        )
        .unwrap_err();
        assert_eq!(
            err,
            BeliefError::InvalidKernelParameters("covariance is not positive semi-definite".to_string())
        );
    }

    #[test]
    fn posterior_guard_clamps_round_off() {
        let prior = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        let mut posterior = DMatrix::from_row_slice(2, 2, &[-1e-12, 0.3, 0.3 + 1e-6, 1.0 + 1e-12]);
        guard_posterior(&mut posterior, &prior).unwrap();
        assert_eq!(posterior[(0, 0)], 0.0);
        assert_eq!(posterior[(1, 1)], 1.0);
        assert_abs_diff_eq!(posterior[(0, 1)], posterior[(1, 0)]);
        assert_abs_diff_eq!(posterior[(0, 1)], 0.3 + 5e-7, epsilon = 1e-12);
    }

    #[test]
    fn posterior_guard_reports_negative_variance() {
        let prior = DMatrix::identity(3, 3);
        let mut posterior = DMatrix::identity(3, 3);
        posterior[(2, 2)] = -0.5;
        assert_eq!(
            guard_posterior(&mut posterior, &prior),
            Err(BeliefError::NumericalInstability {
                index: 2,
                variance: -0.5
            })
        );
        posterior[(2, 2)] = f64::NAN;
        assert!(matches!(
            guard_posterior(&mut posterior, &prior),
            Err(BeliefError::NumericalInstability { index: 2, .. })
        ));
    }

    #[test]
    fn rmse_against_prior_mean_is_zero() {
        let (_, belief) = square_belief(0.1);
        let truth = DVector::from_element(100, 20.0);
        assert_abs_diff_eq!(belief.rmse_against(&truth), 0.0);
    }
}
