// mascot_sim/src/ground_truth.rs

use mascot_core::belief::CovarianceKernel;
use mascot_core::grid::Grid;
use mascot_core::interfaces::GroundTruthProvider;
use mascot_core::types::Location;
use nalgebra::{Cholesky, DMatrix, DVector};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, StandardNormal};
use tracing::{debug, warn};

use crate::error::SimError;

/// Jitter added to the covariance diagonal, escalated tenfold until the
/// factorization succeeds.
const JITTER_START: f64 = 1e-10;
const JITTER_MAX: f64 = 1e-4;

/// A synthetic field drawn from the same Gaussian prior the belief starts
/// from: `x = m + L z` with `L L^T = Σ`. With an AR(1) coefficient `rho` the
/// field drifts between time steps as
/// `x_t = m + rho (x_{t-1} - m) + sqrt(1 - rho^2) L z`.
#[derive(Debug, Clone)]
pub struct GaussianFieldTruth {
    grid: Grid,
    mean: DVector<f64>,
    factor: DMatrix<f64>,
    values: DVector<f64>,
    ar1_correlation: Option<f64>,
    time_step: f64,
    /// Mission time the current `values` belong to.
    time: f64,
    noise: Option<Normal<f64>>,
    rng: ChaCha8Rng,
}

impl GaussianFieldTruth {
    pub fn draw(
        grid: Grid,
        mean: DVector<f64>,
        kernel: &dyn CovarianceKernel,
        noise_variance: f64,
        ar1_correlation: Option<f64>,
        time_step: f64,
        mut rng: ChaCha8Rng,
    ) -> Result<Self, SimError> {
        let n = grid.len();
        let covariance = grid.distance_matrix().map(|d| kernel.covariance(d));
        let factor = lower_factor(covariance)?;
        let values = &mean + &factor * standard_normal(n, &mut rng);
        // A zero nugget means a perfect sensor.
        let noise = if noise_variance > 0.0 {
            Normal::new(0.0, noise_variance.sqrt()).ok()
        } else {
            None
        };
        debug!(
            locations = n,
            min = values.min(),
            max = values.max(),
            "Ground truth field drawn"
        );
        Ok(Self {
            grid,
            mean,
            factor,
            values,
            ar1_correlation,
            time_step,
            time: 0.0,
            noise,
            rng,
        })
    }

    /// Noise-free truth at every grid index, at the current mission time.
    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    /// Noise-free truth at the grid point nearest `location`.
    pub fn value_at(&self, location: &Location) -> Option<f64> {
        self.grid.nearest_index(location).map(|i| self.values[i])
    }

    /// Steps the AR(1) process forward until it reaches `time`.
    fn evolve_to(&mut self, time: f64) {
        let Some(rho) = self.ar1_correlation else {
            return;
        };
        let innovation_scale = (1.0 - rho * rho).max(0.0).sqrt();
        while self.time + self.time_step <= time + f64::EPSILON {
            let z = standard_normal(self.values.len(), &mut self.rng);
            let drift = (&self.values - &self.mean) * rho;
            self.values = &self.mean + drift + &self.factor * z * innovation_scale;
            self.time += self.time_step;
        }
    }
}

impl GroundTruthProvider for GaussianFieldTruth {
    fn sample(&mut self, location: &Location, time: f64) -> f64 {
        self.evolve_to(time);
        let Some(truth) = self.value_at(location) else {
            warn!(%location, "Sampled an empty truth grid");
            return f64::NAN;
        };
        match &self.noise {
            Some(noise) => truth + noise.sample(&mut self.rng),
            None => truth,
        }
    }

    fn field_snapshot(&self) -> Option<DVector<f64>> {
        Some(self.values.clone())
    }
}

fn standard_normal(n: usize, rng: &mut ChaCha8Rng) -> DVector<f64> {
    DVector::from_fn(n, |_, _| StandardNormal.sample(&mut *rng))
}

fn lower_factor(covariance: DMatrix<f64>) -> Result<DMatrix<f64>, SimError> {
    let n = covariance.nrows();
    let scale = covariance.diagonal().max().max(1.0);
    let mut jitter = JITTER_START;
    while jitter <= JITTER_MAX {
        let mut jittered = covariance.clone();
        for i in 0..n {
            jittered[(i, i)] += jitter * scale;
        }
        if let Some(cholesky) = Cholesky::new(jittered) {
            return Ok(cholesky.l());
        }
        jitter *= 10.0;
    }
    Err(SimError::TruthFactorization { locations: n })
}
