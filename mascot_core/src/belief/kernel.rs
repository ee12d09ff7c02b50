// mascot_core/src/belief/kernel.rs

use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::BeliefError;

// --- COVARIANCE KERNEL TRAIT ---
// Stationary, isotropic prior covariance `k(d)` between two grid points `d` apart.
pub trait CovarianceKernel: DynClone + Debug + Send + Sync {
    /// Covariance between two locations separated by `distance` metres.
    fn covariance(&self, distance: f64) -> f64;

    /// Marginal variance, `k(0)`.
    fn variance(&self) -> f64 {
        self.covariance(0.0)
    }

    /// Rejects parameter sets that cannot yield a valid covariance matrix.
    fn validate(&self) -> Result<(), BeliefError>;
}

// This macro automatically generates the implementation of `Clone` for `Box<dyn CovarianceKernel>`.
dyn_clone::clone_trait_object!(CovarianceKernel);

/// Shared parameter check: finite, strictly positive sigma and eta.
fn check_sigma_eta(sigma: f64, eta: f64) -> Result<(), BeliefError> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(BeliefError::InvalidKernelParameters(format!(
            "sigma must be finite and positive, got {sigma}"
        )));
    }
    if !eta.is_finite() || eta <= 0.0 {
        return Err(BeliefError::InvalidKernelParameters(format!(
            "eta must be finite and positive, got {eta}"
        )));
    }
    Ok(())
}

/// Matérn covariance with smoothness 3/2:
/// `k(d) = sigma^2 (1 + eta d) exp(-eta d)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matern32Kernel {
    pub sigma: f64,
    pub eta: f64,
}

impl Matern32Kernel {
    /// With `eta = 4.5 / lateral_range`, correlation has decayed to roughly
    /// 6% at `lateral_range`.
    pub fn from_lateral_range(sigma: f64, lateral_range: f64) -> Self {
        Self {
            sigma,
            eta: 4.5 / lateral_range,
        }
    }

    pub fn lateral_range(&self) -> f64 {
        4.5 / self.eta
    }
}

impl CovarianceKernel for Matern32Kernel {
    fn covariance(&self, distance: f64) -> f64 {
        let ed = self.eta * distance;
        self.sigma.powi(2) * (1.0 + ed) * (-ed).exp()
    }

    fn validate(&self) -> Result<(), BeliefError> {
        check_sigma_eta(self.sigma, self.eta)
    }
}

/// Exponential (Matérn 1/2) covariance: `k(d) = sigma^2 exp(-eta d)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialKernel {
    pub sigma: f64,
    pub eta: f64,
}

impl ExponentialKernel {
    pub fn from_lateral_range(sigma: f64, lateral_range: f64) -> Self {
        Self {
            sigma,
            eta: 3.0 / lateral_range,
        }
    }
}

impl CovarianceKernel for ExponentialKernel {
    fn covariance(&self, distance: f64) -> f64 {
        self.sigma.powi(2) * (-self.eta * distance).exp()
    }

    fn validate(&self) -> Result<(), BeliefError> {
        check_sigma_eta(self.sigma, self.eta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn matern_at_zero_is_sigma_squared() {
        let k = Matern32Kernel::from_lateral_range(1.5, 2.0);
        assert_relative_eq!(k.variance(), 2.25);
        assert_relative_eq!(k.lateral_range(), 2.0);
    }

    #[test]
    fn matern_decays_monotonically() {
        let k = Matern32Kernel::from_lateral_range(1.0, 2.0);
        let mut last = k.covariance(0.0);
        for step in 1..50 {
            let c = k.covariance(step as f64 * 0.1);
            assert!(c < last);
            assert!(c > 0.0);
            last = c;
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let k = Matern32Kernel { sigma: -1.0, eta: 1.0 };
        assert!(matches!(
            k.validate(),
            Err(BeliefError::InvalidKernelParameters(_))
        ));
        let k = ExponentialKernel { sigma: 1.0, eta: f64::NAN };
        assert!(k.validate().is_err());
    }

    #[test]
    fn boxed_kernels_clone() {
        let k: Box<dyn CovarianceKernel> = Box::new(ExponentialKernel::from_lateral_range(1.0, 3.0));
        let cloned = k.clone();
        assert_relative_eq!(cloned.covariance(1.0), k.covariance(1.0));
    }
}
