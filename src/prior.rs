//! Prior distributions for the kernel parameters.
//!
//! A parameter is either fixed by the caller, given one of the custom
//! unnormalized log-density priors ([`jeffreys_logp`],
//! [`double_lobed_logp`]) or given a standard distribution. The custom
//! priors are improper and can only be evaluated, never sampled.

use rand::Rng;
use rand_distr::Distribution;
use statrs::distribution::{Continuous, Gamma, InverseGamma, Uniform};
use thiserror::Error;

use crate::transform::Support;

/// The three parameters of the damped power-exponential kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    /// Amplitude scale
    Sigma,
    /// Damping timescale
    Tau,
    /// Smoothness exponent
    Nu,
}

impl Parameter {
    pub fn name(&self) -> &'static str {
        match self {
            Parameter::Sigma => "sigma",
            Parameter::Tau => "tau",
            Parameter::Nu => "nu",
        }
    }
}

/// Which kind of prior a parameter gets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriorSpec {
    /// Use the value as is, no random variable.
    Fixed(f64),
    /// Custom unnormalized log-density prior.
    Custom,
    /// Standard named distribution.
    Standard,
}

impl PriorSpec {
    /// A fixed value takes precedence over the custom-prior flag.
    pub fn select(fixed: Option<f64>, use_custom_priors: bool) -> Self {
        match (fixed, use_custom_priors) {
            (Some(value), _) => PriorSpec::Fixed(value),
            (None, true) => PriorSpec::Custom,
            (None, false) => PriorSpec::Standard,
        }
    }
}

/// Constants of the prior distributions.
#[derive(Debug, Clone, Copy)]
pub struct PriorHyperparameters {
    /// Shape of the Gamma prior on the inverse variance `1 / sigma^2`.
    pub inv_variance_shape: f64,
    /// Rate of the Gamma prior on the inverse variance.
    pub inv_variance_rate: f64,
    /// Shape of the Inverse-Gamma prior on tau. Its scale is
    /// `sqrt(time_span * cadence)`.
    pub tau_shape: f64,
    /// Upper end of the double-lobed prior on tau.
    pub tau_upper: f64,
    /// Starting value of tau under the double-lobed prior.
    pub tau_custom_initial: f64,
    pub nu_low: f64,
    pub nu_high: f64,
    pub nu_initial: f64,
}

impl Default for PriorHyperparameters {
    fn default() -> Self {
        Self {
            inv_variance_shape: 0.001,
            inv_variance_rate: 0.001,
            tau_shape: 2.,
            tau_upper: 10000.,
            tau_custom_initial: 30.,
            nu_low: 0.,
            nu_high: 2.,
            nu_initial: 1.,
        }
    }
}

/// Scale-invariant prior, density proportional to `1 / value`.
///
/// The density at exactly zero is left undefined and reported as `NaN`.
pub fn jeffreys_logp(value: f64) -> f64 {
    if value > 0. {
        -value.ln()
    } else if value < 0. {
        f64::NEG_INFINITY
    } else {
        f64::NAN
    }
}

/// Prior symmetric in `ln(value)` around the cadence.
///
/// Density is `cadence / value` below the cadence and `value / cadence`
/// inverted above it, zero outside `(0, upper)`. The upper lobe is tested
/// first, so `value == cadence` falls into the lower lobe.
pub fn double_lobed_logp(value: f64, cadence: f64, upper: f64) -> f64 {
    if upper > value && value > cadence {
        -(value / cadence).ln()
    } else if 0. < value && value <= cadence {
        -(cadence / value).ln()
    } else {
        f64::NEG_INFINITY
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PriorError {
    #[error("invalid parameters for the {distribution} distribution: {reason}")]
    InvalidParameters {
        distribution: &'static str,
        reason: String,
    },
}

fn invalid<E: std::fmt::Display>(distribution: &'static str) -> impl FnOnce(E) -> PriorError {
    move |err| PriorError::InvalidParameters {
        distribution,
        reason: err.to_string(),
    }
}

/// A prior distribution over one scalar value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Prior {
    /// See [`jeffreys_logp`].
    Jeffreys,
    /// See [`double_lobed_logp`].
    DoubleLobedLog { cadence: f64, upper: f64 },
    Gamma {
        shape: f64,
        rate: f64,
        dist: Gamma,
    },
    InverseGamma {
        shape: f64,
        scale: f64,
        dist: InverseGamma,
    },
    Uniform {
        low: f64,
        high: f64,
        dist: Uniform,
    },
}

impl Prior {
    pub fn gamma(shape: f64, rate: f64) -> Result<Self, PriorError> {
        let dist = Gamma::new(shape, rate).map_err(invalid("gamma"))?;
        Ok(Prior::Gamma { shape, rate, dist })
    }

    /// Inverse-Gamma with density proportional to `x^(-shape-1) exp(-scale/x)`.
    pub fn inverse_gamma(shape: f64, scale: f64) -> Result<Self, PriorError> {
        let dist = InverseGamma::new(shape, scale).map_err(invalid("inverse gamma"))?;
        Ok(Prior::InverseGamma { shape, scale, dist })
    }

    pub fn uniform(low: f64, high: f64) -> Result<Self, PriorError> {
        let dist = Uniform::new(low, high).map_err(invalid("uniform"))?;
        Ok(Prior::Uniform { low, high, dist })
    }

    /// Log density at `value`, up to a constant for the improper priors.
    pub fn ln_pdf(&self, value: f64) -> f64 {
        match self {
            Prior::Jeffreys => jeffreys_logp(value),
            Prior::DoubleLobedLog { cadence, upper } => {
                double_lobed_logp(value, *cadence, *upper)
            }
            Prior::Gamma { dist, .. } => dist.ln_pdf(value),
            Prior::InverseGamma { dist, .. } => dist.ln_pdf(value),
            Prior::Uniform { dist, .. } => dist.ln_pdf(value),
        }
    }

    pub fn support(&self) -> Support {
        match *self {
            Prior::Jeffreys | Prior::Gamma { .. } | Prior::InverseGamma { .. } => {
                Support::Positive
            }
            Prior::DoubleLobedLog { cadence, upper } => Support::Interval {
                low: 0.,
                high: upper.max(cadence),
            },
            Prior::Uniform { low, high, .. } => Support::Interval { low, high },
        }
    }

    pub fn is_proper(&self) -> bool {
        !matches!(self, Prior::Jeffreys | Prior::DoubleLobedLog { .. })
    }

    /// Draw a value from the prior. Improper priors return `None`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<f64> {
        match *self {
            Prior::Jeffreys | Prior::DoubleLobedLog { .. } => None,
            Prior::Gamma { shape, rate, .. } => {
                let dist = rand_distr::Gamma::new(shape, rate.recip()).ok()?;
                Some(dist.sample(rng))
            }
            Prior::InverseGamma { shape, scale, .. } => {
                let dist = rand_distr::Gamma::new(shape, scale.recip()).ok()?;
                Some(dist.sample(rng).recip())
            }
            Prior::Uniform { low, high, .. } => {
                let dist = rand::distr::Uniform::new_inclusive(low, high).ok()?;
                Some(dist.sample(rng))
            }
        }
    }
}
