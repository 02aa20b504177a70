//! Bijections between the unconstrained coordinates a gradient-based sampler
//! moves in and the support of each prior.

use crate::math::{log1pexp, logistic, logit};

/// The set of values a prior assigns positive density to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Support {
    /// `(0, inf)`
    Positive,
    /// `(low, high)`
    Interval { low: f64, high: f64 },
}

/// Maps an unconstrained real onto a [`Support`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// `x = exp(z)`
    Log,
    /// `x = low + (high - low) * logistic(z)`
    Interval { low: f64, high: f64 },
}

impl Transform {
    pub fn for_support(support: Support) -> Self {
        match support {
            Support::Positive => Transform::Log,
            Support::Interval { low, high } => Transform::Interval { low, high },
        }
    }

    /// Map an unconstrained value into the support.
    pub fn forward(&self, z: f64) -> f64 {
        match *self {
            Transform::Log => z.exp(),
            Transform::Interval { low, high } => low + (high - low) * logistic(z),
        }
    }

    /// Map a value in the support back to the unconstrained space.
    pub fn inverse(&self, x: f64) -> f64 {
        match *self {
            Transform::Log => x.ln(),
            Transform::Interval { low, high } => logit((x - low) / (high - low)),
        }
    }

    /// `ln |dx/dz|` at the unconstrained value `z`.
    pub fn log_abs_det_jacobian(&self, z: f64) -> f64 {
        match *self {
            Transform::Log => z,
            Transform::Interval { low, high } => (high - low).ln() - log1pexp(-z) - log1pexp(z),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn transforms() -> [Transform; 3] {
        [
            Transform::Log,
            Transform::Interval { low: 0., high: 2. },
            Transform::Interval {
                low: 0.,
                high: 10000.,
            },
        ]
    }

    proptest! {
        #[test]
        fn roundtrip(z in -10f64..10f64) {
            for transform in transforms() {
                let x = transform.forward(z);
                let back = transform.inverse(x);
                prop_assert!((back - z).abs() < 1e-7 * z.abs().max(1.), "{:?}: {} -> {} -> {}", transform, z, x, back);
            }
        }

        #[test]
        fn log_jacobian_matches_finite_difference(z in -8f64..8f64) {
            let eps = 1e-6;
            for transform in transforms() {
                let fd = ((transform.forward(z + eps) - transform.forward(z - eps)) / (2. * eps)).ln();
                let analytic = transform.log_abs_det_jacobian(z);
                prop_assert!((fd - analytic).abs() < 1e-5, "{:?} at {}: fd={} analytic={}", transform, z, fd, analytic);
            }
        }
    }

    #[test]
    fn stays_in_support() {
        let nu = Transform::for_support(Support::Interval { low: 0., high: 2. });
        for z in [-50., -1., 0., 1., 50.] {
            let x = nu.forward(z);
            assert!((0. ..=2.).contains(&x));
        }
        assert_eq!(nu.forward(0.), 1.);
        assert!(Transform::Log.forward(-700.) > 0.);
    }
}
