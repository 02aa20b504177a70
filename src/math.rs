use std::cell::RefCell;

use finitediff::FiniteDiff;
use itertools::izip;

use crate::logp::LogpError;

/// Numerically stable `ln(1 + exp(x))`.
#[inline]
pub(crate) fn log1pexp(x: f64) -> f64 {
    if x > 0. {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

#[inline]
pub(crate) fn logistic(x: f64) -> f64 {
    if x >= 0. {
        1. / (1. + (-x).exp())
    } else {
        let e = x.exp();
        e / (1. + e)
    }
}

#[inline]
pub(crate) fn logit(p: f64) -> f64 {
    p.ln() - (-p).ln_1p()
}

/// Approximate the gradient of `func` at `position` by finite differences.
///
/// Each coordinate is stepped by `relative_step * max(|x|, 1)`. Central
/// differences are used where both sides of the stencil evaluate; if one side
/// fails with a recoverable error the one-sided difference on the other side
/// is used instead. Unrecoverable errors are returned immediately.
pub(crate) fn finite_difference_gradient<E, F>(
    func: F,
    position: &[f64],
    gradient: &mut [f64],
    relative_step: f64,
) -> Result<(), E>
where
    E: LogpError,
    F: Fn(&[f64]) -> Result<f64, E>,
{
    assert!(position.len() == gradient.len());

    // finitediff takes a fixed step of sqrt(eps), so differentiate along
    // scaled coordinates `x + scale * u` around `u = 0`.
    let base_step = f64::EPSILON.sqrt();
    let scales: Vec<f64> = position
        .iter()
        .map(|x| relative_step * x.abs().max(1.) / base_step)
        .collect();

    // The closures passed to finitediff can't fail, so errors go into
    // `closure_err` and the evaluation returns NaN. A fatal error replaces a
    // recoverable one.
    let closure_err: RefCell<Option<E>> = RefCell::new(None);
    let eval = |direction: f64, u: &[f64]| -> f64 {
        let point: Vec<f64> = izip!(position, &scales, u)
            .map(|(x, scale, u)| x + direction * scale * u)
            .collect();
        match func(&point) {
            Ok(val) => val,
            Err(err) => {
                let mut slot = closure_err.borrow_mut();
                let replace = slot
                    .as_ref()
                    .map_or(true, |prev| prev.is_recoverable() && !err.is_recoverable());
                if replace {
                    *slot = Some(err);
                }
                f64::NAN
            }
        }
    };

    let origin = vec![0f64; position.len()];
    let central = origin.central_diff(&|u: &Vec<f64>| eval(1., u));
    let Some(err) = closure_err.take() else {
        for (grad, (value, scale)) in gradient.iter_mut().zip(central.iter().zip(&scales)) {
            *grad = value / scale;
        }
        return Ok(());
    };
    if !err.is_recoverable() {
        return Err(err);
    }

    // Backward differences are forward differences along the reflected axis.
    let forward = origin.forward_diff(&|u: &Vec<f64>| eval(1., u));
    let backward = origin.forward_diff(&|u: &Vec<f64>| eval(-1., u));
    if let Some(fatal) = closure_err.take().filter(|err| !err.is_recoverable()) {
        return Err(fatal);
    }

    for (i, grad) in gradient.iter_mut().enumerate() {
        let value = [central[i], forward[i], -backward[i]]
            .into_iter()
            .find(|value| value.is_finite());
        match value {
            Some(value) => *grad = value / scales[i],
            None => return Err(err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use thiserror::Error;

    #[derive(Error, Debug)]
    enum TestError {
        #[error("outside support")]
        Outside,
        #[error("broken")]
        Broken,
    }

    impl LogpError for TestError {
        fn is_recoverable(&self) -> bool {
            matches!(self, TestError::Outside)
        }
    }

    proptest! {
        #[test]
        fn check_logistic_logit(x in -15f64..15f64) {
            let p = logistic(x);
            prop_assert!(p > 0. && p < 1.);
            prop_assert!((logit(p) - x).abs() < 1e-8 * x.abs().max(1.));
        }

        #[test]
        fn check_log1pexp(x in -30f64..30f64) {
            let naive = x.exp().ln_1p();
            prop_assert!((log1pexp(x) - naive).abs() < 1e-12 * naive.abs().max(1.));
        }
    }

    #[test]
    fn log1pexp_large() {
        assert_eq!(log1pexp(1000.), 1000.);
        assert!(log1pexp(-1000.) >= 0.);
    }

    #[test]
    fn central_gradient() {
        let func = |x: &[f64]| -> Result<f64, TestError> {
            Ok(-0.5 * x[0] * x[0] - 2. * x[1] * x[1] + x[0] * x[1])
        };
        let position = [0.3, -1.2];
        let mut gradient = [0.; 2];
        finite_difference_gradient(func, &position, &mut gradient, 1e-6).unwrap();

        assert_abs_diff_eq!(gradient[0], -0.3 - 1.2, epsilon = 1e-6);
        assert_abs_diff_eq!(gradient[1], 4. * 1.2 + 0.3, epsilon = 1e-6);
    }

    #[test]
    fn one_sided_near_boundary() {
        let func = |x: &[f64]| -> Result<f64, TestError> {
            if x[0] < 0. {
                Err(TestError::Outside)
            } else {
                Ok(3. * x[0])
            }
        };
        let position = [0.];
        let mut gradient = [0.];
        finite_difference_gradient(func, &position, &mut gradient, 1e-6).unwrap();
        assert_abs_diff_eq!(gradient[0], 3., epsilon = 1e-8);
    }

    #[test]
    fn fatal_errors_propagate() {
        let func = |x: &[f64]| -> Result<f64, TestError> {
            if x[0] > 0. {
                Err(TestError::Broken)
            } else {
                Ok(x[0])
            }
        };
        let mut gradient = [0.];
        let err = finite_difference_gradient(func, &[0.], &mut gradient, 1e-6).unwrap_err();
        assert!(matches!(err, TestError::Broken));
    }

    #[test]
    fn one_sided_per_coordinate() {
        // x[1] is bounded above by 2, x[0] is unbounded.
        let func = |x: &[f64]| -> Result<f64, TestError> {
            if x[1] > 2. {
                Err(TestError::Outside)
            } else {
                Ok(x[0] * x[0] + 5. * x[1])
            }
        };
        let position = [1.5, 2.];
        let mut gradient = [0.; 2];
        finite_difference_gradient(func, &position, &mut gradient, 1e-6).unwrap();
        assert_abs_diff_eq!(gradient[0], 3., epsilon = 1e-6);
        assert_abs_diff_eq!(gradient[1], 5., epsilon = 1e-6);
    }

    #[test]
    fn relative_step_for_large_coordinates() {
        let func = |x: &[f64]| -> Result<f64, TestError> { Ok((x[0] / 1e4).sin()) };
        let position = [2e4];
        let mut gradient = [0.];
        finite_difference_gradient(func, &position, &mut gradient, 1e-6).unwrap();
        assert_abs_diff_eq!(gradient[0], 2f64.cos() / 1e4, epsilon = 1e-12);
    }

    #[test]
    fn both_sides_outside_support() {
        let func = |x: &[f64]| -> Result<f64, TestError> {
            if x[0] != 0. {
                Err(TestError::Outside)
            } else {
                Ok(0.)
            }
        };
        let mut gradient = [0.];
        let err = finite_difference_gradient(func, &[0.], &mut gradient, 1e-6).unwrap_err();
        assert!(matches!(err, TestError::Outside));
    }

    #[test]
    fn fatal_error_after_recoverable() {
        let func = |x: &[f64]| -> Result<f64, TestError> {
            if x[0] < 0. {
                Err(TestError::Outside)
            } else if x[0] > 0. {
                Err(TestError::Broken)
            } else {
                Ok(0.)
            }
        };
        let mut gradient = [0.];
        let err = finite_difference_gradient(func, &[0.], &mut gradient, 1e-6).unwrap_err();
        assert!(matches!(err, TestError::Broken));
    }
}
