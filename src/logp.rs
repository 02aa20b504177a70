//! Log posterior of the assembled model and its sampler interface.

use std::{error::Error, fmt::Debug};

use anyhow::{bail, Context, Result};
use rand::Rng;
use thiserror::Error;
use tracing::trace;

use crate::{
    likelihood::{EvaluatorError, EvaluatorFactory, KernelParams},
    math::finite_difference_gradient,
    model::PowExpModel,
    series::ObservedSeries,
};

pub trait LogpError: std::error::Error {
    /// Unrecoverable errors during logp computation stop sampling,
    /// recoverable errors are seen as divergences.
    fn is_recoverable(&self) -> bool;
}

/// An unnormalized log density over an unconstrained parameter vector,
/// together with its gradient.
pub trait CpuLogpFunc {
    type LogpError: Debug + Send + Sync + Error + LogpError + 'static;

    fn dim(&self) -> usize;
    fn logp(&mut self, position: &[f64], gradient: &mut [f64]) -> Result<f64, Self::LogpError>;
}

/// Settings for the finite-difference gradient.
#[derive(Debug, Clone, Copy)]
pub struct GradientOptions {
    /// Step size relative to `max(|x|, 1)`.
    pub relative_step: f64,
}

impl Default for GradientOptions {
    fn default() -> Self {
        Self {
            relative_step: 1e-6,
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LogpFailure {
    #[error("the prior on {parameter} has zero probability at {value}")]
    ZeroProbability { parameter: &'static str, value: f64 },
    #[error("the prior density of {parameter} is undefined at {value}")]
    UndefinedDensity { parameter: &'static str, value: f64 },
    #[error("log likelihood is not finite: {0}")]
    NonFiniteLikelihood(f64),
    #[error("likelihood evaluation failed")]
    Likelihood(#[from] EvaluatorError),
    #[error("expected a position with {expected} coordinates, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl LogpError for LogpFailure {
    fn is_recoverable(&self) -> bool {
        match self {
            LogpFailure::ZeroProbability { .. }
            | LogpFailure::UndefinedDensity { .. }
            | LogpFailure::NonFiniteLikelihood(_) => true,
            LogpFailure::Likelihood(err) => err.is_recoverable(),
            LogpFailure::DimensionMismatch { .. } => false,
        }
    }
}

const MAX_INIT_TRIES: usize = 100;

impl<S, F> PowExpModel<S, F> {
    fn check_dim(&self, position: &[f64]) -> Result<(), LogpFailure> {
        let expected = self.free_variables().count();
        if position.len() != expected {
            return Err(LogpFailure::DimensionMismatch {
                expected,
                actual: position.len(),
            });
        }
        Ok(())
    }

    /// Parameter values at `position`, plus the log prior and log Jacobian
    /// terms of the free variables.
    fn unpack(&self, position: &[f64]) -> Result<(KernelParams, f64), LogpFailure> {
        self.check_dim(position)?;

        let mut coords = position.iter().copied();
        let mut logp = 0f64;
        let mut values = [0f64; 3];
        for (node, out) in self.parameters().into_iter().zip(values.iter_mut()) {
            *out = match node.free() {
                None => node.value(f64::NAN),
                Some(var) => {
                    let z = coords
                        .next()
                        .ok_or_else(|| LogpFailure::DimensionMismatch {
                            expected: self.free_variables().count(),
                            actual: position.len(),
                        })?;
                    let transform = var.transform();
                    let x = transform.forward(z);
                    let prior_logp = var.prior().ln_pdf(x);
                    if prior_logp.is_nan() {
                        return Err(LogpFailure::UndefinedDensity {
                            parameter: var.name(),
                            value: x,
                        });
                    }
                    if prior_logp == f64::NEG_INFINITY {
                        return Err(LogpFailure::ZeroProbability {
                            parameter: var.name(),
                            value: x,
                        });
                    }
                    logp += prior_logp + transform.log_abs_det_jacobian(z);
                    node.value(x)
                }
            };
        }
        let [sigma, tau, nu] = values;
        Ok((KernelParams::new(sigma, tau, nu), logp))
    }

    /// Kernel parameters in natural units at an unconstrained `position`.
    pub fn constrained(&self, position: &[f64]) -> Result<KernelParams, LogpFailure> {
        Ok(self.unpack(position)?.0)
    }

    /// Unconstrained position at which the kernel parameters take `params`.
    ///
    /// Values of fixed parameters are ignored.
    pub fn unconstrained(&self, params: KernelParams) -> Vec<f64> {
        self.parameters()
            .into_iter()
            .zip([params.sigma, params.tau, params.nu])
            .filter_map(|(node, value)| {
                let var = node.free()?;
                Some(var.transform().inverse(node.free_value(value)?))
            })
            .collect()
    }
}

impl<S, F> PowExpModel<S, F>
where
    S: ObservedSeries,
    F: EvaluatorFactory<S>,
{
    /// Unnormalized log posterior at an unconstrained `position`.
    pub fn log_density(&self, position: &[f64]) -> Result<f64, LogpFailure> {
        let (params, prior_logp) = self.unpack(position)?;
        let loglike = self
            .likelihood
            .log_density(&self.series, &self.factory, params)
            .inspect_err(|err| trace!(?params, error = %err, "likelihood evaluation failed"))?;
        if !loglike.is_finite() {
            trace!(?params, loglike, "non-finite log likelihood");
            return Err(LogpFailure::NonFiniteLikelihood(loglike));
        }
        Ok(prior_logp + loglike)
    }

    /// Write a starting point for sampling into `position`.
    ///
    /// Each coordinate is the initial value of its variable, mapped to the
    /// unconstrained space, plus uniform noise in `[-jitter, jitter]`. Points
    /// are redrawn until the log density is finite.
    pub fn init_position<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        position: &mut [f64],
        jitter: f64,
    ) -> Result<()> {
        self.check_dim(position)?;

        let centers: Vec<f64> = self
            .free_variables()
            .map(|var| var.transform().inverse(var.initial()))
            .collect();

        let mut last_error = None;
        for _ in 0..MAX_INIT_TRIES {
            for (pos, &center) in position.iter_mut().zip(centers.iter()) {
                *pos = if jitter > 0. {
                    center + rng.random_range(-jitter..=jitter)
                } else {
                    center
                };
            }
            match self.log_density(position) {
                Ok(_) => return Ok(()),
                Err(err) if err.is_recoverable() && jitter > 0. => last_error = Some(err),
                Err(err) => {
                    return Err(err).context("log density is not finite at the initial point")
                }
            }
        }
        match last_error {
            Some(err) => Err(err).with_context(|| {
                format!("no finite initial point found in {} tries", MAX_INIT_TRIES)
            }),
            None => bail!("no finite initial point found"),
        }
    }
}

impl<S, F> CpuLogpFunc for PowExpModel<S, F>
where
    S: ObservedSeries,
    F: EvaluatorFactory<S>,
{
    type LogpError = LogpFailure;

    fn dim(&self) -> usize {
        self.free_variables().count()
    }

    fn logp(&mut self, position: &[f64], gradient: &mut [f64]) -> Result<f64, LogpFailure> {
        self.check_dim(gradient)?;
        let logp = self.log_density(position)?;
        finite_difference_gradient(
            |point| self.log_density(point),
            position,
            gradient,
            self.gradient.relative_step,
        )?;
        Ok(logp)
    }
}
