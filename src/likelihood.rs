//! The observed likelihood node and the seam to the external Gaussian-process
//! likelihood evaluator.

use std::fmt;

use thiserror::Error;

/// Covariance families understood by the likelihood evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CovarianceKind {
    /// Damped power exponential, `sigma^2 exp(-(|dt| / tau)^nu)`.
    PowExp,
}

impl CovarianceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CovarianceKind::PowExp => "pow_exp",
        }
    }
}

impl fmt::Display for CovarianceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kernel parameters in their natural units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelParams {
    pub sigma: f64,
    pub tau: f64,
    pub nu: f64,
}

impl KernelParams {
    pub fn new(sigma: f64, tau: f64, nu: f64) -> Self {
        Self { sigma, tau, nu }
    }
}

/// The result of one likelihood evaluation.
///
/// Only `loglike` enters the posterior; evaluators can report additional
/// diagnostic quantities (chi-square, complexity penalty, ...) in `auxiliary`.
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodOutput {
    pub loglike: f64,
    pub auxiliary: Vec<f64>,
}

impl LikelihoodOutput {
    pub fn new(loglike: f64) -> Self {
        Self {
            loglike,
            auxiliary: Vec::new(),
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EvaluatorError {
    /// The parameters are valid inputs but the evaluator cannot produce a
    /// density for them, e.g. a numerically singular covariance matrix.
    #[error("likelihood evaluator rejected the parameters: {0}")]
    Rejected(String),
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl EvaluatorError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EvaluatorError::Rejected(_))
    }
}

/// A likelihood evaluator bound to one series and one set of parameters.
pub trait LikelihoodEvaluator {
    fn loglike(&mut self) -> Result<LikelihoodOutput, EvaluatorError>;
}

/// Builds a fresh [`LikelihoodEvaluator`] for every density evaluation.
///
/// Implemented for closures with the same signature as [`EvaluatorFactory::create`].
pub trait EvaluatorFactory<S: ?Sized> {
    type Evaluator: LikelihoodEvaluator;

    fn create(
        &self,
        series: &S,
        covariance: CovarianceKind,
        params: KernelParams,
    ) -> Result<Self::Evaluator, EvaluatorError>;
}

impl<S, E, F> EvaluatorFactory<S> for F
where
    S: ?Sized,
    E: LikelihoodEvaluator,
    F: Fn(&S, CovarianceKind, KernelParams) -> Result<E, EvaluatorError>,
{
    type Evaluator = E;

    fn create(
        &self,
        series: &S,
        covariance: CovarianceKind,
        params: KernelParams,
    ) -> Result<E, EvaluatorError> {
        self(series, covariance, params)
    }
}

/// The observed stochastic node of the model.
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodNode {
    covariance: CovarianceKind,
    guess: KernelParams,
}

impl LikelihoodNode {
    pub const NAME: &'static str = "model_powexp";

    pub(crate) fn new(covariance: CovarianceKind, guess: KernelParams) -> Self {
        Self { covariance, guess }
    }

    pub fn covariance(&self) -> CovarianceKind {
        self.covariance
    }

    /// Rough parameter scale derived from the series,
    /// `(range / 4, time_span / 6, 1)`.
    pub fn guess(&self) -> KernelParams {
        self.guess
    }

    /// Log likelihood of the series under `params`.
    pub fn log_density<S, F>(
        &self,
        series: &S,
        factory: &F,
        params: KernelParams,
    ) -> Result<f64, EvaluatorError>
    where
        S: ?Sized,
        F: EvaluatorFactory<S>,
    {
        let mut evaluator = factory.create(series, self.covariance, params)?;
        Ok(evaluator.loglike()?.loglike)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Constant(f64);

    impl LikelihoodEvaluator for Constant {
        fn loglike(&mut self) -> Result<LikelihoodOutput, EvaluatorError> {
            Ok(LikelihoodOutput {
                loglike: self.0,
                auxiliary: vec![1., 2.],
            })
        }
    }

    #[test]
    fn covariance_identifier() {
        assert_eq!(CovarianceKind::PowExp.as_str(), "pow_exp");
        assert_eq!(CovarianceKind::PowExp.to_string(), "pow_exp");
    }

    #[test]
    fn closure_factory() {
        let node = LikelihoodNode::new(CovarianceKind::PowExp, KernelParams::new(1., 2., 1.));
        let factory = |series: &[f64],
                       kind: CovarianceKind,
                       params: KernelParams|
         -> Result<Constant, EvaluatorError> {
            assert_eq!(kind, CovarianceKind::PowExp);
            Ok(Constant(series[0] * params.sigma))
        };
        let value = node
            .log_density(&[3.][..], &factory, KernelParams::new(2., 1., 1.))
            .unwrap();
        assert_eq!(value, 6.);
    }

    #[test]
    fn error_classes() {
        assert!(EvaluatorError::Rejected("singular".into()).is_recoverable());
        assert!(!EvaluatorError::from(anyhow::anyhow!("crashed")).is_recoverable());
    }
}
