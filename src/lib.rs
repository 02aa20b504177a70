//! Bayesian model of quasar-like variability: a damped power-exponential
//! Gaussian process fitted to irregularly sampled light curves.
//!
//! The crate assembles the priors on the kernel parameters `(sigma, tau, nu)`
//! and the observed likelihood node, and exposes the resulting log posterior
//! to a sampler through [`CpuLogpFunc`]. Evaluating the Gaussian-process
//! likelihood itself is left to an external [`LikelihoodEvaluator`].
//!
//! ```no_run
//! use powexp_model::{
//!     build_model, CovarianceKind, CpuLogpFunc, EvaluatorError, EvaluatorFactory, KernelParams,
//!     LightCurve, LikelihoodEvaluator, LikelihoodOutput,
//! };
//!
//! struct Evaluator(KernelParams);
//!
//! struct Factory;
//!
//! impl EvaluatorFactory<LightCurve> for Factory {
//!     type Evaluator = Evaluator;
//!
//!     fn create(
//!         &self,
//!         _series: &LightCurve,
//!         _covariance: CovarianceKind,
//!         params: KernelParams,
//!     ) -> Result<Evaluator, EvaluatorError> {
//!         Ok(Evaluator(params))
//!     }
//! }
//!
//! impl LikelihoodEvaluator for Evaluator {
//!     fn loglike(&mut self) -> Result<LikelihoodOutput, EvaluatorError> {
//!         // Solve the covariance system of the light curve here.
//!         Ok(LikelihoodOutput::new(-0.5 * self.0.sigma.powi(2)))
//!     }
//! }
//!
//! let curve = LightCurve::new(
//!     vec![0., 1., 2.5, 4.],
//!     vec![18.1, 18.4, 17.9, 18.0],
//!     vec![0.02; 4],
//! )?;
//! let mut model = build_model(curve, Factory, false, None, None, Some(1.))?;
//!
//! let mut position = vec![0.; model.dim()];
//! let mut gradient = vec![0.; model.dim()];
//! model.init_position(&mut rand::rng(), &mut position, 0.5)?;
//! let logp = model.logp(&position, &mut gradient)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub(crate) mod likelihood;
pub(crate) mod logp;
pub(crate) mod math;
pub(crate) mod model;
pub(crate) mod prior;
pub(crate) mod series;
pub(crate) mod transform;

pub use likelihood::{
    CovarianceKind, EvaluatorError, EvaluatorFactory, KernelParams, LikelihoodEvaluator,
    LikelihoodNode, LikelihoodOutput,
};
pub use logp::{CpuLogpFunc, GradientOptions, LogpError, LogpFailure};
pub use model::{
    build_model, Entry, ModelError, ModelOptions, ParameterNode, PowExpModel, Stochastic,
};
pub use prior::{
    double_lobed_logp, jeffreys_logp, Parameter, Prior, PriorError, PriorHyperparameters, PriorSpec,
};
pub use series::{LightCurve, ObservedSeries, SeriesError};
pub use transform::{Support, Transform};
