//! Assembly of the damped power-exponential variability model.
//!
//! [`PowExpModel::build`] turns an observed series and a set of options into
//! a bundle holding one node per kernel parameter and the observed
//! likelihood node. The bundle is handed to a sampler, which evaluates it
//! through [`CpuLogpFunc`](crate::CpuLogpFunc).

use thiserror::Error;
use tracing::{debug, info};

use crate::{
    likelihood::{CovarianceKind, KernelParams, LikelihoodNode},
    logp::GradientOptions,
    prior::{Parameter, Prior, PriorError, PriorHyperparameters, PriorSpec},
    series::ObservedSeries,
    transform::Transform,
};

/// Options for building a [`PowExpModel`].
#[derive(Debug, Clone, Copy)]
pub struct ModelOptions {
    /// Use the custom log-density priors on sigma and tau instead of the
    /// standard distributions.
    pub use_custom_priors: bool,
    pub fixed_sigma: Option<f64>,
    pub fixed_tau: Option<f64>,
    pub fixed_nu: Option<f64>,
    pub hyperparameters: PriorHyperparameters,
    /// Settings for the finite-difference gradient of the log posterior.
    pub gradient: GradientOptions,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            use_custom_priors: false,
            fixed_sigma: None,
            fixed_tau: None,
            fixed_nu: None,
            hyperparameters: PriorHyperparameters::default(),
            gradient: GradientOptions::default(),
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("could not construct the prior on {parameter}")]
    Prior {
        parameter: &'static str,
        #[source]
        source: PriorError,
    },
}

/// A random variable of the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Stochastic {
    name: &'static str,
    prior: Prior,
    initial: f64,
}

impl Stochastic {
    fn new(name: &'static str, prior: Prior, initial: f64) -> Self {
        Self {
            name,
            prior,
            initial,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn prior(&self) -> &Prior {
        &self.prior
    }

    /// Starting value for sampling.
    pub fn initial(&self) -> f64 {
        self.initial
    }

    /// Map from the unconstrained sampling space into the prior's support.
    pub fn transform(&self) -> Transform {
        Transform::for_support(self.prior.support())
    }
}

/// How a kernel parameter enters the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterNode {
    /// A constant supplied by the caller.
    Fixed(f64),
    /// The parameter is itself a random variable.
    Stochastic(Stochastic),
    /// The parameter is `1 / sqrt(x)` of the random variable `x`.
    InverseSqrt(Stochastic),
}

impl ParameterNode {
    pub fn fixed_value(&self) -> Option<f64> {
        match self {
            ParameterNode::Fixed(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, ParameterNode::Fixed(_))
    }

    /// The random variable behind this parameter, if any.
    pub fn free(&self) -> Option<&Stochastic> {
        match self {
            ParameterNode::Fixed(_) => None,
            ParameterNode::Stochastic(var) | ParameterNode::InverseSqrt(var) => Some(var),
        }
    }

    /// The parameter value given the value of its random variable.
    ///
    /// `free_value` is ignored for fixed parameters.
    pub fn value(&self, free_value: f64) -> f64 {
        match self {
            ParameterNode::Fixed(value) => *value,
            ParameterNode::Stochastic(_) => free_value,
            ParameterNode::InverseSqrt(_) => free_value.sqrt().recip(),
        }
    }

    /// The value of the random variable that reproduces `value` of the
    /// parameter.
    pub fn free_value(&self, value: f64) -> Option<f64> {
        match self {
            ParameterNode::Fixed(_) => None,
            ParameterNode::Stochastic(_) => Some(value),
            ParameterNode::InverseSqrt(_) => Some(value.powi(2).recip()),
        }
    }

    /// The parameter value at the starting point of sampling.
    pub fn initial_value(&self) -> f64 {
        match self {
            ParameterNode::Fixed(value) => *value,
            ParameterNode::Stochastic(var) | ParameterNode::InverseSqrt(var) => {
                self.value(var.initial)
            }
        }
    }
}

/// A named entry of a [`PowExpModel`].
#[derive(Debug, Clone, Copy)]
pub enum Entry<'a> {
    Parameter(&'a ParameterNode),
    /// A random variable that only exists to derive a parameter from.
    Auxiliary(&'a Stochastic),
    Likelihood(&'a LikelihoodNode),
}

/// The assembled model: one node per kernel parameter plus the observed
/// likelihood node.
///
/// `S` is the observed series and `F` constructs the external likelihood
/// evaluator (see [`EvaluatorFactory`](crate::EvaluatorFactory)).
#[derive(Debug, Clone)]
pub struct PowExpModel<S, F> {
    pub(crate) series: S,
    pub(crate) factory: F,
    pub(crate) sigma: ParameterNode,
    pub(crate) tau: ParameterNode,
    pub(crate) nu: ParameterNode,
    pub(crate) likelihood: LikelihoodNode,
    pub(crate) gradient: GradientOptions,
}

/// Summaries of the observed series the priors are scaled by.
#[derive(Debug, Clone, Copy)]
struct SeriesScales {
    cadence: f64,
    time_span: f64,
    amplitude: f64,
}

impl SeriesScales {
    fn new<S: ObservedSeries + ?Sized>(series: &S) -> Self {
        Self {
            cadence: series.cadence(),
            time_span: series.time_span(),
            amplitude: series.magnitude_range() / 4.,
        }
    }
}

/// Construct the node for one parameter.
fn parameter_node(
    parameter: Parameter,
    choice: PriorSpec,
    scales: &SeriesScales,
    hyper: &PriorHyperparameters,
) -> Result<ParameterNode, PriorError> {
    let name = parameter.name();
    let node = match (parameter, choice) {
        (_, PriorSpec::Fixed(value)) => {
            info!(parameter = name, "{} is fixed to be {:.3}", name, value);
            ParameterNode::Fixed(value)
        }
        (Parameter::Sigma, PriorSpec::Custom) => {
            ParameterNode::Stochastic(Stochastic::new(name, Prior::Jeffreys, scales.amplitude))
        }
        (Parameter::Sigma, PriorSpec::Standard) => {
            let prior = Prior::gamma(hyper.inv_variance_shape, hyper.inv_variance_rate)?;
            let initial = scales.amplitude.powi(2).recip();
            ParameterNode::InverseSqrt(Stochastic::new("invsigsq", prior, initial))
        }
        (Parameter::Tau, PriorSpec::Custom) => {
            let prior = Prior::DoubleLobedLog {
                cadence: scales.cadence,
                upper: hyper.tau_upper,
            };
            ParameterNode::Stochastic(Stochastic::new(name, prior, hyper.tau_custom_initial))
        }
        (Parameter::Tau, PriorSpec::Standard) => {
            let scale = (scales.time_span * scales.cadence).sqrt();
            let prior = Prior::inverse_gamma(hyper.tau_shape, scale)?;
            ParameterNode::Stochastic(Stochastic::new(name, prior, scales.time_span / 6.))
        }
        // nu has no custom prior.
        (Parameter::Nu, PriorSpec::Custom | PriorSpec::Standard) => {
            let prior = Prior::uniform(hyper.nu_low, hyper.nu_high)?;
            ParameterNode::Stochastic(Stochastic::new(name, prior, hyper.nu_initial))
        }
    };
    Ok(node)
}

impl<S: ObservedSeries, F> PowExpModel<S, F> {
    /// Assemble the model for `series`.
    ///
    /// The series is not validated. Fails only if a standard prior cannot be
    /// constructed from the scales of the series, e.g. a zero time span
    /// makes the Inverse-Gamma scale on tau zero.
    pub fn build(series: S, factory: F, options: &ModelOptions) -> Result<Self, ModelError> {
        let scales = SeriesScales::new(&series);
        let hyper = &options.hyperparameters;

        let node = |parameter: Parameter, fixed: Option<f64>| {
            let choice = PriorSpec::select(fixed, options.use_custom_priors);
            parameter_node(parameter, choice, &scales, hyper).map_err(|source| ModelError::Prior {
                parameter: parameter.name(),
                source,
            })
        };

        let sigma = node(Parameter::Sigma, options.fixed_sigma)?;
        let tau = node(Parameter::Tau, options.fixed_tau)?;
        let nu = node(Parameter::Nu, options.fixed_nu)?;

        let guess = KernelParams::new(scales.amplitude, scales.time_span / 6., 1.);
        let likelihood = LikelihoodNode::new(CovarianceKind::PowExp, guess);

        let model = Self {
            series,
            factory,
            sigma,
            tau,
            nu,
            likelihood,
            gradient: options.gradient,
        };
        debug!(
            cadence = scales.cadence,
            time_span = scales.time_span,
            free = ?model.parameter_names(),
            "assembled pow_exp model"
        );
        Ok(model)
    }
}

impl<S, F> PowExpModel<S, F> {
    pub fn series(&self) -> &S {
        &self.series
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn sigma(&self) -> &ParameterNode {
        &self.sigma
    }

    pub fn tau(&self) -> &ParameterNode {
        &self.tau
    }

    pub fn nu(&self) -> &ParameterNode {
        &self.nu
    }

    pub fn likelihood(&self) -> &LikelihoodNode {
        &self.likelihood
    }

    pub(crate) fn parameters(&self) -> [&ParameterNode; 3] {
        [&self.sigma, &self.tau, &self.nu]
    }

    /// The random variables of the model, in the order of the sampling
    /// coordinates.
    pub fn free_variables(&self) -> impl Iterator<Item = &Stochastic> + '_ {
        self.parameters().into_iter().filter_map(ParameterNode::free)
    }

    /// Names of the sampling coordinates.
    pub fn parameter_names(&self) -> Vec<&'static str> {
        self.free_variables().map(Stochastic::name).collect()
    }

    /// All entry names, as accepted by [`PowExpModel::get`].
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = vec![
            Parameter::Sigma.name(),
            Parameter::Tau.name(),
            Parameter::Nu.name(),
            LikelihoodNode::NAME,
        ];
        if let ParameterNode::InverseSqrt(var) = &self.sigma {
            names.push(var.name());
        }
        names
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<Entry<'_>> {
        match name {
            "sigma" => Some(Entry::Parameter(&self.sigma)),
            "tau" => Some(Entry::Parameter(&self.tau)),
            "nu" => Some(Entry::Parameter(&self.nu)),
            LikelihoodNode::NAME => Some(Entry::Likelihood(&self.likelihood)),
            _ => self
                .parameters()
                .into_iter()
                .find_map(|node| match node {
                    ParameterNode::InverseSqrt(var) if var.name() == name => Some(var),
                    _ => None,
                })
                .map(Entry::Auxiliary),
        }
    }

    /// Parameter values at the starting point of sampling.
    pub fn initial_params(&self) -> KernelParams {
        KernelParams::new(
            self.sigma.initial_value(),
            self.tau.initial_value(),
            self.nu.initial_value(),
        )
    }
}

/// Build the model from explicit flags.
///
/// Shorthand for [`PowExpModel::build`] with default hyperparameters.
pub fn build_model<S: ObservedSeries, F>(
    series: S,
    factory: F,
    use_custom_priors: bool,
    fixed_sigma: Option<f64>,
    fixed_tau: Option<f64>,
    fixed_nu: Option<f64>,
) -> Result<PowExpModel<S, F>, ModelError> {
    let options = ModelOptions {
        use_custom_priors,
        fixed_sigma,
        fixed_tau,
        fixed_nu,
        ..Default::default()
    };
    PowExpModel::build(series, factory, &options)
}
