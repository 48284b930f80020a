use std::fmt::Debug;

use indexmap::IndexMap;

use crate::{
    candidate::Candidate, utils::enums::ProductionMode, ResolutionError, ResolutionResult,
};

/// The Gaussian-smeared Breit-Wigner model used for hadronic associated production.
pub mod dijet;
/// Serializable physics parameters for resolution models.
pub mod parameters;

pub use dijet::DijetResolutionModel;
use parameters::ResolutionParameters;

/// The capability shared by every resolution model: turning a [`Candidate`] into the density of
/// its observed dijet mass under a resolution-convolved resonance lineshape.
///
/// Implementors may hold arbitrarily expensive precomputed state, but must treat it as immutable
/// once constructed, so that repeated evaluations of the same [`Candidate`] give identical
/// results.
pub trait ResolutionModel: Debug + Send + Sync {
    /// The production mode this model was built for.
    fn production_mode(&self) -> ProductionMode;

    /// Evaluate the convolved lineshape density for the given [`Candidate`].
    ///
    /// # Errors
    ///
    /// Implementations should return [`ResolutionError::MalformedCandidate`] for candidates
    /// lacking the required kinematics and [`ResolutionError::NumericalIntegrationFailure`] when
    /// the convolution does not produce a finite, non-negative density.
    fn evaluate(&self, candidate: &Candidate) -> ResolutionResult<f64>;
}

/// Builds [`ResolutionModel`]s from a production mode and a center-of-mass energy.
///
/// A [`ResolutionRegistry`](crate::registry::ResolutionRegistry) consults
/// [`ModelFactory::supports`] before calling [`ModelFactory::construct`], and calls
/// [`ModelFactory::construct`] at most once per production mode.
pub trait ModelFactory: Send + Sync {
    /// Check if this factory has a construction rule for the given mode.
    fn supports(&self, mode: ProductionMode) -> bool;

    /// Construct the model for `mode` at the center-of-mass energy `reference_energy` (TeV).
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::UnsupportedProductionMode`] for modes which are not
    /// [supported](ModelFactory::supports) and [`ResolutionError::ModelConstructionFailure`] if the
    /// model cannot be built.
    fn construct(
        &self,
        mode: ProductionMode,
        reference_energy: f64,
    ) -> ResolutionResult<Box<dyn ResolutionModel>>;
}

/// The default [`ModelFactory`], which builds a [`DijetResolutionModel`] for every production
/// mode with a [dijet resonance](ProductionMode::dijet_resonance).
///
/// Parameters come from [`ResolutionParameters::builtin`] unless they were overridden for a mode
/// with [`DijetResolutionFactory::with_parameters`].
#[derive(Clone, Debug, Default)]
pub struct DijetResolutionFactory {
    overrides: IndexMap<ProductionMode, ResolutionParameters>,
}

impl DijetResolutionFactory {
    /// Create a factory which only uses built-in parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `parameters` instead of the built-in set whenever a model for `mode` is constructed.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::UnsupportedProductionMode`] if `mode` has no dijet resonance.
    pub fn with_parameters(
        mut self,
        mode: ProductionMode,
        parameters: ResolutionParameters,
    ) -> ResolutionResult<Self> {
        if !self.supports(mode) {
            return Err(ResolutionError::UnsupportedProductionMode { mode });
        }
        self.overrides.insert(mode, parameters);
        Ok(self)
    }

    /// The parameters a model for `mode` would be built with at `reference_energy` (TeV).
    pub fn parameters(
        &self,
        mode: ProductionMode,
        reference_energy: f64,
    ) -> ResolutionResult<ResolutionParameters> {
        match self.overrides.get(&mode) {
            Some(parameters) => Ok(parameters.clone()),
            None => ResolutionParameters::builtin(mode, reference_energy),
        }
    }
}

impl ModelFactory for DijetResolutionFactory {
    fn supports(&self, mode: ProductionMode) -> bool {
        mode.dijet_resonance().is_some()
    }

    fn construct(
        &self,
        mode: ProductionMode,
        reference_energy: f64,
    ) -> ResolutionResult<Box<dyn ResolutionModel>> {
        if !self.supports(mode) {
            return Err(ResolutionError::UnsupportedProductionMode { mode });
        }
        let parameters = self.parameters(mode, reference_energy)?;
        Ok(Box::new(DijetResolutionModel::new(mode, parameters)?))
    }
}
