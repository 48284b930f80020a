//! # dijet-resolution
//!
//! Resolution-convolved lineshapes for dijet resonance candidates.
//!
//! The true invariant-mass propagator of a resonance decaying to two jets is a Breit-Wigner, but
//! what a detector records is that propagator smeared by the jet energy resolution. This crate
//! provides a [`ResolutionRegistry`] which owns one
//! [`ResolutionModel`](resolution::ResolutionModel) per [`ProductionMode`], builds each model
//! lazily the first time it is needed, and evaluates the convolved density for a [`Candidate`].
//!
//! ```
//! use dijet_resolution::{Candidate, ProductionMode, ResolutionRegistry, Vec3, Verbosity};
//!
//! let mut registry = ResolutionRegistry::new(13.0, Verbosity::Silent);
//! let candidate = Candidate::new(vec![
//!     Vec3::new(45.0, 10.0, 30.0).with_mass(5.0),
//!     Vec3::new(-40.0, -12.0, 15.0).with_mass(5.0),
//! ]);
//! let density = registry
//!     .get_convolved_value(ProductionMode::HadZH, &candidate)
//!     .unwrap();
//! assert!(density.is_finite() && density >= 0.0);
//! ```
#![warn(clippy::perf, clippy::style)]
// #![warn(missing_docs)]
#![allow(clippy::excessive_precision)]

use thiserror::Error;

/// Kinematic candidates which are passed (unchanged) to resolution models.
pub mod candidate;
/// The per-production-mode model cache and its thread-safe handle.
pub mod registry;
/// Resolution models, their factories, and their parameterizations.
pub mod resolution;
/// Utility functions, enums, and vectors
pub mod utils;

pub use crate::candidate::Candidate;
pub use crate::registry::{ResolutionRegistry, SharedResolutionRegistry};
pub use crate::resolution::{
    parameters::{Lineshape, ResolutionParameters},
    DijetResolutionFactory, DijetResolutionModel, ModelFactory, ResolutionModel,
};
pub use crate::utils::enums::{ProductionMode, Verbosity};
pub use crate::utils::vectors::{Vec3, Vec4};

/// Useful traits for all crate structs
pub mod traits {
    pub use crate::resolution::{ModelFactory, ResolutionModel};
}

/// Shorthand for a [`Result`] carrying a [`ResolutionError`].
pub type ResolutionResult<T> = Result<T, ResolutionError>;

/// The error type used by all `dijet-resolution` methods
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// An alias for [`std::io::Error`].
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
    /// An alias for [`shellexpand::LookupError`].
    #[error("Failed to expand path: {0}")]
    LookupError(#[from] shellexpand::LookupError<std::env::VarError>),
    /// An error returned by the binary encoder
    #[error("Encoder error: {0}")]
    EncodeError(#[from] bincode::error::EncodeError),
    /// An error returned by the binary decoder
    #[error("Decoder error: {0}")]
    DecodeError(#[from] bincode::error::DecodeError),
    /// An error which occurs when a [`ProductionMode`] has no rule for building a resolution
    /// model.
    #[error("No resolution model can be constructed for production mode \"{mode}\"!")]
    UnsupportedProductionMode {
        /// The requested production mode
        mode: ProductionMode,
    },
    /// An error which occurs when a resolution model for a supported [`ProductionMode`] could
    /// not be built, typically because its parameters are missing or invalid.
    #[error("Failed to construct resolution model for production mode \"{mode}\": {reason}")]
    ModelConstructionFailure {
        /// The production mode being constructed
        mode: ProductionMode,
        /// A description of what went wrong
        reason: String,
    },
    /// An error which occurs when a convolution integral does not converge or produces a value
    /// which is not a valid density.
    #[error("Numerical integration failed: {reason}")]
    NumericalIntegrationFailure {
        /// A description of what went wrong
        reason: String,
    },
    /// An error which occurs when a [`Candidate`] does not carry the kinematics a model needs.
    #[error("Malformed candidate: {reason}")]
    MalformedCandidate {
        /// A description of what is missing or invalid
        reason: String,
    },
    /// An error which occurs when the user tries to parse an invalid string of text, typically
    /// into an enum variant.
    #[error("Failed to parse string: \"{name}\" does not correspond to a valid \"{object}\"!")]
    ParseError {
        /// The string which was parsed
        name: String,
        /// The name of the object it failed to parse into
        object: String,
    },
}
