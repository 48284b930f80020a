use std::{
    fmt::Display,
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{utils::enums::ProductionMode, ResolutionError, ResolutionResult};

fn canonicalize_parameter_path(file_path: &str) -> ResolutionResult<PathBuf> {
    Ok(Path::new(&*shellexpand::full(file_path)?).canonicalize()?)
}

fn expand_output_path(file_path: &str) -> ResolutionResult<PathBuf> {
    Ok(PathBuf::from(&*shellexpand::full(file_path)?))
}

/// The functional form of the true (unsmeared) resonance lineshape.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lineshape {
    /// A Cauchy distribution in the mass. Convolution with a Gaussian kernel has the closed form
    /// of a Voigt profile.
    #[default]
    NonRelativistic,
    /// A Breit-Wigner with the relativistic $`m^2 - m_0^2`$ denominator, convolved numerically.
    Relativistic,
}

impl Display for Lineshape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lineshape::NonRelativistic => write!(f, "Non-relativistic"),
            Lineshape::Relativistic => write!(f, "Relativistic"),
        }
    }
}

impl FromStr for Lineshape {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nonrelativistic" | "non-relativistic" | "non relativistic" | "cauchy" | "nr" => {
                Ok(Self::NonRelativistic)
            }
            "relativistic" | "rel" => Ok(Self::Relativistic),
            _ => Err(ResolutionError::ParseError {
                name: s.to_string(),
                object: "Lineshape".to_string(),
            }),
        }
    }
}

/// Detector resolution and jet response for one collision energy.
struct DetectorTune {
    sqrts: f64,
    noise: f64,
    stochastic: f64,
    constant: f64,
    response: f64,
}

#[rustfmt::skip]
const DETECTOR_TUNES: [DetectorTune; 5] = [
    DetectorTune { sqrts: 7.0,  noise: 4.0, stochastic: 0.95, constant: 0.060, response: 0.97 },
    DetectorTune { sqrts: 8.0,  noise: 4.5, stochastic: 0.97, constant: 0.065, response: 0.97 },
    DetectorTune { sqrts: 13.0, noise: 6.0, stochastic: 1.00, constant: 0.070, response: 0.98 },
    DetectorTune { sqrts: 13.6, noise: 6.5, stochastic: 1.00, constant: 0.070, response: 0.98 },
    DetectorTune { sqrts: 14.0, noise: 7.0, stochastic: 1.02, constant: 0.072, response: 0.98 },
];

/// Center-of-mass energies (TeV) are matched to a built-in tune within this tolerance.
const SQRTS_TOLERANCE: f64 = 1e-6;

/// The physics parameterization of a single resolution model.
///
/// The observed dijet mass $`x`$ is modeled as the true mass $`m`$, drawn from the resonance
/// [`Lineshape`], scaled by the jet `response` $`s`$ and smeared by a Gaussian whose width depends
/// on the observed mass:
/// ```math
/// \sigma(x) = \sqrt{N^2 + S^2 x + C^2 x^2}
/// ```
/// with `noise` $`N`$ (GeV), `stochastic` $`S`$ (GeV$`^{1/2}`$), and dimensionless `constant`
/// $`C`$ terms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolutionParameters {
    /// Pole mass of the resonance (GeV).
    pub mass: f64,
    /// Total width of the resonance (GeV).
    pub width: f64,
    /// The unsmeared lineshape.
    pub lineshape: Lineshape,
    /// Ratio of reconstructed to true dijet mass scale.
    pub response: f64,
    /// Noise term of the resolution (GeV).
    pub noise: f64,
    /// Stochastic term of the resolution (GeV$`^{1/2}`$).
    pub stochastic: f64,
    /// Constant term of the resolution.
    pub constant: f64,
    /// Relative tolerance requested from numerical convolutions.
    pub rel_tolerance: f64,
    /// Maximum number of interval bisections allowed in a numerical convolution.
    pub max_subdivisions: usize,
}

impl ResolutionParameters {
    /// Create a new [`ResolutionParameters`] for a resonance with the given `mass` and `width`,
    /// with unit response and no smearing at all.
    pub fn new(mass: f64, width: f64) -> Self {
        Self {
            mass,
            width,
            lineshape: Lineshape::default(),
            response: 1.0,
            noise: 0.0,
            stochastic: 0.0,
            constant: 0.0,
            rel_tolerance: 1e-9,
            max_subdivisions: 200,
        }
    }

    /// Set the [`Lineshape`].
    pub fn with_lineshape(mut self, lineshape: Lineshape) -> Self {
        self.lineshape = lineshape;
        self
    }

    /// Set the jet response.
    pub fn with_response(mut self, response: f64) -> Self {
        self.response = response;
        self
    }

    /// Set the noise, stochastic, and constant terms of the resolution function.
    pub fn with_resolution(mut self, noise: f64, stochastic: f64, constant: f64) -> Self {
        self.noise = noise;
        self.stochastic = stochastic;
        self.constant = constant;
        self
    }

    /// Set the controls for numerical convolution.
    pub fn with_tolerance(mut self, rel_tolerance: f64, max_subdivisions: usize) -> Self {
        self.rel_tolerance = rel_tolerance;
        self.max_subdivisions = max_subdivisions;
        self
    }

    /// The built-in parameters for a production mode at a center-of-mass energy `sqrts` (TeV).
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::UnsupportedProductionMode`] if the mode has no dijet resonance
    /// and [`ResolutionError::ModelConstructionFailure`] if there is no tune for `sqrts`.
    pub fn builtin(mode: ProductionMode, sqrts: f64) -> ResolutionResult<Self> {
        let resonance = mode
            .dijet_resonance()
            .ok_or(ResolutionError::UnsupportedProductionMode { mode })?;
        let tune = DETECTOR_TUNES
            .iter()
            .find(|tune| (tune.sqrts - sqrts).abs() < SQRTS_TOLERANCE)
            .ok_or_else(|| ResolutionError::ModelConstructionFailure {
                mode,
                reason: format!("no resolution parameters are available for sqrt(s) = {sqrts} TeV"),
            })?;
        Ok(Self::new(resonance.mass(), resonance.width())
            .with_response(tune.response)
            .with_resolution(tune.noise, tune.stochastic, tune.constant))
    }

    /// The standard deviation of the Gaussian kernel at the observed mass `observed_mass`.
    pub fn sigma(&self, observed_mass: f64) -> f64 {
        f64::sqrt(
            self.noise.powi(2)
                + self.stochastic.powi(2) * observed_mass
                + self.constant.powi(2) * observed_mass.powi(2),
        )
    }

    /// Check that these parameters describe a well-defined convolution.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::ModelConstructionFailure`] (attributed to `mode`) describing the
    /// first invalid field.
    pub fn validate(&self, mode: ProductionMode) -> ResolutionResult<()> {
        let fail = |reason: String| Err(ResolutionError::ModelConstructionFailure { mode, reason });
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return fail(format!("mass must be finite and positive, found {}", self.mass));
        }
        if !(self.width.is_finite() && self.width >= 0.0) {
            return fail(format!("width must be finite and non-negative, found {}", self.width));
        }
        if !(self.response.is_finite() && self.response > 0.0) {
            return fail(format!("response must be finite and positive, found {}", self.response));
        }
        for (name, value) in [
            ("noise", self.noise),
            ("stochastic", self.stochastic),
            ("constant", self.constant),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return fail(format!(
                    "{name} resolution term must be finite and non-negative, found {value}"
                ));
            }
        }
        if self.width == 0.0 && self.noise == 0.0 && self.stochastic == 0.0 && self.constant == 0.0
        {
            return fail("width and resolution cannot both vanish".to_string());
        }
        if !(self.rel_tolerance > 0.0 && self.rel_tolerance < 1.0) {
            return fail(format!(
                "relative tolerance must lie in (0, 1), found {}",
                self.rel_tolerance
            ));
        }
        if self.max_subdivisions == 0 {
            return fail("at least one subdivision must be allowed".to_string());
        }
        Ok(())
    }

    /// Save these parameters to a binary file. The path may contain `~` and environment variables.
    pub fn save<T: AsRef<str>>(&self, file_path: T) -> ResolutionResult<()> {
        let path = expand_output_path(file_path.as_ref())?;
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())?;
        Ok(())
    }

    /// Load parameters from a file written by [`ResolutionParameters::save`].
    pub fn load<T: AsRef<str>>(file_path: T) -> ResolutionResult<Self> {
        let path = canonicalize_parameter_path(file_path.as_ref())?;
        let mut reader = BufReader::new(File::open(path)?);
        Ok(bincode::serde::decode_from_std_read(
            &mut reader,
            bincode::config::standard(),
        )?)
    }
}
