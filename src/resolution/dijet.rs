use serde::{Deserialize, Serialize};

use crate::{
    candidate::Candidate,
    resolution::{
        parameters::{Lineshape, ResolutionParameters},
        ResolutionModel,
    },
    utils::{
        enums::ProductionMode,
        functions::{breit_wigner, gaussian, integrate, relativistic_breit_wigner, voigt},
    },
    ResolutionError, ResolutionResult,
};

/// When one of the two widths is smaller than the other by this factor, the convolution is
/// replaced by the wider distribution alone. Below roughly this ratio the real part of the
/// Faddeeva function in the far Gaussian tail is no longer resolved to full relative precision.
const DEGENERATE_RATIO: f64 = 1e-6;

/// Half-width of the numerical convolution window, in units of the kernel width.
const KERNEL_RANGE: f64 = 10.0;

/// A Breit-Wigner [`Lineshape`] convolved with a Gaussian resolution kernel whose width depends
/// on the observed mass:
/// ```math
/// f(x) = \int BW(m; m_0, \Gamma)\, G\left(x - s m; \sigma(x)\right) \mathrm{d}m
/// ```
/// where $`x`$ is the observed dijet mass, $`s`$ is the jet response, and $`\sigma(x)`$ is given by
/// [`ResolutionParameters::sigma`].
///
/// For a [`Lineshape::NonRelativistic`] resonance this is the Voigt profile
/// $`V(x - s m_0; \sigma(x), s\Gamma/2)`$. For a [`Lineshape::Relativistic`] resonance the integral
/// is evaluated with adaptive quadrature over $`\pm 10\sigma`$ around $`x / s`$.
///
/// If the resolution is negligible compared to the (scaled) width, the result is the bare
/// lineshape at $`x / s`$; if the width is negligible compared to the resolution, it is the bare
/// kernel centered at $`s m_0`$.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DijetResolutionModel {
    mode: ProductionMode,
    parameters: ResolutionParameters,
}

impl DijetResolutionModel {
    /// Construct a [`DijetResolutionModel`] for `mode` with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::ModelConstructionFailure`] if the parameters do not pass
    /// [`ResolutionParameters::validate`].
    pub fn new(mode: ProductionMode, parameters: ResolutionParameters) -> ResolutionResult<Self> {
        parameters.validate(mode)?;
        Ok(Self { mode, parameters })
    }

    /// The parameters this model was built with.
    pub fn parameters(&self) -> &ResolutionParameters {
        &self.parameters
    }

    /// The unsmeared lineshape at the true mass `m`.
    pub fn bare_lineshape(&self, m: f64) -> f64 {
        match self.parameters.lineshape {
            Lineshape::NonRelativistic => {
                breit_wigner(m, self.parameters.mass, self.parameters.width)
            }
            Lineshape::Relativistic => {
                relativistic_breit_wigner(m, self.parameters.mass, self.parameters.width)
            }
        }
    }

    /// The convolved density at the observed mass `observed_mass`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::NumericalIntegrationFailure`] if a numerical convolution does
    /// not converge or if the result is not a finite, non-negative number.
    pub fn density(&self, observed_mass: f64) -> ResolutionResult<f64> {
        let p = &self.parameters;
        let sigma = p.sigma(observed_mass);
        let width = p.response * p.width;
        let value = if sigma <= DEGENERATE_RATIO * width {
            self.bare_lineshape(observed_mass / p.response) / p.response
        } else if width <= DEGENERATE_RATIO * sigma {
            gaussian(observed_mass - p.response * p.mass, sigma)
        } else {
            match p.lineshape {
                Lineshape::NonRelativistic => {
                    voigt(observed_mass - p.response * p.mass, sigma, 0.5 * width)
                }
                Lineshape::Relativistic => self.convolve_numerically(observed_mass, sigma)?,
            }
        };
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(ResolutionError::NumericalIntegrationFailure {
                reason: format!(
                    "convolved density at m = {observed_mass} GeV is not a valid density ({value})"
                ),
            })
        }
    }

    /// Integrate the bare lineshape against the kernel over the region where the kernel is
    /// non-negligible, splitting at the resonance pole and at the kernel center.
    pub(crate) fn convolve_numerically(
        &self,
        observed_mass: f64,
        sigma: f64,
    ) -> ResolutionResult<f64> {
        let p = &self.parameters;
        let s = p.response;
        let center = observed_mass / s;
        let lower = ((observed_mass - KERNEL_RANGE * sigma) / s).max(0.0);
        let upper = (observed_mass + KERNEL_RANGE * sigma) / s;
        let mut points = vec![lower, upper];
        points.extend(
            [p.mass, center]
                .into_iter()
                .filter(|&point| point > lower && point < upper),
        );
        points.sort_by(f64::total_cmp);
        points.dedup();
        integrate(
            |m| self.bare_lineshape(m) * gaussian(observed_mass - s * m, sigma),
            &points,
            p.rel_tolerance,
            p.max_subdivisions,
        )
    }
}

impl ResolutionModel for DijetResolutionModel {
    fn production_mode(&self) -> ProductionMode {
        self.mode
    }

    fn evaluate(&self, candidate: &Candidate) -> ResolutionResult<f64> {
        self.density(candidate.dijet_mass()?)
    }
}
