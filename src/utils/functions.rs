use std::f64::consts::{FRAC_2_SQRT_PI, PI};

use accurate::{sum::Klein, traits::*};
use num::complex::Complex64;

use crate::{ResolutionError, ResolutionResult};

/// $`\sqrt{2\pi}`$
const SQRT_2PI: f64 = 2.506628274631000502415765284811045253;

/// A unit-normalized Gaussian evaluated at a distance `delta` from its mean:
/// ```math
/// G(\delta; \sigma) = \frac{1}{\sigma\sqrt{2\pi}} e^{-\delta^2 / 2\sigma^2}
/// ```
pub fn gaussian(delta: f64, sigma: f64) -> f64 {
    f64::exp(-0.5 * (delta / sigma).powi(2)) / (sigma * SQRT_2PI)
}

/// A non-relativistic Breit-Wigner (Cauchy) density in the mass `m`:
/// ```math
/// BW(m; m_0, \Gamma) = \frac{1}{\pi}\frac{\Gamma/2}{(m - m_0)^2 + (\Gamma/2)^2}
/// ```
pub fn breit_wigner(m: f64, mass: f64, width: f64) -> f64 {
    let gamma = 0.5 * width;
    gamma / (PI * ((m - mass).powi(2) + gamma.powi(2)))
}

/// A relativistic Breit-Wigner density in the mass `m`, normalized to unity over $`m \geq 0`$:
/// ```math
/// BW(m; m_0, \Gamma) = \frac{1}{N}\frac{2m}{\pi}\frac{m_0 \Gamma}{(m^2 - m_0^2)^2 + m_0^2\Gamma^2}
/// ```
/// where $`N = \frac{1}{2} + \frac{1}{\pi}\arctan(m_0/\Gamma)`$. Negative masses have zero density.
pub fn relativistic_breit_wigner(m: f64, mass: f64, width: f64) -> f64 {
    if m < 0.0 {
        return 0.0;
    }
    let norm = 0.5 + f64::atan(mass / width) / PI;
    let mg = mass * width;
    (2.0 * m / PI) * mg / ((m.powi(2) - mass.powi(2)).powi(2) + mg.powi(2)) / norm
}

/// The Faddeeva function $`w(z) = e^{-z^2}\mathrm{erfc}(-\imath z)`$ for $`\Im(z) \geq 0`$.
///
/// This uses W. Gautschi's method (CACM Algorithm 363): a truncated Taylor expansion about a
/// shifted point inside the rectangle $`|\Re(z)| < 5.33`$, $`\Im(z) < 1.5`$, and the Laplace
/// continued fraction outside of it. Relative accuracy is around ten significant digits.
pub fn faddeeva(z: Complex64) -> Complex64 {
    let x = z.re.abs();
    let y = z.im;
    let (h, capn, nu) = if y < 1.5 && x < 5.33 {
        let s = (1.0 - y / 4.29) * f64::sqrt(1.0 - x * x / 28.5);
        (1.6 * s, (6.0 + 23.0 * s) as i32, (9.0 + 21.0 * s) as i32)
    } else {
        (0.0, 0, 8)
    };
    let h2 = 2.0 * h;
    let mut lambda = if h > 0.0 { h2.powi(capn) } else { 0.0 };
    let taylor = h > 0.0 && lambda > 0.0;
    let (mut r1, mut r2) = (0.0, 0.0);
    let (mut s1, mut s2) = (0.0, 0.0);
    for n in (0..=nu).rev() {
        let np1 = f64::from(n + 1);
        let t1 = y + h + np1 * r1;
        let t2 = x - np1 * r2;
        let c = 0.5 / (t1 * t1 + t2 * t2);
        r1 = c * t1;
        r2 = c * t2;
        if taylor && n <= capn {
            let t = lambda + s1;
            s1 = r1 * t - r2 * s2;
            s2 = r2 * t + r1 * s2;
            lambda /= h2;
        }
    }
    let (re, im) = if taylor { (s1, s2) } else { (r1, r2) };
    let re = if y == 0.0 {
        f64::exp(-x * x)
    } else {
        FRAC_2_SQRT_PI * re
    };
    let im = FRAC_2_SQRT_PI * im;
    // w(-x + iy) is the complex conjugate of w(x + iy)
    Complex64::new(re, if z.re < 0.0 { -im } else { im })
}

/// The Voigt profile, a Cauchy distribution with half-width `gamma` convolved with a Gaussian
/// of standard deviation `sigma`, evaluated a distance `delta` from the common center:
/// ```math
/// V(\delta; \sigma, \gamma) = \frac{\Re\left[w\left(\frac{\delta + \imath\gamma}{\sigma\sqrt{2}}\right)\right]}{\sigma\sqrt{2\pi}}
/// ```
/// Both `sigma` and `gamma` must be strictly positive.
///
/// The error of [`faddeeva`] scales with $`|w(z)|`$ rather than with its real part, so for
/// $`\gamma/\sigma \lesssim 10^{-6}`$ the profile loses relative accuracy beyond about $`6\sigma`$,
/// where the real part is many orders of magnitude below the imaginary part.
pub fn voigt(delta: f64, sigma: f64, gamma: f64) -> f64 {
    let z = Complex64::new(delta, gamma) / (sigma * std::f64::consts::SQRT_2);
    faddeeva(z).re / (sigma * SQRT_2PI)
}

/// Abscissae of the 15-point Kronrod rule (the odd entries together with the center are the
/// 7-point Gauss abscissae).
const XGK: [f64; 8] = [
    0.991455371120812639206854697526329,
    0.949107912342758524526189684047851,
    0.864864423359769072789712788640926,
    0.741531185599394439863864773280788,
    0.586087235467691130294144845693013,
    0.405845151377397166906606412076961,
    0.207784955007898467600689403773245,
    0.000000000000000000000000000000000,
];
const WGK: [f64; 8] = [
    0.022935322010529224963732008058970,
    0.063092092629978553290700663189204,
    0.104790010322250183839876322541518,
    0.140653259715525918745189590510238,
    0.169004726639267902826583426598550,
    0.190350578064785409913256402421014,
    0.204432940075298892414161999234649,
    0.209482141084727828012999174891714,
];
const WG: [f64; 4] = [
    0.129484966168869693270611432679082,
    0.279705391489276667901467771423780,
    0.381830050505118944950369775488975,
    0.417959183673469387755102040816327,
];

#[derive(Clone, Copy, Debug)]
struct Panel {
    a: f64,
    b: f64,
    value: f64,
    error: f64,
}

impl Panel {
    fn new<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> Self {
        let center = 0.5 * (a + b);
        let half = 0.5 * (b - a);
        let f_center = f(center);
        let mut kronrod = WGK[7] * f_center;
        let mut gauss = WG[3] * f_center;
        for j in 0..7 {
            let dx = half * XGK[j];
            let f_sum = f(center - dx) + f(center + dx);
            kronrod += WGK[j] * f_sum;
            if j % 2 == 1 {
                gauss += WG[j / 2] * f_sum;
            }
        }
        Self {
            a,
            b,
            value: kronrod * half,
            error: ((kronrod - gauss) * half).abs(),
        }
    }
}

/// Integrate `f` over the interval spanned by `points` with globally adaptive 7/15-point
/// Gauss-Kronrod quadrature.
///
/// `points` must be sorted. Every interior point is used as an initial panel boundary, so peaks
/// and kinks of the integrand should be listed there. The panel with the largest error estimate
/// is bisected until the summed error estimate drops below `rel_tolerance` times the magnitude of
/// the summed value.
///
/// # Errors
///
/// Returns [`ResolutionError::NumericalIntegrationFailure`] if the tolerance is not reached
/// within `max_subdivisions` bisections or if the integrand produces a non-finite value.
pub fn integrate<F: Fn(f64) -> f64>(
    f: F,
    points: &[f64],
    rel_tolerance: f64,
    max_subdivisions: usize,
) -> ResolutionResult<f64> {
    let mut panels: Vec<Panel> = points
        .windows(2)
        .filter(|w| w[1] > w[0])
        .map(|w| Panel::new(&f, w[0], w[1]))
        .collect();
    let mut subdivisions = 0;
    loop {
        let value = panels
            .iter()
            .map(|p| p.value)
            .sum_with_accumulator::<Klein<f64>>();
        let error = panels
            .iter()
            .map(|p| p.error)
            .sum_with_accumulator::<Klein<f64>>();
        if !value.is_finite() || !error.is_finite() {
            return Err(ResolutionError::NumericalIntegrationFailure {
                reason: format!("integrand is not finite (value = {value}, error = {error})"),
            });
        }
        if error <= rel_tolerance * value.abs() {
            return Ok(value);
        }
        if subdivisions == max_subdivisions {
            return Err(ResolutionError::NumericalIntegrationFailure {
                reason: format!(
                    "no convergence after {subdivisions} subdivisions (value = {value}, estimated error = {error}, requested relative tolerance = {rel_tolerance})"
                ),
            });
        }
        let (worst, _) = panels
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(i_max, e_max), (i, p)| {
                if p.error > e_max {
                    (i, p.error)
                } else {
                    (i_max, e_max)
                }
            });
        let panel = panels.swap_remove(worst);
        let mid = 0.5 * (panel.a + panel.b);
        panels.push(Panel::new(&f, panel.a, mid));
        panels.push(Panel::new(&f, mid, panel.b));
        subdivisions += 1;
    }
}
