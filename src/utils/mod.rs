/// Production modes and verbosity levels.
pub mod enums;
/// Lineshapes, the Faddeeva function, and adaptive quadrature.
pub mod functions;
/// Plain three- and four-vectors (the latter treated as four-momenta).
pub mod vectors;
