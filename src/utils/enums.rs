use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ResolutionError;

/// The mechanism by which a resonance candidate is produced.
///
/// This is a closed set. Only the modes for which [`ProductionMode::dijet_resonance`] returns
/// [`Some`] describe a resonance which decays into two jets, so only those have a resolution
/// model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductionMode {
    /// Gluon fusion into a diboson final state.
    ZZGG,
    /// Quark-antiquark annihilation into a diboson final state.
    ZZQQB,
    /// Production-independent decay-only hypothesis.
    ZZINDEPENDENT,
    /// Resonance produced in association with two QCD jets.
    JJQCD,
    /// Vector-boson fusion with two forward jets.
    JJVBF,
    /// Electroweak production with two jets (VBF and hadronic VH together).
    JJEW,
    /// Associated production with a Z boson decaying hadronically.
    HadZH,
    /// Associated production with a W boson decaying hadronically.
    HadWH,
    /// Associated production with a Z boson decaying leptonically.
    LepZH,
    /// Associated production with a W boson decaying leptonically.
    LepWH,
    /// Associated production with a top-quark pair.
    TTH,
    /// Associated production with a bottom-quark pair.
    BBH,
}

impl ProductionMode {
    /// Every production mode, in declaration order.
    pub const ALL: [ProductionMode; 12] = [
        Self::ZZGG,
        Self::ZZQQB,
        Self::ZZINDEPENDENT,
        Self::JJQCD,
        Self::JJVBF,
        Self::JJEW,
        Self::HadZH,
        Self::HadWH,
        Self::LepZH,
        Self::LepWH,
        Self::TTH,
        Self::BBH,
    ];

    /// The vector boson which decays into the two associated jets, if this mode has one.
    pub fn dijet_resonance(&self) -> Option<DijetResonance> {
        match self {
            Self::HadZH => Some(DijetResonance::Z),
            Self::HadWH => Some(DijetResonance::W),
            _ => None,
        }
    }
}

impl Display for ProductionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductionMode::ZZGG => write!(f, "ZZGG"),
            ProductionMode::ZZQQB => write!(f, "ZZQQB"),
            ProductionMode::ZZINDEPENDENT => write!(f, "ZZINDEPENDENT"),
            ProductionMode::JJQCD => write!(f, "JJQCD"),
            ProductionMode::JJVBF => write!(f, "JJVBF"),
            ProductionMode::JJEW => write!(f, "JJEW"),
            ProductionMode::HadZH => write!(f, "Had_ZH"),
            ProductionMode::HadWH => write!(f, "Had_WH"),
            ProductionMode::LepZH => write!(f, "Lep_ZH"),
            ProductionMode::LepWH => write!(f, "Lep_WH"),
            ProductionMode::TTH => write!(f, "ttH"),
            ProductionMode::BBH => write!(f, "bbH"),
        }
    }
}

impl FromStr for ProductionMode {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(&['_', '-', ' '][..], "").as_str() {
            "zzgg" | "gg" | "ggh" => Ok(Self::ZZGG),
            "zzqqb" | "qqb" => Ok(Self::ZZQQB),
            "zzindependent" | "independent" => Ok(Self::ZZINDEPENDENT),
            "jjqcd" => Ok(Self::JJQCD),
            "jjvbf" | "vbf" => Ok(Self::JJVBF),
            "jjew" | "ew" => Ok(Self::JJEW),
            "hadzh" | "zhhad" => Ok(Self::HadZH),
            "hadwh" | "whhad" => Ok(Self::HadWH),
            "lepzh" | "zhlep" => Ok(Self::LepZH),
            "lepwh" | "whlep" => Ok(Self::LepWH),
            "tth" => Ok(Self::TTH),
            "bbh" => Ok(Self::BBH),
            _ => Err(ResolutionError::ParseError {
                name: s.to_string(),
                object: "ProductionMode".to_string(),
            }),
        }
    }
}

/// A vector boson reconstructed from a pair of jets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DijetResonance {
    /// The neutral weak boson.
    Z,
    /// The charged weak boson.
    W,
}

impl DijetResonance {
    /// Pole mass in GeV.
    pub fn mass(&self) -> f64 {
        match self {
            Self::Z => 91.1876,
            Self::W => 80.399,
        }
    }
    /// Total width in GeV.
    pub fn width(&self) -> f64 {
        match self {
            Self::Z => 2.4952,
            Self::W => 2.085,
        }
    }
}

impl Display for DijetResonance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DijetResonance::Z => write!(f, "Z"),
            DijetResonance::W => write!(f, "W"),
        }
    }
}

/// How much diagnostic output accompanies registry operations.
///
/// Levels are ordered, so `Verbosity::Debug` also permits everything `Verbosity::Info` does. The
/// level never changes a computed value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Verbosity {
    /// No output at all.
    Silent,
    /// Only errors.
    #[default]
    Error,
    /// Errors and informational messages (model construction, for instance).
    Info,
    /// Everything above plus per-call diagnostics.
    Debug,
    /// Everything, including intermediate quantities of each evaluation.
    DebugVerbose,
}

impl Verbosity {
    /// The most detailed [`log::Level`] this verbosity lets through, or [`None`] if it is
    /// [`Verbosity::Silent`].
    pub fn max_level(&self) -> Option<log::Level> {
        match self {
            Self::Silent => None,
            Self::Error => Some(log::Level::Error),
            Self::Info => Some(log::Level::Info),
            Self::Debug => Some(log::Level::Debug),
            Self::DebugVerbose => Some(log::Level::Trace),
        }
    }

    /// Check if a record at the given level should be emitted.
    pub fn permits(&self, level: log::Level) -> bool {
        self.max_level().is_some_and(|max| level <= max)
    }
}

impl Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verbosity::Silent => write!(f, "Silent"),
            Verbosity::Error => write!(f, "Error"),
            Verbosity::Info => write!(f, "Info"),
            Verbosity::Debug => write!(f, "Debug"),
            Verbosity::DebugVerbose => write!(f, "Debug (verbose)"),
        }
    }
}

impl FromStr for Verbosity {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "quiet" | "off" => Ok(Self::Silent),
            "error" | "err" => Ok(Self::Error),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "debugverbose" | "debug_verbose" | "debug (verbose)" | "verbose" | "trace" => {
                Ok(Self::DebugVerbose)
            }
            _ => Err(ResolutionError::ParseError {
                name: s.to_string(),
                object: "Verbosity".to_string(),
            }),
        }
    }
}
