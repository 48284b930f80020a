use serde::{Deserialize, Serialize};

use crate::{utils::vectors::Vec4, ResolutionError, ResolutionResult};

/// A reconstructed resonance candidate, reduced to the jets associated with it.
///
/// Resolution models only ever read a [`Candidate`]. The registry forwards it to the model for
/// the requested production mode without looking inside.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Four-momenta of the jets associated with the candidate, in no particular order.
    pub jets: Vec<Vec4>,
}

impl Candidate {
    /// Create a new [`Candidate`] from the four-momenta of its associated jets.
    pub fn new(jets: Vec<Vec4>) -> Self {
        Self { jets }
    }

    /// The two jets with the largest transverse momenta, leading jet first.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::MalformedCandidate`] if fewer than two jets are present.
    pub fn leading_jets(&self) -> ResolutionResult<(Vec4, Vec4)> {
        let mut leading: Option<Vec4> = None;
        let mut subleading: Option<Vec4> = None;
        for jet in &self.jets {
            match leading {
                Some(lead) if jet.pt() <= lead.pt() => {
                    if subleading.map_or(true, |sub| jet.pt() > sub.pt()) {
                        subleading = Some(*jet);
                    }
                }
                _ => {
                    subleading = leading;
                    leading = Some(*jet);
                }
            }
        }
        match (leading, subleading) {
            (Some(lead), Some(sub)) => Ok((lead, sub)),
            _ => Err(ResolutionError::MalformedCandidate {
                reason: format!(
                    "a dijet system needs at least two associated jets, found {}",
                    self.jets.len()
                ),
            }),
        }
    }

    /// The four-momentum of the dijet system built from the two leading jets.
    pub fn dijet(&self) -> ResolutionResult<Vec4> {
        let (lead, sub) = self.leading_jets()?;
        Ok(Vec4::sum([&lead, &sub]))
    }

    /// The invariant mass of the dijet system built from the two leading jets.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::MalformedCandidate`] if fewer than two jets are present or if the
    /// mass is not a finite, positive number.
    pub fn dijet_mass(&self) -> ResolutionResult<f64> {
        let mass = self.dijet()?.m();
        if mass.is_finite() && mass > 0.0 {
            Ok(mass)
        } else {
            Err(ResolutionError::MalformedCandidate {
                reason: format!("dijet invariant mass must be finite and positive, found {mass}"),
            })
        }
    }
}
