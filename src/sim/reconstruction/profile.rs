use serde::{Deserialize, Serialize};

use crate::vecutils::{argmax, max, trapezoid};

/// How the `normalised` column of a profile is derived from `corrected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProfileNormalisation {
    /// Copy of `corrected`.
    None,
    /// Divided by the maximum.
    #[default]
    Peak,
    /// Divided by the trapezoidal integral over depth (units of 1/mm).
    Integral,
}

/// One reconstruction grid depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    /// Depth in mm.
    pub depth: f64,
    /// Back-projected weight `W(z)`.
    pub raw: f64,
    /// `W(z) * S(z)`, or `W(z)` when sensitivity correction is off.
    pub corrected: f64,
    pub normalised: f64,
}

/// Reconstructed emission profile along the beam axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructedProfile {
    pub normalisation: ProfileNormalisation,
    rows: Vec<ProfileRow>,
}

impl ReconstructedProfile {
    /// Assembles rows from per-depth columns. All slices must have equal length.
    pub fn new(
        depths: &[f64],
        raw: &[f64],
        corrected: &[f64],
        normalisation: ProfileNormalisation,
    ) -> Self {
        assert!(
            depths.len() == raw.len() && depths.len() == corrected.len(),
            "profile columns differ in length"
        );
        let normalised = normalise(depths, corrected, normalisation);
        let rows = depths
            .iter()
            .zip(raw)
            .zip(corrected)
            .zip(normalised)
            .map(|(((&depth, &raw), &corrected), normalised)| ProfileRow {
                depth,
                raw,
                corrected,
                normalised,
            })
            .collect();
        Self {
            normalisation,
            rows,
        }
    }

    /// Same raw data with a different `normalised` column.
    pub fn renormalised(&self, normalisation: ProfileNormalisation) -> Self {
        Self::new(&self.depths(), &self.raw(), &self.corrected(), normalisation)
    }

    pub fn rows(&self) -> &[ProfileRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn depths(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.depth).collect()
    }

    pub fn raw(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.raw).collect()
    }

    pub fn corrected(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.corrected).collect()
    }

    pub fn normalised(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.normalised).collect()
    }

    /// Depth of the first maximum of the corrected profile.
    ///
    /// `None` when the profile is empty or identically zero.
    pub fn peak_depth(&self) -> Option<f64> {
        let corrected = self.corrected();
        if max(&corrected) <= 0.0 {
            return None;
        }
        argmax(&corrected).map(|i| self.rows[i].depth)
    }

    /// Absolute distance in mm between the reconstructed and `expected` peak depth.
    pub fn peak_error(&self, expected: f64) -> Option<f64> {
        self.peak_depth().map(|z| (z - expected).abs())
    }
}

fn normalise(depths: &[f64], values: &[f64], mode: ProfileNormalisation) -> Vec<f64> {
    let scale = match mode {
        ProfileNormalisation::None => 1.0,
        ProfileNormalisation::Peak => max(values),
        ProfileNormalisation::Integral => trapezoid(depths, values),
    };
    if scale > 0.0 && scale.is_finite() {
        values.iter().map(|v| v / scale).collect()
    } else {
        values.to_vec()
    }
}
