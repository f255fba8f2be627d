use serde::{Deserialize, Serialize};

use crate::error::{PgResult, ensure_config};

/// Shape of the dose curve past the Bragg peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FalloffShape {
    /// `D0 + A * exp(-(z - z_peak) / lambda)`: the peak term decays, the
    /// entrance plateau persists.
    #[default]
    Additive,
    /// `(D0 + A * gauss(z)) * exp(-(z - z_peak) / lambda)`: the whole curve
    /// decays to zero beyond the range.
    Scaled,
}

/// Analytic reference depth-dose curve: entrance plateau, Gaussian peak and
/// exponential distal falloff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoseProfile {
    /// Entrance plateau level `D0`.
    pub entrance_dose: f64,
    /// Peak amplitude `A` above the plateau.
    pub peak_amplitude: f64,
    /// Bragg peak depth in mm.
    pub peak_depth: f64,
    /// Gaussian width of the proximal peak edge in mm.
    pub peak_width: f64,
    /// Distal falloff length in mm.
    pub falloff_length: f64,
    pub falloff: FalloffShape,
}

impl DoseProfile {
    pub fn new(
        entrance_dose: f64,
        peak_amplitude: f64,
        peak_depth: f64,
        peak_width: f64,
        falloff_length: f64,
        falloff: FalloffShape,
    ) -> PgResult<Self> {
        ensure_config!(
            entrance_dose >= 0.0,
            "entrance dose must be non-negative, got {entrance_dose}"
        );
        ensure_config!(
            peak_amplitude >= 0.0,
            "peak amplitude must be non-negative, got {peak_amplitude}"
        );
        ensure_config!(peak_depth.is_finite(), "peak depth must be finite");
        ensure_config!(peak_width > 0.0, "peak width must be positive, got {peak_width}");
        ensure_config!(
            falloff_length > 0.0,
            "falloff length must be positive, got {falloff_length}"
        );
        Ok(Self {
            entrance_dose,
            peak_amplitude,
            peak_depth,
            peak_width,
            falloff_length,
            falloff,
        })
    }

    /// Relative dose at depth `z` mm.
    pub fn dose_at(&self, z: f64) -> f64 {
        let dz = z - self.peak_depth;
        let gauss = (-dz * dz / (2.0 * self.peak_width * self.peak_width)).exp();
        if z <= self.peak_depth {
            return self.entrance_dose + self.peak_amplitude * gauss;
        }
        let decay = (-dz / self.falloff_length).exp();
        match self.falloff {
            FalloffShape::Additive => self.entrance_dose + self.peak_amplitude * decay,
            FalloffShape::Scaled => (self.entrance_dose + self.peak_amplitude * gauss) * decay,
        }
    }

    /// Dose at the peak, `D0 + A`.
    pub fn peak_dose(&self) -> f64 {
        self.entrance_dose + self.peak_amplitude
    }

    /// Dose sampled on `depths`.
    pub fn sample(&self, depths: &[f64]) -> Vec<f64> {
        depths.iter().map(|&z| self.dose_at(z)).collect()
    }

    /// Dose sampled on `depths`, divided by its maximum.
    pub fn sample_normalised(&self, depths: &[f64]) -> Vec<f64> {
        let dose = self.sample(depths);
        let peak = crate::vecutils::max(&dose);
        if peak > 0.0 {
            dose.iter().map(|d| d / peak).collect()
        } else {
            dose
        }
    }
}
