use serde::{Deserialize, Serialize};

use crate::error::{PgResult, ensure_config};
use crate::sim::beam::{DEFAULT_MIN_BETA, DoseProfile, FalloffShape, RangeEnergyTable};
use crate::sim::detection::DetectionGeometry;
use crate::sim::emission::{EmissionNormalisation, SamplerSettings};
use crate::sim::reconstruction::{
    KernelNormalisation, ProfileNormalisation, ReconstructionSettings,
};

/// Finest sampling of the built-in water table in mm.
const WATER_TABLE_STEP: f64 = 1.0;

/// All inputs of one simulation run.
///
/// Lengths are in mm, times in ns, except where a field name says otherwise.
/// Missing fields in a JSON file take the reference values from [`Default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // Geometry
    pub phantom_length: f64,
    pub detector_area_cm2: f64,
    pub detector_lateral_offset: f64,
    /// Detector position past the distal phantom face.
    pub detector_distance_beyond: f64,

    // Dose
    pub bragg_peak_depth: f64,
    pub entrance_dose: f64,
    pub peak_amplitude: f64,
    pub peak_width: f64,
    pub falloff_length: f64,
    pub falloff: FalloffShape,

    // Emission
    /// Prompt-gamma photons per proton.
    pub photon_yield: f64,
    pub protons_per_burst: f64,
    pub emission_normalisation: EmissionNormalisation,

    // Detection
    pub attenuation_per_cm: f64,
    pub timing_resolution: f64,
    pub apply_timing_jitter: bool,
    /// Uncorrelated background, events per ns.
    pub background_rate: f64,
    pub histogram_bin_width: f64,

    // Grids
    pub forward_step: f64,
    pub reconstruction_step: f64,
    pub tof_step: f64,
    /// Velocity floor for the time-of-flight integrand, as a fraction of `c`.
    pub min_beta: f64,
    /// Sample emission depths uniformly inside each forward bin.
    pub depth_jitter: bool,

    // Reconstruction
    pub kernel_normalisation: KernelNormalisation,
    pub sensitivity_correction: bool,
    pub profile_normalisation: ProfileNormalisation,

    // Run
    /// Base seed. `None` draws one from the thread-local generator.
    pub seed: Option<u64>,
    /// Keep the individual photon events in the result.
    ///
    /// The reference scenario detects ~10^7 photons; without this flag only
    /// their arrival times are held while binning.
    pub keep_events: bool,
}

impl SimulationConfig {
    /// Reference scenario: 300 mm water phantom, Bragg peak at 150 mm.
    pub fn new() -> Self {
        Self {
            phantom_length: 300.0,
            detector_area_cm2: 25.0,
            detector_lateral_offset: 50.0,
            detector_distance_beyond: 50.0,
            bragg_peak_depth: 150.0,
            entrance_dose: 0.3,
            peak_amplitude: 1.0,
            peak_width: 8.0,
            falloff_length: 5.0,
            falloff: FalloffShape::Additive,
            photon_yield: 1e-4,
            protons_per_burst: 5e13,
            emission_normalisation: EmissionNormalisation::TotalYield,
            attenuation_per_cm: 0.08,
            timing_resolution: 0.5,
            apply_timing_jitter: true,
            background_rate: 0.1,
            histogram_bin_width: 0.03,
            forward_step: 1.0,
            reconstruction_step: 1.0,
            tof_step: 1.0,
            min_beta: DEFAULT_MIN_BETA,
            depth_jitter: false,
            kernel_normalisation: KernelNormalisation::PerBin,
            sensitivity_correction: true,
            profile_normalisation: ProfileNormalisation::Peak,
            seed: Some(42),
            keep_events: false,
        }
    }

    /// Checks every scalar parameter and the derived geometry and dose curve.
    pub fn validate(&self) -> PgResult<()> {
        ensure_config!(
            self.phantom_length > 0.0 && self.phantom_length.is_finite(),
            "phantom length must be positive, got {}",
            self.phantom_length
        );
        ensure_config!(
            self.bragg_peak_depth > 0.0 && self.bragg_peak_depth <= self.phantom_length,
            "Bragg peak depth {} mm must lie inside the phantom (0, {}] mm",
            self.bragg_peak_depth,
            self.phantom_length
        );
        ensure_config!(
            self.photon_yield >= 0.0,
            "photon yield must be non-negative, got {}",
            self.photon_yield
        );
        ensure_config!(
            self.protons_per_burst >= 0.0,
            "protons per burst must be non-negative, got {}",
            self.protons_per_burst
        );
        if let EmissionNormalisation::PerBin(k) = self.emission_normalisation {
            ensure_config!(k >= 0.0, "emission constant must be non-negative, got {k}");
        }
        ensure_config!(
            self.timing_resolution > 0.0,
            "timing resolution must be positive, got {} ns",
            self.timing_resolution
        );
        ensure_config!(
            self.background_rate >= 0.0,
            "background rate must be non-negative, got {} per ns",
            self.background_rate
        );
        ensure_config!(
            self.histogram_bin_width > 0.0,
            "histogram bin width must be positive, got {} ns",
            self.histogram_bin_width
        );
        for (name, step) in [
            ("forward", self.forward_step),
            ("reconstruction", self.reconstruction_step),
            ("time-of-flight", self.tof_step),
        ] {
            ensure_config!(step > 0.0, "{name} grid step must be positive, got {step} mm");
        }
        ensure_config!(
            self.min_beta > 0.0 && self.min_beta < 1.0,
            "velocity floor must lie in (0, 1), got {}",
            self.min_beta
        );
        self.geometry()?;
        self.dose_profile()?;
        Ok(())
    }

    pub fn geometry(&self) -> PgResult<DetectionGeometry> {
        DetectionGeometry::new(
            self.phantom_length,
            self.detector_lateral_offset,
            self.detector_distance_beyond,
            self.detector_area_cm2,
            self.attenuation_per_cm,
        )
    }

    pub fn dose_profile(&self) -> PgResult<DoseProfile> {
        DoseProfile::new(
            self.entrance_dose,
            self.peak_amplitude,
            self.bragg_peak_depth,
            self.peak_width,
            self.falloff_length,
            self.falloff,
        )
    }

    /// Water table whose proton range equals the configured Bragg peak depth.
    ///
    /// Sampled every millimetre, or on the time-of-flight step when finer.
    pub fn water_table(&self) -> PgResult<RangeEnergyTable> {
        RangeEnergyTable::bragg_kleeman_water(
            self.bragg_peak_depth,
            self.phantom_length,
            self.tof_step.min(WATER_TABLE_STEP),
        )
    }

    pub fn sampler_settings(&self) -> SamplerSettings {
        SamplerSettings {
            grid_step: self.forward_step,
            photon_yield: self.photon_yield,
            protons_per_burst: self.protons_per_burst,
            normalisation: self.emission_normalisation,
            timing_resolution: self.timing_resolution,
            apply_jitter: self.apply_timing_jitter,
            background_rate: self.background_rate,
            depth_jitter: self.depth_jitter,
        }
    }

    pub fn reconstruction_settings(&self) -> ReconstructionSettings {
        ReconstructionSettings {
            grid_step: self.reconstruction_step,
            timing_resolution: self.timing_resolution,
            kernel: self.kernel_normalisation,
            sensitivity_correction: self.sensitivity_correction,
            normalisation: self.profile_normalisation,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PgError;

    #[test]
    fn test_reference_defaults() {
        let c = SimulationConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.phantom_length, 300.0);
        assert_eq!(c.bragg_peak_depth, 150.0);
        assert_eq!(c.seed, Some(42));
        assert!(!c.keep_events);
        let g = c.geometry().unwrap();
        assert!((g.area - 2500.0).abs() < 1e-12);
        assert!((g.attenuation - 0.008).abs() < 1e-15);
    }

    #[test]
    fn test_partial_json_overrides_defaults() {
        let json = r#"{
            "protons_per_burst": 1e10,
            "seed": null,
            "falloff": "Scaled",
            "emission_normalisation": { "PerBin": 0.001 },
            "kernel_normalisation": "None"
        }"#;
        let c: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(c.protons_per_burst, 1e10);
        assert_eq!(c.seed, None);
        assert_eq!(c.falloff, FalloffShape::Scaled);
        assert_eq!(c.emission_normalisation, EmissionNormalisation::PerBin(0.001));
        assert_eq!(c.kernel_normalisation, KernelNormalisation::None);
        assert_eq!(c.phantom_length, 300.0);
        assert_eq!(c.timing_resolution, 0.5);
    }

    #[test]
    fn test_json_roundtrip() {
        let c = SimulationConfig::new();
        let json = serde_json::to_string_pretty(&c).unwrap();
        let back: SimulationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    fn assert_rejected(mutate: impl Fn(&mut SimulationConfig)) {
        let mut c = SimulationConfig::new();
        mutate(&mut c);
        match c.validate() {
            Err(PgError::Configuration(_)) => {}
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_errors() {
        assert_rejected(|c| c.timing_resolution = 0.0);
        assert_rejected(|c| c.detector_area_cm2 = -1.0);
        assert_rejected(|c| c.detector_distance_beyond = 0.0);
        assert_rejected(|c| c.histogram_bin_width = 0.0);
        assert_rejected(|c| c.forward_step = 0.0);
        assert_rejected(|c| c.reconstruction_step = -1.0);
        assert_rejected(|c| c.tof_step = 0.0);
        assert_rejected(|c| c.min_beta = 1.0);
        assert_rejected(|c| c.min_beta = 0.0);
        assert_rejected(|c| c.peak_width = 0.0);
        assert_rejected(|c| c.bragg_peak_depth = 400.0);
        assert_rejected(|c| c.protons_per_burst = -5.0);
        assert_rejected(|c| c.background_rate = -0.1);
        assert_rejected(|c| c.emission_normalisation = EmissionNormalisation::PerBin(-1.0));
    }

    #[test]
    fn test_derived_settings() {
        let mut c = SimulationConfig::new();
        c.apply_timing_jitter = false;
        c.sensitivity_correction = false;
        let s = c.sampler_settings();
        assert!(!s.apply_jitter);
        assert_eq!(s.protons_per_burst, 5e13);
        let r = c.reconstruction_settings();
        assert!(!r.sensitivity_correction);
        assert_eq!(r.kernel, KernelNormalisation::PerBin);
        let table = c.water_table().unwrap();
        assert_eq!(table.len(), 301);
    }
}
