use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PgError, PgResult, ensure_config};
use crate::sim::beam::TimeOfFlightTable;
use crate::sim::detection::DetectionGeometry;
use crate::sim::histogram::{ArrivalTimeHistogram, HistogramBin};
use crate::vecutils::depth_grid;

use super::profile::{ProfileNormalisation, ReconstructedProfile};

/// Scaling of the Gaussian timing kernel of each histogram bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KernelNormalisation {
    /// Weights of a bin are divided by their sum over the grid, so every bin
    /// spreads exactly its count over depth.
    #[default]
    PerBin,
    /// Raw kernel: `w(z, bin) = exp(-(t_bin - t_exp(z))^2 / (2 sigma^2)) * count`.
    None,
}

#[derive(Debug, Clone, Copy)]
pub struct ReconstructionSettings {
    /// Reconstruction grid step in mm.
    pub grid_step: f64,
    /// Kernel width (timing resolution) in ns.
    pub timing_resolution: f64,
    pub kernel: KernelNormalisation,
    /// Multiply by `S(z) = 1 / P(z)`.
    pub sensitivity_correction: bool,
    pub normalisation: ProfileNormalisation,
}

/// Maps an arrival-time histogram back onto depth.
///
/// Expected arrival times and sensitivities are tabulated once on the
/// reconstruction grid; [`BackProjector::reconstruct`] only reads them.
pub struct BackProjector {
    settings: ReconstructionSettings,
    depths: Vec<f64>,
    expected: Vec<f64>,
    sensitivity: Vec<f64>,
}

impl BackProjector {
    pub fn new(
        settings: ReconstructionSettings,
        tof: &TimeOfFlightTable,
        geometry: &DetectionGeometry,
    ) -> PgResult<Self> {
        ensure_config!(
            settings.grid_step > 0.0,
            "reconstruction grid step must be positive, got {}",
            settings.grid_step
        );
        ensure_config!(
            settings.timing_resolution > 0.0,
            "timing resolution must be positive, got {} ns",
            settings.timing_resolution
        );

        let (z_min, z_max) = tof.depth_range();
        let depths: Vec<f64> = depth_grid(z_max - z_min, settings.grid_step)
            .into_iter()
            .map(|z| z + z_min)
            .collect();
        let expected = depths
            .iter()
            .map(|&z| tof.time_within(z) + geometry.gamma_time_of_flight(z))
            .collect();
        let sensitivity = depths
            .iter()
            .map(|&z| {
                let p = geometry.detection_probability(z);
                if p > 0.0 {
                    Ok(1.0 / p)
                } else {
                    Err(PgError::config(format!(
                        "detection probability vanishes at depth {z} mm"
                    )))
                }
            })
            .collect::<PgResult<Vec<f64>>>()?;

        debug!(points = depths.len(), "tabulated reconstruction grid");
        Ok(Self {
            settings,
            depths,
            expected,
            sensitivity,
        })
    }

    pub fn settings(&self) -> &ReconstructionSettings {
        &self.settings
    }

    /// Reconstruction grid depths in mm.
    pub fn depths(&self) -> &[f64] {
        &self.depths
    }

    /// Noise-free arrival time `T_proton(z) + d(z)/c` on the grid, in ns.
    pub fn expected_times(&self) -> &[f64] {
        &self.expected
    }

    /// `S(z) = 1 / P(z)` on the grid.
    pub fn sensitivity(&self) -> &[f64] {
        &self.sensitivity
    }

    fn kernel(&self, bin_time: f64, expected: f64) -> f64 {
        let sigma = self.settings.timing_resolution;
        let dt = bin_time - expected;
        (-dt * dt / (2.0 * sigma * sigma)).exp()
    }

    /// Back-projects `histogram` onto the grid.
    pub fn reconstruct(&self, histogram: &ArrivalTimeHistogram) -> ReconstructedProfile {
        let bins: Vec<HistogramBin> = histogram.non_empty().collect();

        // (bin centre, weight multiplier) for every bin that reaches the grid
        let sources: Vec<(f64, f64)> = bins
            .par_iter()
            .filter_map(|bin| {
                let t = bin.centre();
                let scale = match self.settings.kernel {
                    KernelNormalisation::None => bin.count as f64,
                    KernelNormalisation::PerBin => {
                        let norm: f64 = self.expected.iter().map(|&e| self.kernel(t, e)).sum();
                        if norm > 0.0 {
                            bin.count as f64 / norm
                        } else {
                            0.0
                        }
                    }
                };
                (scale > 0.0).then_some((t, scale))
            })
            .collect();
        debug!(
            bins = bins.len(),
            used = sources.len(),
            "computed back-projection weights"
        );

        let raw: Vec<f64> = self
            .expected
            .par_iter()
            .map(|&e| {
                sources
                    .iter()
                    .map(|&(t, scale)| scale * self.kernel(t, e))
                    .sum()
            })
            .collect();

        let corrected: Vec<f64> = if self.settings.sensitivity_correction {
            raw.iter()
                .zip(&self.sensitivity)
                .map(|(w, s)| w * s)
                .collect()
        } else {
            raw.clone()
        };

        let profile =
            ReconstructedProfile::new(&self.depths, &raw, &corrected, self.settings.normalisation);
        info!(
            events = histogram.total(),
            peak_depth = profile.peak_depth(),
            "reconstructed depth profile"
        );
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::beam::{DEFAULT_MIN_BETA, KinematicsModel, RangeEnergyTable};

    fn tables() -> (TimeOfFlightTable, DetectionGeometry) {
        let provider = RangeEnergyTable::bragg_kleeman_water(150.0, 300.0, 1.0).unwrap();
        let tof = TimeOfFlightTable::build(
            &provider,
            &KinematicsModel::proton(),
            300.0,
            1.0,
            DEFAULT_MIN_BETA,
        )
        .unwrap();
        let geometry = DetectionGeometry::new(300.0, 50.0, 50.0, 25.0, 0.08).unwrap();
        (tof, geometry)
    }

    fn settings(kernel: KernelNormalisation) -> ReconstructionSettings {
        ReconstructionSettings {
            grid_step: 1.0,
            timing_resolution: 0.5,
            kernel,
            sensitivity_correction: true,
            normalisation: ProfileNormalisation::Peak,
        }
    }

    #[test]
    fn test_rejects_bad_settings() {
        let (tof, geometry) = tables();
        let mut s = settings(KernelNormalisation::PerBin);
        s.timing_resolution = 0.0;
        assert!(BackProjector::new(s, &tof, &geometry).is_err());
        let mut s = settings(KernelNormalisation::PerBin);
        s.grid_step = -1.0;
        assert!(BackProjector::new(s, &tof, &geometry).is_err());
    }

    #[test]
    fn test_grid_and_tables() {
        let (tof, geometry) = tables();
        let mut s = settings(KernelNormalisation::PerBin);
        s.grid_step = 2.0;
        let bp = BackProjector::new(s, &tof, &geometry).unwrap();
        assert_eq!(bp.depths().len(), 151);
        let e = bp.expected_times()[75];
        let want = tof.time_at(150.0).unwrap() + geometry.gamma_time_of_flight(150.0);
        assert!((e - want).abs() < 1e-12);
        let s75 = bp.sensitivity()[75] * geometry.detection_probability(150.0);
        assert!((s75 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_bin_peaks_at_matching_depth() {
        let (tof, geometry) = tables();
        let mut s = settings(KernelNormalisation::None);
        s.sensitivity_correction = false;
        let bp = BackProjector::new(s, &tof, &geometry).unwrap();
        // Three events in one bin centred on the noise-free arrival time of 100 mm
        let t = bp.expected_times()[100] - 0.015;
        let hist = ArrivalTimeHistogram::from_times(&[t, t, t], 0.03).unwrap();
        let profile = bp.reconstruct(&hist);
        assert_eq!(profile.peak_depth(), Some(100.0));
        assert!((profile.raw()[100] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_per_bin_kernel_conserves_counts() {
        let (tof, geometry) = tables();
        let mut s = settings(KernelNormalisation::PerBin);
        s.sensitivity_correction = false;
        let bp = BackProjector::new(s, &tof, &geometry).unwrap();
        let times: Vec<f64> = (20..120).map(|i| bp.expected_times()[i]).collect();
        let hist = ArrivalTimeHistogram::from_times(&times, 0.03).unwrap();
        let profile = bp.reconstruct(&hist);
        let total: f64 = profile.raw().iter().sum();
        assert!((total - times.len() as f64).abs() < 1e-6, "total = {total}");
    }

    #[test]
    fn test_non_negative_output() {
        let (tof, geometry) = tables();
        for kernel in [KernelNormalisation::PerBin, KernelNormalisation::None] {
            let bp = BackProjector::new(settings(kernel), &tof, &geometry).unwrap();
            let times: Vec<f64> = (0..400).map(|i| 0.5 + i as f64 * 0.01).collect();
            let hist = ArrivalTimeHistogram::from_times(&times, 0.03).unwrap();
            let profile = bp.reconstruct(&hist);
            for row in profile.rows() {
                assert!(row.raw >= 0.0 && row.corrected >= 0.0 && row.normalised >= 0.0);
            }
        }
    }

    #[test]
    fn test_empty_histogram_gives_zero_profile() {
        let (tof, geometry) = tables();
        let bp =
            BackProjector::new(settings(KernelNormalisation::PerBin), &tof, &geometry).unwrap();
        let hist = ArrivalTimeHistogram::from_times(&[], 0.03).unwrap();
        let profile = bp.reconstruct(&hist);
        assert_eq!(profile.len(), 301);
        assert!(profile.raw().iter().all(|&w| w == 0.0));
        assert_eq!(profile.peak_depth(), None);
    }

    #[test]
    fn test_far_bins_are_skipped() {
        let (tof, geometry) = tables();
        let mut s = settings(KernelNormalisation::PerBin);
        s.sensitivity_correction = false;
        let bp = BackProjector::new(s, &tof, &geometry).unwrap();
        // The early count cannot reach the grid; the gap is empty bins
        let t = bp.expected_times()[50];
        let hist = ArrivalTimeHistogram::from_times(&[-1000.0, t], 0.03).unwrap();
        assert_eq!(hist.non_empty().count(), 2);
        let centre = hist.non_empty().last().unwrap().centre();
        let weights: Vec<f64> = bp
            .expected_times()
            .iter()
            .map(|e| (-(centre - e).powi(2) / (2.0 * 0.25)).exp())
            .collect();
        let norm: f64 = weights.iter().sum();
        let raw = bp.reconstruct(&hist).raw();
        for (w, r) in weights.iter().zip(&raw) {
            assert!((w / norm - r).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sensitivity_toggle() {
        let (tof, geometry) = tables();
        let on =
            BackProjector::new(settings(KernelNormalisation::PerBin), &tof, &geometry).unwrap();
        let mut s = settings(KernelNormalisation::PerBin);
        s.sensitivity_correction = false;
        let off = BackProjector::new(s, &tof, &geometry).unwrap();
        let t = on.expected_times()[80];
        let hist = ArrivalTimeHistogram::from_times(&[t], 0.03).unwrap();
        let a = on.reconstruct(&hist);
        let b = off.reconstruct(&hist);
        assert_eq!(a.raw(), b.raw());
        assert_eq!(b.raw(), b.corrected());
        for (row, s) in a.rows().iter().zip(on.sensitivity()) {
            assert!((row.corrected - row.raw * s).abs() <= 1e-12 * row.corrected.abs());
        }
    }
}
