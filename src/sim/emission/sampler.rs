use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, Poisson};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PgError, PgResult, ensure_config};
use crate::sim::beam::{DoseProfile, TimeOfFlightTable};
use crate::sim::detection::DetectionGeometry;
use crate::vecutils::depth_grid;

use super::event::PhotonEvent;
use super::rng::{BACKGROUND_STREAM, substream};

/// How relative dose is converted to an expected number of emitted photons.
///
/// `N_emit(z) = D(z) * yield * protons_per_burst * k`, with `k` chosen here.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum EmissionNormalisation {
    /// `k = 1 / sum_z D(z)` over the forward grid: the phantom emits
    /// `yield * protons_per_burst` photons in total.
    #[default]
    TotalYield,
    /// `k = 1 / max_z D(z)`: the peak bin emits `yield * protons_per_burst`.
    PeakDose,
    /// Explicit per-bin constant `k`.
    PerBin(f64),
}

/// Forward-model parameters, in configuration units (mm, ns, events/ns).
#[derive(Debug, Clone, Copy)]
pub struct SamplerSettings {
    /// Forward depth-bin width in mm.
    pub grid_step: f64,
    /// Prompt-gamma photons emitted per proton.
    pub photon_yield: f64,
    pub protons_per_burst: f64,
    pub normalisation: EmissionNormalisation,
    /// Detector timing resolution (Gaussian sigma) in ns.
    pub timing_resolution: f64,
    /// Add Gaussian timing jitter to signal events.
    pub apply_jitter: bool,
    /// Uncorrelated background rate in events per ns.
    pub background_rate: f64,
    /// Sample the emission depth uniformly inside each bin instead of using its centre.
    pub depth_jitter: bool,
}

/// Expected yield of one forward depth bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBin {
    /// Bin centre in mm.
    pub depth: f64,
    /// Lower and upper edge of the bin in mm: midpoints to the neighbouring
    /// depths, or the phantom face for the first and last bin.
    pub edges: (f64, f64),
    /// Expected emitted photons.
    pub emitted: f64,
    /// Expected detected photons.
    pub detected: f64,
    /// Proton transit time to the bin centre in ns.
    pub proton_tof: f64,
    /// Gamma flight time from the bin centre in ns.
    pub gamma_tof: f64,
}

impl DepthBin {
    /// Noise-free arrival time of photons emitted at the bin centre.
    pub fn expected_time(&self) -> f64 {
        self.proton_tof + self.gamma_tof
    }
}

/// Forward model: turns the dose curve into detected photon events.
///
/// Expected counts are computed and checked once in [`PhotonEmissionSampler::new`];
/// sampling itself cannot fail.
pub struct PhotonEmissionSampler<'a> {
    settings: SamplerSettings,
    tof: &'a TimeOfFlightTable,
    geometry: &'a DetectionGeometry,
    bins: Vec<DepthBin>,
    window: (f64, f64),
    background_mean: f64,
    jitter: Option<Normal<f64>>,
}

impl<'a> PhotonEmissionSampler<'a> {
    /// Prepares the per-bin expectations over the span of `tof`.
    pub fn new(
        settings: SamplerSettings,
        dose: &DoseProfile,
        tof: &'a TimeOfFlightTable,
        geometry: &'a DetectionGeometry,
    ) -> PgResult<Self> {
        ensure_config!(
            settings.grid_step > 0.0,
            "forward grid step must be positive, got {}",
            settings.grid_step
        );
        ensure_config!(
            settings.timing_resolution > 0.0,
            "timing resolution must be positive, got {} ns",
            settings.timing_resolution
        );

        let (z_min, z_max) = tof.depth_range();
        let length = z_max - z_min;
        let depths: Vec<f64> = depth_grid(length, settings.grid_step)
            .into_iter()
            .map(|z| z + z_min)
            .collect();
        let doses = dose.sample(&depths);

        let k = match settings.normalisation {
            EmissionNormalisation::TotalYield => {
                let total: f64 = doses.iter().sum();
                if total > 0.0 { 1.0 / total } else { 0.0 }
            }
            EmissionNormalisation::PeakDose => {
                let peak = crate::vecutils::max(&doses);
                if peak > 0.0 { 1.0 / peak } else { 0.0 }
            }
            EmissionNormalisation::PerBin(k) => k,
        };
        let scale = settings.photon_yield * settings.protons_per_burst * k;

        let mut bins = Vec::with_capacity(depths.len());
        for (i, (&z, &d)) in depths.iter().zip(doses.iter()).enumerate() {
            let emitted = d * scale;
            let detected = emitted * geometry.detection_probability(z);
            if !(emitted >= 0.0 && detected >= 0.0 && detected.is_finite()) {
                return Err(PgError::config(format!(
                    "expected photon count at depth {z} mm is {detected} (emitted {emitted}); \
                     check yield, protons per burst and emission normalisation"
                )));
            }
            bins.push(DepthBin {
                depth: z,
                edges: bin_edges(&depths, i),
                emitted,
                detected,
                proton_tof: tof.time_within(z),
                gamma_tof: geometry.gamma_time_of_flight(z),
            });
        }

        let times: Vec<f64> = bins.iter().map(DepthBin::expected_time).collect();
        let window = (crate::vecutils::min(&times), crate::vecutils::max(&times));
        let background_mean = settings.background_rate * (window.1 - window.0);
        ensure_config!(
            background_mean >= 0.0 && background_mean.is_finite(),
            "expected background count is {background_mean} (rate {} per ns)",
            settings.background_rate
        );

        let jitter = if settings.apply_jitter {
            let normal = Normal::new(0.0, settings.timing_resolution)
                .map_err(|e| PgError::config(format!("timing jitter: {e}")))?;
            Some(normal)
        } else {
            None
        };

        let sampler = Self {
            settings,
            tof,
            geometry,
            bins,
            window,
            background_mean,
            jitter,
        };
        info!(
            bins = sampler.bins.len(),
            emitted = sampler.expected_emitted(),
            detected = sampler.expected_detected(),
            background = background_mean,
            "prepared photon emission sampler"
        );
        Ok(sampler)
    }

    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }

    /// Per-bin expectations, ordered by depth.
    pub fn bins(&self) -> &[DepthBin] {
        &self.bins
    }

    /// Earliest and latest noise-free signal arrival time in ns.
    pub fn window(&self) -> (f64, f64) {
        self.window
    }

    /// Expected photons emitted over the whole phantom.
    pub fn expected_emitted(&self) -> f64 {
        self.bins.iter().map(|b| b.emitted).sum()
    }

    /// Expected detected signal photons.
    pub fn expected_detected(&self) -> f64 {
        self.bins.iter().map(|b| b.detected).sum()
    }

    /// Expected background events over the window.
    pub fn background_mean(&self) -> f64 {
        self.background_mean
    }

    /// Draws a run as a lazy event sequence.
    ///
    /// Per-bin counts are drawn up front in parallel; events are produced on
    /// demand in depth order, followed by background events. The sequence is
    /// identical to [`Self::sample`] for the same seed.
    pub fn stream(&self, seed: u64) -> PhotonStream<'_, 'a> {
        let draws: Vec<BinDraw> = (0..self.bins.len())
            .into_par_iter()
            .map(|i| self.draw_bin(i, seed))
            .collect();
        let background = self.draw_background(seed);
        let remaining =
            draws.iter().map(|d| d.remaining).sum::<u64>() + background.remaining;
        debug!(seed, remaining, "drew photon counts");
        PhotonStream {
            sampler: self,
            draws,
            current: 0,
            background,
            remaining,
        }
    }

    /// Draws a run and materialises every event, sampling depth bins in parallel.
    pub fn sample(&self, seed: u64) -> Vec<PhotonEvent> {
        let mut events: Vec<PhotonEvent> = (0..self.bins.len())
            .into_par_iter()
            .flat_map_iter(|i| {
                let mut draw = self.draw_bin(i, seed);
                let mut out = Vec::with_capacity(draw.remaining as usize);
                for _ in 0..draw.remaining {
                    out.push(self.signal_event(i, &mut draw.rng));
                }
                out
            })
            .collect();

        let mut background = self.draw_background(seed);
        events.reserve(background.remaining as usize);
        for _ in 0..background.remaining {
            events.push(self.background_event(&mut background.rng));
        }
        debug!(seed, events = events.len(), "sampled photon events");
        events
    }

    fn draw_bin(&self, index: usize, seed: u64) -> BinDraw {
        let mut rng = substream(seed, index as u64);
        let remaining = poisson_count(self.bins[index].detected, &mut rng);
        BinDraw {
            bin: index,
            remaining,
            rng,
        }
    }

    fn draw_background(&self, seed: u64) -> BinDraw {
        let mut rng = substream(seed, BACKGROUND_STREAM);
        let remaining = poisson_count(self.background_mean, &mut rng);
        BinDraw {
            bin: usize::MAX,
            remaining,
            rng,
        }
    }

    fn signal_event(&self, index: usize, rng: &mut StdRng) -> PhotonEvent {
        let bin = &self.bins[index];
        let jittered = self.settings.depth_jitter && bin.edges.1 > bin.edges.0;
        let (depth, proton_tof, gamma_tof) = if jittered {
            let z = rng.gen_range(bin.edges.0..bin.edges.1);
            (
                z,
                self.tof.time_within(z),
                self.geometry.gamma_time_of_flight(z),
            )
        } else {
            (bin.depth, bin.proton_tof, bin.gamma_tof)
        };
        let jitter = match &self.jitter {
            Some(normal) => normal.sample(rng),
            None => 0.0,
        };
        PhotonEvent::signal(depth, proton_tof, gamma_tof, jitter)
    }

    fn background_event(&self, rng: &mut StdRng) -> PhotonEvent {
        let (t0, t1) = self.window;
        let t = if t1 > t0 { rng.gen_range(t0..t1) } else { t0 };
        PhotonEvent::background(t)
    }
}

/// Midpoints to the neighbouring depths, closed by the grid ends.
fn bin_edges(depths: &[f64], i: usize) -> (f64, f64) {
    let lo = if i == 0 {
        depths[0]
    } else {
        0.5 * (depths[i - 1] + depths[i])
    };
    let hi = if i + 1 == depths.len() {
        depths[i]
    } else {
        0.5 * (depths[i] + depths[i + 1])
    };
    (lo, hi)
}

/// Poisson draw; a zero mean gives zero events.
fn poisson_count(mean: f64, rng: &mut StdRng) -> u64 {
    if mean <= 0.0 {
        return 0;
    }
    match Poisson::new(mean) {
        Ok(dist) => {
            let n: f64 = dist.sample(rng);
            n as u64
        }
        Err(e) => unreachable!("expected counts are validated at setup: {e}"),
    }
}

/// Pending events of one bin (or of the background process).
struct BinDraw {
    bin: usize,
    remaining: u64,
    rng: StdRng,
}

/// Finite, non-restartable sequence of detected photons for one run.
pub struct PhotonStream<'s, 'a> {
    sampler: &'s PhotonEmissionSampler<'a>,
    draws: Vec<BinDraw>,
    current: usize,
    background: BinDraw,
    remaining: u64,
}

impl Iterator for PhotonStream<'_, '_> {
    type Item = PhotonEvent;

    fn next(&mut self) -> Option<PhotonEvent> {
        while self.current < self.draws.len() {
            let draw = &mut self.draws[self.current];
            if draw.remaining > 0 {
                draw.remaining -= 1;
                self.remaining -= 1;
                return Some(self.sampler.signal_event(draw.bin, &mut draw.rng));
            }
            self.current += 1;
        }
        if self.background.remaining > 0 {
            self.background.remaining -= 1;
            self.remaining -= 1;
            return Some(self.sampler.background_event(&mut self.background.rng));
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for PhotonStream<'_, '_> {}
