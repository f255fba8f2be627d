use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PgResult, ensure_config};
use crate::sim::beam::{DoseProfile, KinematicsModel, RangeEnergyProvider, TimeOfFlightTable};
use crate::sim::config::SimulationConfig;
use crate::sim::detection::DetectionGeometry;
use crate::sim::emission::{PhotonEmissionSampler, PhotonEvent, entropy_seed};
use crate::sim::histogram::ArrivalTimeHistogram;
use crate::sim::reconstruction::{BackProjector, ReconstructedProfile};

/// Outcome of one forward simulation and reconstruction.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// Seed actually used (drawn at random when the configuration has none).
    pub seed: u64,
    pub signal_events: u64,
    pub background_events: u64,
    /// Expected detected signal photons.
    pub expected_signal: f64,
    pub histogram: ArrivalTimeHistogram,
    pub profile: ReconstructedProfile,
    /// Individual events, when `keep_events` is set.
    pub events: Option<Vec<PhotonEvent>>,
    /// Distance in mm between the reconstructed peak and the configured Bragg peak.
    pub peak_error: Option<f64>,
}

impl SimulationResult {
    pub fn detected_events(&self) -> u64 {
        self.signal_events + self.background_events
    }
}

/// One point of a burst-intensity sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepPoint {
    pub protons_per_burst: f64,
    pub detected_events: u64,
    pub peak_depth: Option<f64>,
    pub peak_error: Option<f64>,
}

/// Validated simulation: shared tables are built once in [`Simulation::new`].
pub struct Simulation {
    config: SimulationConfig,
    tof: TimeOfFlightTable,
    dose: DoseProfile,
    geometry: DetectionGeometry,
}

impl Simulation {
    /// Validates `config` and integrates the proton time of flight from `provider`.
    ///
    /// `provider` must cover the whole phantom.
    pub fn new(config: SimulationConfig, provider: &dyn RangeEnergyProvider) -> PgResult<Self> {
        config.validate()?;
        let (min, max) = provider.depth_range();
        ensure_config!(
            min <= 0.0 && max >= config.phantom_length,
            "range-energy table covers [{min}, {max}] mm but the phantom spans [0, {}] mm",
            config.phantom_length
        );

        let tof = TimeOfFlightTable::build(
            provider,
            &KinematicsModel::proton(),
            config.phantom_length,
            config.tof_step,
            config.min_beta,
        )?;
        let dose = config.dose_profile()?;
        let geometry = config.geometry()?;
        info!(
            phantom_length = config.phantom_length,
            bragg_peak = config.bragg_peak_depth,
            transit_ns = tof.times()[tof.len() - 1],
            "simulation ready"
        );
        Ok(Self {
            config,
            tof,
            dose,
            geometry,
        })
    }

    /// Uses the built-in water table with range equal to the Bragg peak depth.
    pub fn with_water_table(config: SimulationConfig) -> PgResult<Self> {
        let table = config.water_table()?;
        Self::new(config, &table)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn time_of_flight(&self) -> &TimeOfFlightTable {
        &self.tof
    }

    pub fn dose(&self) -> &DoseProfile {
        &self.dose
    }

    pub fn geometry(&self) -> &DetectionGeometry {
        &self.geometry
    }

    pub fn sampler(&self) -> PgResult<PhotonEmissionSampler<'_>> {
        PhotonEmissionSampler::new(
            self.config.sampler_settings(),
            &self.dose,
            &self.tof,
            &self.geometry,
        )
    }

    pub fn back_projector(&self) -> PgResult<BackProjector> {
        BackProjector::new(
            self.config.reconstruction_settings(),
            &self.tof,
            &self.geometry,
        )
    }

    /// Runs with the configured seed, or a fresh one when none is set.
    pub fn run(&self) -> PgResult<SimulationResult> {
        let seed = match self.config.seed {
            Some(seed) => seed,
            None => {
                let seed = entropy_seed();
                info!(seed, "no seed configured, drew one");
                seed
            }
        };
        self.run_with_seed(seed)
    }

    pub fn run_with_seed(&self, seed: u64) -> PgResult<SimulationResult> {
        let sampler = self.sampler()?;
        let projector = self.back_projector()?;
        let bin_width = self.config.histogram_bin_width;

        let (events, histogram, signal_events, background_events) = if self.config.keep_events {
            let events = sampler.sample(seed);
            let signal = events.iter().filter(|e| e.is_signal()).count() as u64;
            let background = events.len() as u64 - signal;
            let histogram = ArrivalTimeHistogram::from_events(&events, bin_width)?;
            (Some(events), histogram, signal, background)
        } else {
            let stream = sampler.stream(seed);
            let mut times = Vec::with_capacity(stream.len());
            let mut signal = 0u64;
            for event in stream {
                if event.is_signal() {
                    signal += 1;
                }
                times.push(event.measured_time);
            }
            let background = times.len() as u64 - signal;
            let histogram = ArrivalTimeHistogram::from_times(&times, bin_width)?;
            (None, histogram, signal, background)
        };
        info!(
            seed,
            signal = signal_events,
            background = background_events,
            bins = histogram.num_bins(),
            "sampled detected photons"
        );
        if signal_events == 0 {
            warn!("no signal photons detected; the profile carries background only");
        }

        let profile = projector.reconstruct(&histogram);
        let peak_error = profile.peak_error(self.config.bragg_peak_depth);
        info!(
            peak_depth = profile.peak_depth(),
            peak_error, "simulation finished"
        );

        Ok(SimulationResult {
            seed,
            signal_events,
            background_events,
            expected_signal: sampler.expected_detected(),
            histogram,
            profile,
            events,
            peak_error,
        })
    }

    /// Repeats the run for each burst intensity with one shared seed.
    pub fn sweep_protons_per_burst(&self, values: &[f64]) -> PgResult<Vec<SweepPoint>> {
        let seed = self.config.seed.unwrap_or_else(entropy_seed);
        let mut points = Vec::with_capacity(values.len());
        for &protons_per_burst in values {
            let mut config = self.config.clone();
            config.protons_per_burst = protons_per_burst;
            config.keep_events = false;
            config.validate()?;
            let sim = Self {
                config,
                tof: self.tof.clone(),
                dose: self.dose,
                geometry: self.geometry,
            };
            let result = sim.run_with_seed(seed)?;
            points.push(SweepPoint {
                protons_per_burst,
                detected_events: result.detected_events(),
                peak_depth: result.profile.peak_depth(),
                peak_error: result.peak_error,
            });
        }
        Ok(points)
    }
}
