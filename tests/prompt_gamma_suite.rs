use pgtiming::sim::beam::{FalloffShape, RangeEnergyProvider};
use pgtiming::sim::emission::EventSource;
use pgtiming::{PgError, PgResult, Simulation, SimulationConfig};

/// Reference scenario with jitter and background switched off.
fn noiseless_config() -> SimulationConfig {
    let mut config = SimulationConfig::new();
    config.apply_timing_jitter = false;
    config.background_rate = 0.0;
    config
}

/// Scaled-down burst for tests that only need a few thousand photons.
fn small_config(seed: u64) -> SimulationConfig {
    let mut config = SimulationConfig::new();
    config.protons_per_burst = 5e10;
    config.seed = Some(seed);
    config
}

/// Uniform 100 MeV beam that never stops.
struct ConstantEnergy;

impl RangeEnergyProvider for ConstantEnergy {
    fn energy_at(&self, depth: f64) -> PgResult<f64> {
        if (0.0..=400.0).contains(&depth) {
            Ok(100.0)
        } else {
            Err(PgError::Domain {
                depth,
                min: 0.0,
                max: 400.0,
            })
        }
    }

    fn depth_range(&self) -> (f64, f64) {
        (0.0, 400.0)
    }
}

#[test]
fn test_noiseless_round_trip() {
    let sim = Simulation::with_water_table(noiseless_config()).unwrap();
    let result = sim.run().unwrap();

    assert_eq!(result.background_events, 0);
    assert!(
        result.signal_events >= 10_000_000,
        "only {} photons detected",
        result.signal_events
    );
    let peak = result.profile.peak_depth().unwrap();
    assert!((peak - 150.0).abs() <= 1.0, "peak at {peak} mm");
}

#[test]
fn test_reference_scenario() {
    let sim = Simulation::with_water_table(SimulationConfig::default()).unwrap();
    let result = sim.run().unwrap();

    assert_eq!(result.seed, 42);
    assert!(result.background_events > 0);
    let error = result.peak_error.unwrap();
    assert!(error <= 2.0, "peak error {error} mm");

    let normalised = result.profile.normalised();
    assert!((pgtiming::vecutils::max(&normalised) - 1.0).abs() < 1e-12);
    assert!(result.profile.rows().iter().all(|r| r.corrected >= 0.0));
}

#[test]
fn test_sensitivity_toggle_keeps_peak() {
    let mut on = SimulationConfig::new();
    on.falloff = FalloffShape::Scaled;
    let mut off = on.clone();
    off.sensitivity_correction = false;

    let a = Simulation::with_water_table(on).unwrap().run().unwrap();
    let b = Simulation::with_water_table(off).unwrap().run().unwrap();

    assert_eq!(a.histogram, b.histogram);
    assert_eq!(a.profile.raw(), b.profile.raw());
    let peak_on = a.profile.peak_depth().unwrap();
    let peak_off = b.profile.peak_depth().unwrap();
    assert!(
        (peak_on - peak_off).abs() <= 1.0,
        "corrected peak {peak_on} mm, uncorrected peak {peak_off} mm"
    );
}

#[test]
fn test_same_seed_is_reproducible() {
    let mut config = small_config(1234);
    config.keep_events = true;
    let sim = Simulation::with_water_table(config.clone()).unwrap();
    let first = sim.run().unwrap();
    let second = Simulation::with_water_table(config).unwrap().run().unwrap();

    assert_eq!(first.events, second.events);
    assert_eq!(first.histogram, second.histogram);
    assert_eq!(first.profile, second.profile);

    let other = sim.run_with_seed(4321).unwrap();
    assert_ne!(first.events, other.events);
}

#[test]
fn test_histogram_accounts_for_every_event() {
    let mut config = small_config(3);
    config.keep_events = true;
    config.background_rate = 1.0;
    let result = Simulation::with_water_table(config).unwrap().run().unwrap();
    let events = result.events.as_ref().unwrap();

    assert_eq!(result.histogram.total(), events.len() as u64);
    let background = events
        .iter()
        .filter(|e| e.source == EventSource::Background)
        .count() as u64;
    assert_eq!(background, result.background_events);
    assert!(result.profile.rows().iter().all(|r| r.raw >= 0.0));
}

#[test]
fn test_custom_provider() {
    let sim = Simulation::new(small_config(9), &ConstantEnergy).unwrap();
    let tof = sim.time_of_flight();
    // Constant speed: transit time grows linearly with depth
    let t100 = tof.time_at(100.0).unwrap();
    let t200 = tof.time_at(200.0).unwrap();
    assert!((t200 - 2.0 * t100).abs() < 1e-9);
    assert!(sim.run().is_ok());
}

#[test]
fn test_intensity_sweep() {
    let sim = Simulation::with_water_table(small_config(5)).unwrap();
    let points = sim.sweep_protons_per_burst(&[5e9, 5e10, 5e11]).unwrap();
    assert_eq!(points.len(), 3);
    for w in points.windows(2) {
        assert!(w[1].detected_events > w[0].detected_events);
    }
    assert!(points.iter().all(|p| p.peak_depth.is_some()));
}
