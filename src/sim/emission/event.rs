use serde::{Deserialize, Serialize};

/// Where a detected photon came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSource {
    Signal,
    Background,
}

/// One detected photon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotonEvent {
    /// Emission depth in mm. `None` for background events.
    pub emission_depth: Option<f64>,
    /// Proton transit time to the emission depth in ns (0 for background).
    pub proton_tof: f64,
    /// Gamma flight time to the detector in ns (0 for background).
    pub gamma_tof: f64,
    /// Arrival time recorded by the detector in ns.
    pub measured_time: f64,
    pub source: EventSource,
}

impl PhotonEvent {
    /// A prompt-gamma photon: `measured = proton_tof + gamma_tof + jitter`.
    pub fn signal(depth: f64, proton_tof: f64, gamma_tof: f64, jitter: f64) -> Self {
        Self {
            emission_depth: Some(depth),
            proton_tof,
            gamma_tof,
            measured_time: proton_tof + gamma_tof + jitter,
            source: EventSource::Signal,
        }
    }

    /// An uncorrelated background count at `measured_time`.
    pub fn background(measured_time: f64) -> Self {
        Self {
            emission_depth: None,
            proton_tof: 0.0,
            gamma_tof: 0.0,
            measured_time,
            source: EventSource::Background,
        }
    }

    pub fn is_signal(&self) -> bool {
        self.source == EventSource::Signal
    }

    /// Timing jitter added by the detector (0 for background).
    pub fn jitter(&self) -> f64 {
        match self.source {
            EventSource::Signal => self.measured_time - self.proton_tof - self.gamma_tof,
            EventSource::Background => 0.0,
        }
    }
}
