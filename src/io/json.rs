//! JSON persistence of configurations, profiles and photon events.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::sim::config::SimulationConfig;
use crate::sim::emission::PhotonEvent;
use crate::sim::reconstruction::ReconstructedProfile;

/// Reads a configuration; missing fields take their reference defaults.
pub fn read_config_json(path: &Path) -> Result<SimulationConfig> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let config: SimulationConfig = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to deserialize configuration from: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in: {}", path.display()))?;

    Ok(config)
}

/// Writes the reconstructed profile rows.
pub fn write_profile_json(path: &Path, profile: &ReconstructedProfile) -> Result<()> {
    write_json(path, profile, "profile")
}

/// Writes photon events, e.g. for offline diagnostics.
pub fn write_events_json(path: &Path, events: &[PhotonEvent]) -> Result<()> {
    write_json(path, &events, "events")
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, what: &str) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, value)
        .with_context(|| format!("Failed to serialize {what} to: {}", path.display()))?;

    Ok(())
}
