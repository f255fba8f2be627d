use anyhow::{Context, Result};
use pgtiming::io::{read_config_json, read_range_energy_csv};
use pgtiming::{Simulation, SimulationConfig};
use std::path::Path;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: pgtiming [config.json] [range_energy.csv]";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") || args.len() > 2 {
        println!("{USAGE}");
        return Ok(());
    }

    let config = match args.first() {
        Some(path) => read_config_json(Path::new(path))?,
        None => SimulationConfig::default(),
    };
    let simulation = match args.get(1) {
        Some(path) => {
            let table = read_range_energy_csv(Path::new(path))?;
            Simulation::new(config, &table).context("Failed to set up simulation")?
        }
        None => Simulation::with_water_table(config).context("Failed to set up simulation")?,
    };

    let result = simulation.run().context("Simulation failed")?;

    println!("seed                {}", result.seed);
    println!("detector            {:.1}", simulation.geometry().detector);
    println!("signal photons      {}", result.signal_events);
    println!("background events   {}", result.background_events);
    println!("expected signal     {:.1}", result.expected_signal);
    println!("histogram bins      {}", result.histogram.num_bins());
    match (result.profile.peak_depth(), result.peak_error) {
        (Some(depth), Some(error)) => {
            println!("reconstructed peak  {depth:.1} mm (error {error:.1} mm)")
        }
        _ => println!("reconstructed peak  none"),
    }

    println!();
    println!("{:>10} {:>12} {:>12}", "depth_mm", "profile", "dose");
    let depths = result.profile.depths();
    let dose = simulation.dose().sample_normalised(&depths);
    for (row, d) in result.profile.rows().iter().zip(dose).step_by(10) {
        println!("{:>10.1} {:>12.4} {:>12.4}", row.depth, row.normalised, d);
    }

    Ok(())
}
