pub mod beam;
pub mod config;
pub mod detection;
pub mod emission;
pub mod histogram;
pub mod reconstruction;
pub mod simulation;

pub use config::SimulationConfig;
pub use simulation::{Simulation, SimulationResult, SweepPoint};
