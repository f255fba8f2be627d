//! File I/O for range-energy tables, configurations and results.

pub mod json;
pub mod range_energy;

pub use json::{read_config_json, write_events_json, write_profile_json};
pub use range_energy::{parse_range_energy_csv, read_range_energy_csv};
