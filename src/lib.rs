pub mod error;
pub mod geom;
pub mod io;
pub mod sim;
pub mod vecutils;

// Prelude
pub use error::{PgError, PgResult};
pub use geom::point::Point;
pub use sim::beam::{RangeEnergyProvider, RangeEnergyTable};
pub use sim::{Simulation, SimulationConfig, SimulationResult};
