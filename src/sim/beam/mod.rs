//! Proton beam models shared by the forward sampler and the reconstructor.
//!
//! Leaves of the pipeline: the range-energy lookup, relativistic kinematics,
//! the integrated proton time-of-flight table and the reference dose curve.

pub mod dose;
pub mod kinematics;
pub mod range_energy;
pub mod tof;

pub use dose::{DoseProfile, FalloffShape};
pub use kinematics::{KinematicsModel, PROTON_REST_ENERGY, SPEED_OF_LIGHT};
pub use range_energy::{RangeEnergyPoint, RangeEnergyProvider, RangeEnergyTable};
pub use tof::{DEFAULT_MIN_BETA, TimeOfFlightTable};
