//! Time-of-flight back-projection from the arrival-time histogram to a depth profile.

pub mod backprojection;
pub mod profile;

pub use backprojection::{BackProjector, KernelNormalisation, ReconstructionSettings};
pub use profile::{ProfileNormalisation, ProfileRow, ReconstructedProfile};
