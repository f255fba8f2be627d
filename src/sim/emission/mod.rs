//! Forward model: dose curve to detected prompt-gamma photons.

pub mod event;
pub mod rng;
pub mod sampler;

pub use event::{EventSource, PhotonEvent};
pub use rng::{entropy_seed, substream, substream_seed};
pub use sampler::{
    DepthBin, EmissionNormalisation, PhotonEmissionSampler, PhotonStream, SamplerSettings,
};
