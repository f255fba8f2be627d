//! Seeded random sub-streams.
//!
//! Every depth bin (and the background process) draws from its own generator
//! whose seed is derived from the run seed and a stream index. Results then do
//! not depend on how work is split across threads.

use rand::SeedableRng;
use rand::rngs::StdRng;

/// Stream index reserved for the background process.
pub const BACKGROUND_STREAM: u64 = u64::MAX;

/// SplitMix64 finaliser.
fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Seed of sub-stream `stream` for run seed `seed`.
pub fn substream_seed(seed: u64, stream: u64) -> u64 {
    mix64(mix64(seed) ^ mix64(stream.wrapping_add(0x632be59bd9b4e019)))
}

/// Generator for sub-stream `stream`.
pub fn substream(seed: u64, stream: u64) -> StdRng {
    StdRng::seed_from_u64(substream_seed(seed, stream))
}

/// Fresh run seed from the thread-local generator, for unseeded runs.
pub fn entropy_seed() -> u64 {
    use rand::Rng;
    rand::thread_rng().r#gen()
}
