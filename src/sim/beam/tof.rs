use tracing::debug;

use crate::error::{PgError, PgResult, ensure_config};
use crate::vecutils::depth_grid;

use super::kinematics::{KinematicsModel, SPEED_OF_LIGHT};
use super::range_energy::RangeEnergyProvider;

/// Default velocity floor as a fraction of `c`.
pub const DEFAULT_MIN_BETA: f64 = 1e-4;

/// Cumulative proton transit time from the phantom entrance to each grid depth.
///
/// Built once by trapezoidal integration of `1/v(z)` and shared read-only by
/// the forward sampler and the reconstructor.
///
/// Near the end of range `v(z) → 0` and the true integral diverges. The
/// integrand is evaluated with `v >= min_beta * c`, so the table stays finite
/// but times at and beyond the Bragg peak are only approximate: every
/// millimetre past the stopping point adds `1 / (min_beta * c)` ns.
#[derive(Debug, Clone)]
pub struct TimeOfFlightTable {
    depths: Vec<f64>,
    times: Vec<f64>,
    step: f64,
    min_beta: f64,
}

impl TimeOfFlightTable {
    /// Integrates the proton transit time over `[0, length]` every `step` mm.
    ///
    /// The provider must cover `[0, length]`.
    pub fn build(
        provider: &dyn RangeEnergyProvider,
        kinematics: &KinematicsModel,
        length: f64,
        step: f64,
        min_beta: f64,
    ) -> PgResult<Self> {
        ensure_config!(length > 0.0, "phantom length must be positive, got {length}");
        ensure_config!(step > 0.0, "time-of-flight step must be positive, got {step}");
        ensure_config!(
            min_beta > 0.0 && min_beta < 1.0,
            "velocity floor must lie in (0, 1), got {min_beta}"
        );

        let depths = depth_grid(length, step);
        let v_floor = min_beta * SPEED_OF_LIGHT;
        let inverse_velocity = depths
            .iter()
            .map(|&z| {
                let v = kinematics.velocity_at(provider.energy_at(z)?);
                Ok(1.0 / v.max(v_floor))
            })
            .collect::<PgResult<Vec<f64>>>()?;

        let mut times = Vec::with_capacity(depths.len());
        times.push(0.0);
        for i in 1..depths.len() {
            let dz = depths[i] - depths[i - 1];
            let dt = 0.5 * (inverse_velocity[i - 1] + inverse_velocity[i]) * dz;
            times.push(times[i - 1] + dt);
        }

        let floored = inverse_velocity
            .iter()
            .filter(|&&iv| iv >= 1.0 / v_floor)
            .count();
        debug!(
            points = depths.len(),
            floored,
            total_ns = times[times.len() - 1],
            "built proton time-of-flight table"
        );

        Ok(Self {
            depths,
            times,
            step,
            min_beta,
        })
    }

    /// Transit time in ns at `depth` mm, linearly interpolated.
    pub fn time_at(&self, depth: f64) -> PgResult<f64> {
        let (min, max) = self.depth_range();
        if !(min..=max).contains(&depth) {
            return Err(PgError::Domain { depth, min, max });
        }
        Ok(self.interpolate(depth))
    }

    /// Transit time for a depth that is known to be inside the table.
    ///
    /// Used by the sampler and reconstructor, whose grids are validated
    /// against the phantom length at setup. A miss is a grid construction bug.
    pub(crate) fn time_within(&self, depth: f64) -> f64 {
        let (min, max) = self.depth_range();
        assert!(
            (min..=max).contains(&depth),
            "grid depth {depth} mm escaped the time-of-flight table [{min}, {max}] mm"
        );
        self.interpolate(depth)
    }

    fn interpolate(&self, depth: f64) -> f64 {
        let i = self.depths.partition_point(|&z| z <= depth);
        if i == 0 {
            return self.times[0];
        }
        if i == self.depths.len() || self.depths[i - 1] == depth {
            return self.times[i - 1];
        }
        let (z0, z1) = (self.depths[i - 1], self.depths[i]);
        let (t0, t1) = (self.times[i - 1], self.times[i]);
        t0 + (depth - z0) / (z1 - z0) * (t1 - t0)
    }

    /// Transit time at grid index `i`.
    pub fn time_at_index(&self, i: usize) -> f64 {
        self.times[i]
    }

    pub fn depths(&self) -> &[f64] {
        &self.depths
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Integration step in mm.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Velocity floor used for the integrand, as a fraction of `c`.
    pub fn min_beta(&self) -> f64 {
        self.min_beta
    }

    pub fn depth_range(&self) -> (f64, f64) {
        (self.depths[0], self.depths[self.depths.len() - 1])
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }
}
