use serde::{Deserialize, Serialize};

use crate::error::{PgError, PgResult, ensure_config};
use crate::vecutils::depth_grid;

/// Bragg–Kleeman coefficient for water in mm / MeV^p.
pub const WATER_ALPHA: f64 = 0.022;

/// Bragg–Kleeman exponent for water.
pub const WATER_P: f64 = 1.77;

/// Read-only depth → kinetic energy lookup.
///
/// Implementations must be shareable across worker threads.
pub trait RangeEnergyProvider: Send + Sync {
    /// Kinetic energy in MeV of a beam proton at `depth` mm.
    ///
    /// Fails with [`PgError::Domain`] outside [`Self::depth_range`].
    fn energy_at(&self, depth: f64) -> PgResult<f64>;

    /// Inclusive `(min, max)` depth domain in mm.
    fn depth_range(&self) -> (f64, f64);
}

/// A tabulated (depth, energy) sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeEnergyPoint {
    /// Depth in mm.
    pub depth: f64,
    /// Kinetic energy in MeV.
    pub energy: f64,
}

impl RangeEnergyPoint {
    pub fn new(depth: f64, energy: f64) -> Self {
        Self { depth, energy }
    }
}

/// Piecewise-linear range-energy table.
#[derive(Debug, Clone)]
pub struct RangeEnergyTable {
    points: Vec<RangeEnergyPoint>,
}

impl RangeEnergyTable {
    /// Builds a table after checking it is usable as a lookup.
    ///
    /// Requires at least two points, finite non-negative values, strictly
    /// increasing depths and non-increasing energies.
    pub fn new(points: Vec<RangeEnergyPoint>) -> PgResult<Self> {
        ensure_config!(
            points.len() >= 2,
            "range-energy table needs at least 2 points, got {}",
            points.len()
        );
        for (i, p) in points.iter().enumerate() {
            ensure_config!(
                p.depth.is_finite() && p.energy.is_finite() && p.energy >= 0.0,
                "range-energy point {i} is invalid: depth={}, energy={}",
                p.depth,
                p.energy
            );
        }
        for (i, w) in points.windows(2).enumerate() {
            ensure_config!(
                w[1].depth > w[0].depth,
                "range-energy depths must be strictly increasing (rows {i} and {})",
                i + 1
            );
            ensure_config!(
                w[1].energy <= w[0].energy,
                "range-energy energies must not increase with depth (rows {i} and {})",
                i + 1
            );
        }
        Ok(Self { points })
    }

    /// Residual proton energy along a water phantom from the Bragg–Kleeman rule.
    ///
    /// With `R = alpha * E^p`, a proton of CSDA range `range` has residual
    /// range `range - z` at depth `z`, so `E(z) = ((range - z) / alpha)^(1/p)`
    /// and zero past the range. Samples every `step` mm from 0 to `max_depth`.
    pub fn bragg_kleeman_water(range: f64, max_depth: f64, step: f64) -> PgResult<Self> {
        ensure_config!(range > 0.0, "beam range must be positive, got {range}");
        ensure_config!(max_depth > 0.0, "table depth must be positive, got {max_depth}");
        ensure_config!(step > 0.0, "table step must be positive, got {step}");

        let points = depth_grid(max_depth, step)
            .into_iter()
            .map(|z| {
                let residual = range - z;
                let energy = if residual > 0.0 {
                    (residual / WATER_ALPHA).powf(1.0 / WATER_P)
                } else {
                    0.0
                };
                RangeEnergyPoint::new(z, energy)
            })
            .collect();
        Self::new(points)
    }

    pub fn points(&self) -> &[RangeEnergyPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl RangeEnergyProvider for RangeEnergyTable {
    fn energy_at(&self, depth: f64) -> PgResult<f64> {
        let (min, max) = self.depth_range();
        if !(min..=max).contains(&depth) {
            return Err(PgError::Domain { depth, min, max });
        }

        // First point strictly deeper than `depth`
        let i = self.points.partition_point(|p| p.depth <= depth);
        if i == 0 {
            return Ok(self.points[0].energy);
        }
        let lo = self.points[i - 1];
        if lo.depth == depth || i == self.points.len() {
            return Ok(lo.energy);
        }
        let hi = self.points[i];
        let frac = (depth - lo.depth) / (hi.depth - lo.depth);
        Ok(lo.energy + frac * (hi.energy - lo.energy))
    }

    fn depth_range(&self) -> (f64, f64) {
        (self.points[0].depth, self.points[self.points.len() - 1].depth)
    }
}
