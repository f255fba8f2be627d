use crate::error::{PgResult, ensure_config};
use crate::geom::point::Point;
use crate::sim::beam::SPEED_OF_LIGHT;

/// Position, size and attenuation seen by a single small detector.
///
/// The phantom occupies `z ∈ [0, L]` on the beam axis. The detector sits at
/// `z_det = L + Δ`, laterally offset by `y`. Distances are in mm.
#[derive(Debug, Clone, Copy)]
pub struct DetectionGeometry {
    /// Detector centre in the beam plane.
    pub detector: Point,
    /// Detector area in mm^2.
    pub area: f64,
    /// Linear attenuation coefficient in 1/mm.
    pub attenuation: f64,
}

impl DetectionGeometry {
    /// Builds the geometry from configuration units.
    ///
    /// - `phantom_length`, `lateral_offset`, `distance_beyond`: mm
    /// - `area_cm2`: detector area in cm^2
    /// - `mu_per_cm`: attenuation coefficient in 1/cm
    pub fn new(
        phantom_length: f64,
        lateral_offset: f64,
        distance_beyond: f64,
        area_cm2: f64,
        mu_per_cm: f64,
    ) -> PgResult<Self> {
        ensure_config!(
            phantom_length > 0.0,
            "phantom length must be positive, got {phantom_length}"
        );
        ensure_config!(area_cm2 > 0.0, "detector area must be positive, got {area_cm2}");
        ensure_config!(
            distance_beyond > 0.0,
            "detector distance beyond the phantom must be positive, got {distance_beyond}"
        );
        ensure_config!(
            lateral_offset.is_finite(),
            "detector lateral offset must be finite"
        );
        ensure_config!(
            mu_per_cm >= 0.0,
            "attenuation coefficient must be non-negative, got {mu_per_cm}"
        );
        Ok(Self {
            detector: Point::new(phantom_length + distance_beyond, lateral_offset),
            area: area_cm2 * 100.0,
            attenuation: mu_per_cm / 10.0,
        })
    }

    /// Distance `d(z)` in mm from the on-axis emission depth `z` to the detector.
    pub fn distance(&self, z: f64) -> f64 {
        Point::on_axis(z).distance_to(&self.detector)
    }

    /// Fraction of the full sphere covered by the detector, `A / (4 pi d^2)`.
    pub fn solid_angle_fraction(&self, z: f64) -> f64 {
        let d = self.distance(z);
        self.area / (4.0 * std::f64::consts::PI * d * d)
    }

    /// Survival probability of a photon travelling to the detector, `exp(-mu d)`.
    pub fn transmission(&self, z: f64) -> f64 {
        (-self.attenuation * self.distance(z)).exp()
    }

    /// Probability that a photon emitted at `z` is detected, `Omega(z) * tau(z)`.
    pub fn detection_probability(&self, z: f64) -> f64 {
        self.solid_angle_fraction(z) * self.transmission(z)
    }

    /// Gamma flight time to the detector in ns.
    pub fn gamma_time_of_flight(&self, z: f64) -> f64 {
        self.distance(z) / SPEED_OF_LIGHT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> DetectionGeometry {
        DetectionGeometry::new(300.0, 50.0, 50.0, 25.0, 0.08).unwrap()
    }

    #[test]
    fn test_distance() {
        let g = reference();
        assert!((g.distance(300.0) - 50.0 * 2.0_f64.sqrt()).abs() < 1e-12);
        assert!((g.distance(0.0) - 350.0_f64.hypot(50.0)).abs() < 1e-12);
        assert!(g.distance(0.0) > g.distance(150.0));
    }

    #[test]
    fn test_solid_angle_and_attenuation() {
        let g = reference();
        let d = g.distance(150.0);
        let omega = 2500.0 / (4.0 * std::f64::consts::PI * d * d);
        assert!((g.solid_angle_fraction(150.0) - omega).abs() < 1e-15);
        let tau = (-0.008 * d).exp();
        assert!((g.transmission(150.0) - tau).abs() < 1e-15);
        assert!((g.detection_probability(150.0) - omega * tau).abs() < 1e-15);
    }

    #[test]
    fn test_probability_grows_towards_detector() {
        let g = reference();
        let mut prev = 0.0;
        for i in 0..=300 {
            let p = g.detection_probability(i as f64);
            assert!(p > prev && p < 1.0);
            prev = p;
        }
    }

    #[test]
    fn test_gamma_time_of_flight() {
        let g = reference();
        let t = g.gamma_time_of_flight(300.0);
        assert!((t - 70.7106781 / 299.792458).abs() < 1e-8);
    }

    #[test]
    fn test_no_attenuation() {
        let g = DetectionGeometry::new(300.0, 50.0, 50.0, 25.0, 0.0).unwrap();
        assert_eq!(g.transmission(10.0), 1.0);
    }

    #[test]
    fn test_rejects_bad_geometry() {
        assert!(DetectionGeometry::new(300.0, 50.0, 50.0, 0.0, 0.08).is_err());
        assert!(DetectionGeometry::new(300.0, 50.0, -5.0, 25.0, 0.08).is_err());
        assert!(DetectionGeometry::new(300.0, 50.0, 0.0, 25.0, 0.08).is_err());
        assert!(DetectionGeometry::new(0.0, 50.0, 50.0, 25.0, 0.08).is_err());
        assert!(DetectionGeometry::new(300.0, 50.0, 50.0, 25.0, -0.1).is_err());
    }
}
