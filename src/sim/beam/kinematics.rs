/// Speed of light in mm/ns.
pub const SPEED_OF_LIGHT: f64 = 299.792458;

/// Proton rest energy m_p c^2 in MeV.
pub const PROTON_REST_ENERGY: f64 = 938.3;

/// Relativistic energy → velocity conversion for a proton.
#[derive(Debug, Clone, Copy)]
pub struct KinematicsModel {
    /// Rest energy in MeV.
    pub rest_energy: f64,
}

impl KinematicsModel {
    pub fn proton() -> Self {
        Self {
            rest_energy: PROTON_REST_ENERGY,
        }
    }

    /// Velocity relative to light, `beta = sqrt(1 - (m c^2 / (E + m c^2))^2)`.
    ///
    /// `energy` is the kinetic energy in MeV. No clamping: a stopped proton
    /// (`E = 0`) has `beta = 0`.
    pub fn beta(&self, energy: f64) -> f64 {
        debug_assert!(energy >= 0.0, "negative kinetic energy {energy}");
        let ratio = self.rest_energy / (energy + self.rest_energy);
        (1.0 - ratio * ratio).sqrt()
    }

    /// Speed in mm/ns.
    pub fn velocity_at(&self, energy: f64) -> f64 {
        self.beta(energy) * SPEED_OF_LIGHT
    }
}

impl Default for KinematicsModel {
    fn default() -> Self {
        Self::proton()
    }
}
