use std::fmt;

/// A point in the beam plane.
///
/// `z` runs along the beam axis (0 at the phantom entrance), `y` is the
/// lateral offset from the axis. Both in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub z: f64,
    pub y: f64,
}

impl Point {
    pub fn new(z: f64, y: f64) -> Self {
        Self { z, y }
    }

    /// A point on the beam axis at depth `z`.
    pub fn on_axis(z: f64) -> Self {
        Self { z, y: 0.0 }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.z - other.z).hypot(self.y - other.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = f.precision().unwrap_or(2); // Default 2 decimals
        write!(f, "Point(z={:.prec$}, y={:.prec$})", self.z, self.y, prec = prec)
    }
}
