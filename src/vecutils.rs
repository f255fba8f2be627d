//! Vector utility functions like max(), argmax(), depth grids and trapezoid sums
/// Largest element, or `-inf` for an empty slice.
pub fn max(vec: &[f64]) -> f64 {
    vec.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
}

/// Smallest element, or `+inf` for an empty slice.
pub fn min(vec: &[f64]) -> f64 {
    vec.iter().cloned().fold(f64::INFINITY, f64::min)
}

/// Index of the first largest element.
pub fn argmax(vec: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &x) in vec.iter().enumerate() {
        match best {
            Some((_, b)) if x <= b => {}
            _ => best = Some((i, x)),
        }
    }
    best.map(|(i, _)| i)
}

/// Evenly spaced depths `0, step, 2*step, ...` closed by `length` itself.
///
/// When `step` does not divide `length` the last interval is shorter, so the
/// grid always spans `[0, length]`. A multiple within `step * 1e-9` of
/// `length` is replaced by it: a 300 mm phantom with a 1 mm step yields
/// exactly 301 points ending at 300.0. Callers must pass `length >= 0` and
/// `step > 0`.
pub fn depth_grid(length: f64, step: f64) -> Vec<f64> {
    let tol = step * 1e-9;
    let n = (length / step + 1e-9).floor() as usize;
    let mut grid: Vec<f64> = (0..=n)
        .map(|i| i as f64 * step)
        .take_while(|&z| z < length - tol)
        .collect();
    grid.push(length);
    grid
}

/// Trapezoidal integral of `ys` sampled at `xs`.
pub fn trapezoid(xs: &[f64], ys: &[f64]) -> f64 {
    xs.windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| 0.5 * (y[0] + y[1]) * (x[1] - x[0]))
        .sum()
}
