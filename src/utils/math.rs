//! Additional math helpers layered on top of `glam`.

use std::f64::consts::TAU;

use glam::DVec2;

/// Angle of `v` in radians, normalized to `[0, 2π)`.
pub fn normalized_angle(v: DVec2) -> f64 {
    let angle = v.y.atan2(v.x).rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if angle >= TAU {
        0.0
    } else {
        angle
    }
}

/// Counter-clockwise angular distance from `from` to `to`, in `[0, 2π)`.
pub fn ccw_sweep(from: f64, to: f64) -> f64 {
    (to - from).rem_euclid(TAU)
}

/// Center of the circle through three points, or `None` when they are (nearly) collinear.
pub fn circumcenter(a: DVec2, b: DVec2, c: DVec2) -> Option<DVec2> {
    let ab = b - a;
    let ac = c - a;
    let det = 2.0 * ab.perp_dot(ac);
    let scale = ab.length_squared().max(ac.length_squared());
    if scale == 0.0 || det.abs() <= 1e-12 * scale {
        return None;
    }

    let ab2 = ab.length_squared();
    let ac2 = ac.length_squared();
    let offset = DVec2::new(ac.y * ab2 - ab.y * ac2, ab.x * ac2 - ac.x * ab2) / det;
    Some(a + offset)
}

/// Arithmetic mean of a set of points, `None` when empty.
pub fn mean(points: impl IntoIterator<Item = DVec2>) -> Option<DVec2> {
    let (sum, count) = points
        .into_iter()
        .fold((DVec2::ZERO, 0usize), |(sum, count), p| (sum + p, count + 1));
    (count > 0).then(|| sum / count as f64)
}
