use super::Point2d;
use cgmath::prelude::*;

/// The value standing in for an infinite delay.
///
/// Delays and their variances are clamped to this so that rankings and
/// comparisons downstream never see NaN or infinity.
pub const INFINITE_DELAY: f64 = 1.0e10;

/// Clamps a delay-like quantity into `[0, INFINITE_DELAY]`, mapping NaN to infinity.
pub fn clamp_delay(value: f64) -> f64 {
    if value.is_nan() {
        INFINITE_DELAY
    } else {
        value.clamp(0.0, INFINITE_DELAY)
    }
}

/// Returns true if `value` is within `tolerance` of zero.
#[inline]
pub fn is_zero(value: f64, tolerance: f64) -> bool {
    value.abs() < tolerance
}

/// Computes the angle, in radians, between the edge `tail -> head`
/// and the direction from `tail` towards `target`, using the law of cosines.
///
/// If any two of the points coincide the angle is zero.
pub fn angle_towards(tail: Point2d, head: Point2d, target: Point2d) -> f64 {
    let a = tail.distance(head);
    let b = tail.distance(target);
    let c = head.distance(target);
    if a == 0.0 || b == 0.0 {
        return 0.0;
    }
    let cos = (a * a + b * b - c * c) / (2.0 * a * b);
    cos.clamp(-1.0, 1.0).acos()
}
