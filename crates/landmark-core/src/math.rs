//! Shared math utilities.

/// Numerically stable softmax in place.
pub fn softmax_in_place(v: &mut [f32]) {
    let max = v.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return;
    }
    let mut sum = 0.0;
    for x in v.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }
    if sum > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= sum;
        }
    }
}

/// Clamp a score into [0, 1], mapping NaN to 0.
pub fn clamp_unit(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
