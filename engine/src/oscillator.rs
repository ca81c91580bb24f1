//! Shared oscillator that alternates the flock between attraction and repulsion.

/// Fractional position of `elapsed_seconds + offset_seconds` within the period.
///
/// Always lies in `[0, 1)`. Computed in double precision so long sessions do
/// not lose phase resolution.
#[must_use]
pub fn clock_percentage(elapsed_seconds: f64, offset_seconds: f64, period_seconds: f64) -> f32 {
    if period_seconds <= 0.0 {
        return 0.0;
    }

    let raw = (elapsed_seconds + offset_seconds) / period_seconds;
    let percentage = (raw - raw.floor()) as f32;
    if (0.0..1.0).contains(&percentage) {
        percentage
    } else {
        0.0
    }
}

/// Smoother-step easing `6t⁵ - 15t⁴ + 10t³` over `[0, 1]`.
#[must_use]
pub fn smootherstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// Unbiased oscillation in `[-1, 1]` for a clock percentage.
///
/// Starts at -1, eases up to +1 at half the period and back down, with zero
/// slope at both extremes.
#[must_use]
pub fn oscillation(clock_percentage: f32) -> f32 {
    let triangle = 1.0 - (2.0 * clock_percentage - 1.0).abs();
    2.0 * smootherstep(triangle) - 1.0
}

/// Attraction (positive) or repulsion (negative) factor for a clock percentage.
#[must_use]
pub fn attraction_repulsion_factor(clock_percentage: f32, bias: f32) -> f32 {
    (oscillation(clock_percentage) + bias).clamp(-1.0, 1.0)
}
