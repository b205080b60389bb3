//! Small numeric helpers shared across controllers.

use tankdrive_hal::{POWER_MAX, Power};

/// Sign of `x` as `-1.0`, `0.0` or `1.0`.
pub fn sgn(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Clamp `x` to `[min, max]`.
pub fn limit(x: f64, min: f64, max: f64) -> f64 {
    if x > max {
        max
    } else if x < min {
        min
    } else {
        x
    }
}

/// Saturate a computed power to the actuator range. NaN maps to 0.
pub(crate) fn to_power(x: f64) -> Power {
    if x.is_nan() {
        return 0;
    }
    limit(x, -(POWER_MAX as f64), POWER_MAX as f64) as Power
}
