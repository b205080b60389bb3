//! Angle units and conversions.
//!
//! Gyros report headings in raw units of a tenth of a degree; callers work in
//! degrees or radians. Every conversion goes through degrees.

use core::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unit an angle is expressed in.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AngleUnit {
    /// Degrees.
    #[default]
    Degrees,
    /// Radians.
    Radians,
    /// Gyro units, ten per degree.
    Raw,
}

/// Convert `angle` from one unit to another.
///
/// # Arguments
///
/// * `angle`: The angle to convert.
/// * `from`: Unit `angle` is expressed in.
/// * `to`: Unit of the result.
///
/// # Returns
///
/// The same angle expressed in `to`.
pub fn convert_angle(angle: f64, from: AngleUnit, to: AngleUnit) -> f64 {
    if from == to {
        return angle;
    }

    let degrees = match from {
        AngleUnit::Degrees => angle,
        AngleUnit::Radians => angle * 180.0 / PI,
        AngleUnit::Raw => angle / 10.0,
    };

    match to {
        AngleUnit::Degrees => degrees,
        AngleUnit::Radians => degrees * PI / 180.0,
        AngleUnit::Raw => degrees * 10.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_convert_angle() {
        assert!((convert_angle(90.0, AngleUnit::Degrees, AngleUnit::Radians) - PI / 2.0).abs() < EPSILON);
        assert!((convert_angle(PI, AngleUnit::Radians, AngleUnit::Degrees) - 180.0).abs() < EPSILON);
        assert!((convert_angle(450.0, AngleUnit::Raw, AngleUnit::Degrees) - 45.0).abs() < EPSILON);
        assert!((convert_angle(PI / 4.0, AngleUnit::Radians, AngleUnit::Raw) - 450.0).abs() < EPSILON);
        assert!((convert_angle(-12.5, AngleUnit::Degrees, AngleUnit::Degrees) + 12.5).abs() < EPSILON);
    }
}
