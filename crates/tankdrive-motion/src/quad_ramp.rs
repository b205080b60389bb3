//! Closed-form quadratic power ramp.

use libm::{fabs, sqrt};

use crate::error::RampError;

/// Power as a quadratic function of progress, `a·p² + b·p + c`.
///
/// Solved once from boundary values so that `f(0)` is the initial power,
/// `f(span)` the final power and the vertex sits at the peak power, where
/// `span = |target|`. Progress fed to the ramp is a magnitude; callers apply
/// direction separately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadRamp {
    a: f64,
    b: f64,
    c: f64,
}

impl QuadRamp {
    /// Solve the ramp coefficients.
    ///
    /// # Arguments
    ///
    /// * `target`: Distance or angle the ramp spans. Only its magnitude is used.
    /// * `initial`: Power at zero progress.
    /// * `peak`: Power at the vertex.
    /// * `final_power`: Power at `|target|`.
    ///
    /// # Errors
    ///
    /// * [`RampError::NonFinite`] if any input is NaN or infinite.
    /// * [`RampError::ZeroSpan`] if `target` is zero.
    /// * [`RampError::IllPosed`] if `initial` and `final_power` lie on opposite
    ///   sides of `peak`, which leaves no real vertex at `peak`.
    pub fn new(target: f64, initial: f64, peak: f64, final_power: f64) -> Result<Self, RampError> {
        if !(target.is_finite() && initial.is_finite() && peak.is_finite() && final_power.is_finite()) {
            return Err(RampError::NonFinite("target and boundary powers must be finite"));
        }

        let span = fabs(target);
        if span == 0.0 {
            return Err(RampError::ZeroSpan("target must be nonzero"));
        }

        let product = (final_power - peak) * (initial - peak);
        if product < 0.0 {
            return Err(RampError::IllPosed("initial and final power must lie on the same side of peak"));
        }

        let span2 = span * span;
        let span4 = span2 * span2;
        let a = (span2 * (final_power + initial - 2.0 * peak) - 2.0 * sqrt(span4 * product)) / span4;
        let b = (final_power - initial) / span - a * span;

        Ok(QuadRamp { a, b, c: initial })
    }

    /// Power at `progress`.
    pub fn evaluate(&self, progress: f64) -> f64 {
        self.a * progress * progress + self.b * progress + self.c
    }

    /// Coefficients as `(a, b, c)`.
    pub fn coefficients(&self) -> (f64, f64, f64) {
        (self.a, self.b, self.c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-9;

    fn vertex(ramp: &QuadRamp) -> (f64, f64) {
        let (a, b, _) = ramp.coefficients();
        let p = -b / (2.0 * a);
        (p, ramp.evaluate(p))
    }

    #[test]
    fn test_boundary_conditions() {
        for &(target, initial, peak, final_power) in &[
            (24.0, 40.0, 120.0, -15.0),
            (90.0, 50.0, 127.0, -15.0),
            (3.5, 0.0, 100.0, 20.0),
            (1000.0, 127.0, 127.0, 30.0),
        ] {
            let ramp = QuadRamp::new(target, initial, peak, final_power).unwrap();
            assert!((ramp.evaluate(0.0) - initial).abs() < 1e-6);
            assert!((ramp.evaluate(target) - final_power).abs() < 1e-6);
        }
    }

    #[test]
    fn test_vertex_is_peak_inside_span() {
        let ramp = QuadRamp::new(90.0, 50.0, 127.0, -15.0).unwrap();
        let (p, power) = vertex(&ramp);
        assert!(p > 0.0 && p < 90.0);
        assert!((power - 127.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_target_uses_magnitude() {
        let forward = QuadRamp::new(36.0, 40.0, 120.0, -15.0).unwrap();
        let backward = QuadRamp::new(-36.0, 40.0, 120.0, -15.0).unwrap();
        assert_eq!(forward, backward);
        assert!((backward.evaluate(36.0) + 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_degenerate_inputs() {
        assert!(matches!(QuadRamp::new(0.0, 40.0, 120.0, -15.0), Err(RampError::ZeroSpan(_))));
        assert!(matches!(QuadRamp::new(10.0, 40.0, 30.0, 10.0), Err(RampError::IllPosed(_))));
        assert!(matches!(QuadRamp::new(f64::NAN, 40.0, 120.0, -15.0), Err(RampError::NonFinite(_))));
        assert!(matches!(QuadRamp::new(10.0, 40.0, f64::INFINITY, -15.0), Err(RampError::NonFinite(_))));
    }

    #[test]
    fn test_flat_ramp() {
        let ramp = QuadRamp::new(10.0, 60.0, 60.0, 60.0).unwrap();
        for p in [0.0, 2.5, 7.0, 10.0] {
            assert!((ramp.evaluate(p) - 60.0).abs() < EPSILON);
        }
    }
}
