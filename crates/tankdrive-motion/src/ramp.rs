//! Power ramp strategies used by drive maneuvers.

use tankdrive_hal::Clock;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::RampError;
use crate::pid::Pid;
use crate::quad_ramp::QuadRamp;

/// How maneuver power is shaped over the progress toward a target.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(tag = "kind", rename_all = "snake_case")
)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RampProfile {
    /// Proportional-derivative controller on the remaining distance.
    Pd {
        /// Proportional gain.
        kp: f64,
        /// Derivative gain.
        kd: f64,
    },
    /// Quadratic ramp through three boundary powers.
    Quad {
        /// Power at the start.
        initial: f64,
        /// Power at the vertex.
        peak: f64,
        /// Power on arrival.
        final_power: f64,
    },
}

impl RampProfile {
    /// Select a profile from three positional constants.
    ///
    /// A zero first constant selects PD with `kp = in2`, `kd = in3`; any other
    /// value selects a quadratic ramp `(initial = in1, peak = in2, final = in3)`.
    pub fn from_constants(in1: f64, in2: f64, in3: f64) -> Self {
        if in1 == 0.0 {
            RampProfile::Pd { kp: in2, kd: in3 }
        } else {
            RampProfile::Quad { initial: in1, peak: in2, final_power: in3 }
        }
    }

    /// Build a ramp spanning `span` units of progress.
    ///
    /// # Errors
    ///
    /// Any [`RampError`] from [`QuadRamp::new`]. PD profiles always build.
    pub fn build<C: Clock>(&self, clock: C, span: f64) -> Result<Ramp<C>, RampError> {
        match *self {
            RampProfile::Pd { kp, kd } => Ok(Ramp::Pd(Pid::new(clock, span, kp, 0.0, kd))),
            RampProfile::Quad { initial, peak, final_power } => {
                Ok(Ramp::Quad(QuadRamp::new(span, initial, peak, final_power)?))
            }
        }
    }
}

/// A built ramp. Evaluated with non-negative progress toward its span.
#[derive(Debug, Clone)]
pub enum Ramp<C: Clock> {
    /// PD controller targeting the span.
    Pd(Pid<C>),
    /// Quadratic over the span.
    Quad(QuadRamp),
}

impl<C: Clock> Ramp<C> {
    /// Power for the given progress.
    pub fn evaluate(&mut self, progress: f64) -> f64 {
        match self {
            Ramp::Pd(pid) => pid.evaluate(progress),
            Ramp::Quad(quad) => quad.evaluate(progress),
        }
    }
}
