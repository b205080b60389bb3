//! Error types for the motion core.
//!
//! Control paths degrade silently (missing sensors read as zero, unsatisfiable
//! correction requests are downgraded). Only configuration that cannot produce
//! a well-defined trajectory is rejected.

use core::fmt;

/// Errors raised while solving a quadratic ramp.
#[derive(Debug, Clone, PartialEq)]
pub enum RampError {
    /// The ramp would span zero distance.
    ZeroSpan(&'static str),
    /// The boundary values admit no quadratic peaking at the requested power.
    IllPosed(&'static str),
    /// A target or boundary value is NaN or infinite.
    NonFinite(&'static str),
}

impl fmt::Display for RampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RampError::ZeroSpan(msg) => write!(f, "Zero ramp span: {}", msg),
            RampError::IllPosed(msg) => write!(f, "Ill-posed ramp: {}", msg),
            RampError::NonFinite(msg) => write!(f, "Non-finite ramp input: {}", msg),
        }
    }
}

impl core::error::Error for RampError {}

/// Errors raised when arming a drive maneuver. Nothing is armed when one is
/// returned.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionError {
    /// The requested ramp could not be built.
    Ramp(RampError),
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionError::Ramp(err) => write!(f, "Cannot arm maneuver: {}", err),
        }
    }
}

impl core::error::Error for MotionError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            MotionError::Ramp(err) => Some(err),
        }
    }
}

impl From<RampError> for MotionError {
    fn from(err: RampError) -> Self {
        MotionError::Ramp(err)
    }
}
