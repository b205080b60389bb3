//! Tuning for drive maneuvers and odometry.

use tankdrive_hal::Power;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::angle::AngleUnit;
use crate::ramp::RampProfile;

/// How odometry uses the gyro.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GyroCorrection {
    /// Heading comes from wheel travel only.
    None,
    /// Heading comes from the gyro; position from wheel arcs.
    #[default]
    Medium,
    /// Wheel distances are also rescaled so their differential matches the
    /// gyro's heading change.
    Full,
}

/// Straight-line correction requested for a drive maneuver.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriveCorrection {
    /// No correction.
    None,
    /// Hold the gyro heading.
    Gyro,
    /// Hold the left/right encoder difference at zero.
    Encoder,
    /// Encoder correction when both sides have encoders, otherwise none.
    #[default]
    Auto,
}

/// Gains of the straight-line correction controller.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain.
    pub ki: f64,
    /// Derivative gain.
    pub kd: f64,
}

impl Default for CorrectionGains {
    fn default() -> Self {
        CorrectionGains { kp: 0.25, ki: 0.25, kd: 0.25 }
    }
}

/// Parameters of a turn-in-place maneuver.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnSettings {
    /// Power profile over the angle turned.
    pub ramp: RampProfile,
    /// Unit of the requested angle.
    pub unit: AngleUnit,
    /// Measure progress with the gyro rather than encoders.
    pub use_gyro: bool,
    /// Reverse power applied when the target is reached.
    pub brake_power: Power,
    /// Total time spent braking and settling after arrival (ms).
    pub wait_at_end_ms: u32,
    /// Portion of `wait_at_end_ms` spent braking (ms).
    pub brake_duration_ms: u32,
    /// The turn ends early after this long without progress (ms).
    pub timeout_ms: u32,
}

impl Default for TurnSettings {
    fn default() -> Self {
        TurnSettings {
            ramp: RampProfile::Quad { initial: 50.0, peak: 127.0, final_power: -15.0 },
            unit: AngleUnit::Degrees,
            use_gyro: true,
            brake_power: 20,
            wait_at_end_ms: 100,
            brake_duration_ms: 100,
            timeout_ms: 1000,
        }
    }
}

/// Parameters of a straight-line drive maneuver.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveSettings {
    /// Power profile over the distance travelled.
    pub ramp: RampProfile,
    /// Straight-line correction strategy.
    pub correction: DriveCorrection,
    /// Correction controller gains.
    pub correction_gains: CorrectionGains,
    /// Measure distance in encoder ticks instead of distance units.
    pub raw_value: bool,
    /// Speed (units or ticks per second) below which a sample counts as stalled.
    pub min_speed: f64,
    /// The drive ends after stalling for this long (ms).
    pub timeout_ms: u32,
    /// Reverse power applied when the target is reached.
    pub brake_power: Power,
    /// Total time spent braking and settling after arrival (ms).
    pub wait_at_end_ms: u32,
    /// Minimum time between control updates (ms).
    pub sample_time_ms: u32,
    /// Portion of `wait_at_end_ms` spent braking (ms).
    pub brake_duration_ms: u32,
}

impl Default for DriveSettings {
    fn default() -> Self {
        DriveSettings {
            ramp: RampProfile::Quad { initial: 40.0, peak: 120.0, final_power: -15.0 },
            correction: DriveCorrection::Auto,
            correction_gains: CorrectionGains::default(),
            raw_value: false,
            min_speed: 10.0,
            timeout_ms: 1000,
            brake_power: 40,
            wait_at_end_ms: 100,
            sample_time_ms: 50,
            brake_duration_ms: 100,
        }
    }
}
