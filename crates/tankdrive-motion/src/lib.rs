#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` motion-control core for differential-drive robots."]
#![doc = ""]
#![doc = "This crate provides a PID controller, a closed-form quadratic power ramp,"]
#![doc = "soft-limited actuator groups and a two-sided drive with polled turn/drive"]
#![doc = "maneuvers and arc-based odometry. Hardware is reached only through the"]
#![doc = "`tankdrive-hal` traits, so every controller is polled and never blocks"]
#![doc = "unless a blocking wrapper is called explicitly."]

extern crate alloc;

pub mod angle;
pub use angle::{AngleUnit, convert_angle};

pub mod error;
pub use error::{MotionError, RampError};

pub mod input;
pub use input::{ButtonInput, InputStrategy, JoystickInput};

pub mod motor_group;
pub use motor_group::{MotorGroup, SoftLimits};

pub mod parallel_drive;
pub use parallel_drive::{DEFAULT_POSITION_SAMPLE_MS, EncoderConfig, ManeuverState, ParallelDrive, Pose, Side};

pub mod pid;
pub use pid::Pid;

pub mod quad_ramp;
pub use quad_ramp::QuadRamp;

pub mod ramp;
pub use ramp::{Ramp, RampProfile};

pub mod settings;
pub use settings::{CorrectionGains, DriveCorrection, DriveSettings, GyroCorrection, TurnSettings};

pub mod util;
pub use util::{limit, sgn};
