//! Two-sided differential drive.
//!
//! [`ParallelDrive`] owns a left and a right [`MotorGroup`] plus an optional
//! gyro. It maps operator input to side powers, tracks the robot pose from
//! wheel arcs, and runs turn/drive maneuvers as a polled state machine.
//!
//! The drive owns every encoder reset it performs. Travel read before a reset
//! is kept in a ledger with one slot per consumer (odometry and the running
//! maneuver), so [`ParallelDrive::update_position`] and
//! [`ParallelDrive::execute_maneuver`] can be interleaved freely.

use alloc::vec::Vec;

use tankdrive_hal::{AxisId, GyroId, Hardware, MotorPort, Power, Timer};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::input::{InputStrategy, JoystickInput};
use crate::motor_group::MotorGroup;
use crate::settings::GyroCorrection;
use crate::util::to_power;

mod maneuver;
mod odometry;
mod sensing;

use maneuver::Maneuver;
pub use maneuver::ManeuverState;
pub use odometry::Pose;

/// Default minimum time between odometry updates (ms).
pub const DEFAULT_POSITION_SAMPLE_MS: u32 = 20;

/// Which encoders feed default distance reads.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncoderConfig {
    /// No encoder attached, or defer to the drive's configuration when passed
    /// as an argument.
    #[default]
    Unassigned,
    /// Left side only.
    Left,
    /// Right side only.
    Right,
    /// Mean of both sides.
    Average,
}

/// One side of the drive.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Left wheels.
    Left,
    /// Right wheels.
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DriveInput {
    Tank,
    Arcade { move_axis: AxisId, turn_axis: AxisId, coeff: f64 },
}

/// Signed encoder ticks read but not yet consumed, per consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct EncoderLedger {
    odometry: (f64, f64),
    maneuver: (f64, f64),
}

/// A differential drive built from two motor groups.
#[derive(Debug)]
pub struct ParallelDrive<H: Hardware + Clone> {
    hw: H,
    left: MotorGroup<H>,
    right: MotorGroup<H>,
    input: DriveInput,
    gyro: Option<GyroId>,
    angle_offset: f64,
    encoder_config: EncoderConfig,
    ledger: EncoderLedger,
    pose: Pose,
    width: f64,
    gyro_correction: GyroCorrection,
    position_timer: Timer,
    position_sample_ms: u32,
    maneuver: Option<Maneuver<H>>,
}

impl<H: Hardware + Clone> ParallelDrive<H> {
    /// Create a drive with no sensors, tank input unconfigured and zero width.
    ///
    /// # Arguments
    ///
    /// * `hw`: Hardware handle shared by both sides.
    /// * `left_motors`, `right_motors`: Motor ports of each side.
    pub fn new(hw: H, left_motors: Vec<MotorPort>, right_motors: Vec<MotorPort>) -> Self {
        let left = MotorGroup::new(hw.clone(), left_motors);
        let right = MotorGroup::new(hw.clone(), right_motors);
        let position_timer = Timer::started(&hw);

        ParallelDrive {
            hw,
            left,
            right,
            input: DriveInput::Tank,
            gyro: None,
            angle_offset: 0.0,
            encoder_config: EncoderConfig::Unassigned,
            ledger: EncoderLedger::default(),
            pose: Pose::default(),
            width: 0.0,
            gyro_correction: GyroCorrection::default(),
            position_timer,
            position_sample_ms: DEFAULT_POSITION_SAMPLE_MS,
            maneuver: None,
        }
    }

    /// Left motor group.
    pub fn left(&self) -> &MotorGroup<H> {
        &self.left
    }

    /// Left motor group, mutably (limits, input strategy).
    pub fn left_mut(&mut self) -> &mut MotorGroup<H> {
        &mut self.left
    }

    /// Right motor group.
    pub fn right(&self) -> &MotorGroup<H> {
        &self.right
    }

    /// Right motor group, mutably (limits, input strategy).
    pub fn right_mut(&mut self) -> &mut MotorGroup<H> {
        &mut self.right
    }

    /// Read operator input and command both sides.
    ///
    /// Arcade input derives `left = move + turn`, `right = move - turn` from a
    /// single joystick. Tank input lets each side run its own strategy.
    pub fn take_input(&mut self) {
        match self.input {
            DriveInput::Arcade { move_axis, turn_axis, coeff } => {
                let forward = coeff * self.hw.axis(move_axis) as f64;
                let turn = coeff * self.hw.axis(turn_axis) as f64;
                self.set_drive_power(to_power(forward + turn), to_power(forward - turn));
            }
            DriveInput::Tank => {
                self.left.take_input();
                self.right.take_input();
            }
        }
    }

    /// Map one joystick axis to each side.
    ///
    /// # Arguments
    ///
    /// * `coeff`: Output scale.
    /// * `pow_map`: Exponent of the power curve.
    /// * `max_acc_100ms`: Slew limit per 100 ms, 0 for none.
    /// * `deadband`: Powers below this magnitude become 0.
    /// * `left_axis`, `right_axis`: Axes driving each side.
    pub fn configure_tank_input(
        &mut self,
        coeff: f64,
        pow_map: f64,
        max_acc_100ms: u8,
        deadband: u8,
        left_axis: AxisId,
        right_axis: AxisId,
    ) {
        self.left.set_input_strategy(InputStrategy::Joystick(JoystickInput::new(
            left_axis,
            coeff,
            pow_map,
            max_acc_100ms,
            deadband,
        )));
        self.right.set_input_strategy(InputStrategy::Joystick(JoystickInput::new(
            right_axis,
            coeff,
            pow_map,
            max_acc_100ms,
            deadband,
        )));
        self.input = DriveInput::Tank;
    }

    /// Drive from a move axis and a turn axis on one joystick.
    pub fn configure_arcade_input(&mut self, joystick: u8, move_axis: u8, turn_axis: u8, coeff: f64) {
        self.input = DriveInput::Arcade {
            move_axis: AxisId::new(joystick, move_axis),
            turn_axis: AxisId::new(joystick, turn_axis),
            coeff,
        };
    }

    /// Command both sides, each subject to its soft limits.
    pub fn set_drive_power(&self, left: Power, right: Power) {
        self.left.set_power(left);
        self.right.set_power(right);
    }

    /// Command the left side.
    pub fn set_left_power(&self, power: Power) {
        self.left.set_power(power);
    }

    /// Command the right side.
    pub fn set_right_power(&self, power: Power) {
        self.right.set_power(power);
    }
}
