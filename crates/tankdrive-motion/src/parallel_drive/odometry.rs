//! Dead-reckoning pose tracking and drive-width calibration.

use core::fmt;

use libm::{cos, fabs, sin};
use tankdrive_hal::{Hardware, Power, Timer};
use tracing::{debug, trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{EncoderConfig, ParallelDrive};
use crate::angle::{AngleUnit, convert_angle};
use crate::settings::GyroCorrection;
use crate::util::to_power;

/// A 2-D pose `(x, y, θ)` in distance units and radians, θ measured
/// counter-clockwise from the x-axis.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// World-frame x position.
    pub x: f64,
    /// World-frame y position.
    pub y: f64,
    /// Heading (rad). Not normalized.
    pub theta: f64,
}

impl Pose {
    /// Construct a new pose.
    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.2}, y: {:.2}, θ: {:.2} rad)", self.x, self.y, self.theta)
    }
}

impl<H: Hardware + Clone> ParallelDrive<H> {
    /// Integrate wheel travel since the last update into the pose.
    ///
    /// Runs at most once per position sample time and never while the width
    /// is zero. Unequal side travel is treated as a circular arc; equal travel
    /// (or an arc that evaluates to a non-finite value) as a straight segment
    /// along the current heading. With [`GyroCorrection::Medium`] or
    /// [`GyroCorrection::Full`] and a gyro attached, the heading after an arc
    /// is the gyro's absolute heading; `Full` also rescales the side distances
    /// so their difference matches the gyro's heading change. A single encoder
    /// stands in for both sides. A pivot about one stationary wheel (e.g.
    /// `left == 0`) is an arc of radius `width / 2`, not a straight segment.
    pub fn update_position(&mut self) {
        if self.width == 0.0 || self.position_timer.elapsed(&self.hw) < self.position_sample_ms {
            return;
        }
        self.position_timer.reset(&self.hw);

        let (mut left, mut right) = self.take_odometry_travel();
        match self.encoder_config {
            EncoderConfig::Average => {}
            EncoderConfig::Left => right = left,
            EncoderConfig::Right => left = right,
            EncoderConfig::Unassigned => return,
        }

        let theta = self.pose.theta;
        let gyro_heading = if self.has_gyro() { Some(self.abs_angle(AngleUnit::Radians)) } else { None };

        if let (GyroCorrection::Full, Some(heading)) = (self.gyro_correction, gyro_heading) {
            if left + right != 0.0 {
                let factor = (right - left - self.width * (heading - theta)) / (right + left);
                left *= 1.0 + factor;
                right *= 1.0 - factor;
            }
        }

        let trusted_heading = match self.gyro_correction {
            GyroCorrection::None => None,
            GyroCorrection::Medium | GyroCorrection::Full => gyro_heading,
        };

        if left != right {
            let phi = (right - left) / self.width;
            let radius = self.width * (left + right) / (2.0 * (right - left));
            let dx = radius * (sin(theta + phi) - sin(theta));
            let dy = radius * (cos(theta) - cos(theta + phi));

            if dx.is_finite() && dy.is_finite() && phi.is_finite() {
                self.pose.x += dx;
                self.pose.y += dy;
                self.pose.theta = trusted_heading.unwrap_or(theta + phi);
                trace!(left, right, phi, pose = %self.pose, "odometry arc");
                return;
            }
        }

        let travel = (left + right) / 2.0;
        if travel.is_finite() {
            self.pose.x += travel * cos(theta);
            self.pose.y += travel * sin(theta);
            trace!(travel, pose = %self.pose, "odometry straight");
        }
    }

    /// Overwrite the pose.
    ///
    /// # Arguments
    ///
    /// * `x`, `y`: Position.
    /// * `theta`: Heading in `unit`.
    /// * `update_angle_offset`: Also align the gyro's absolute heading.
    pub fn set_robot_position(&mut self, x: f64, y: f64, theta: f64, unit: AngleUnit, update_angle_offset: bool) {
        self.pose = Pose::new(x, y, convert_angle(theta, unit, AngleUnit::Radians));
        if update_angle_offset {
            self.set_abs_angle(theta, unit);
        }
    }

    /// Current pose estimate.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Estimated x position.
    pub fn x(&self) -> f64 {
        self.pose.x
    }

    /// Estimated y position.
    pub fn y(&self) -> f64 {
        self.pose.y
    }

    /// Estimated heading in `unit`.
    pub fn theta(&self, unit: AngleUnit) -> f64 {
        convert_angle(self.pose.theta, AngleUnit::Radians, unit)
    }

    /// Wheel-to-wheel distance.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Set the wheel-to-wheel distance. Odometry is idle while it is zero.
    pub fn set_width(&mut self, width: f64) {
        self.width = width;
    }

    /// How odometry uses the gyro.
    pub fn gyro_correction(&self) -> GyroCorrection {
        self.gyro_correction
    }

    /// Change how odometry uses the gyro.
    pub fn set_gyro_correction(&mut self, correction: GyroCorrection) {
        self.gyro_correction = correction;
    }

    /// Set the minimum time between odometry updates (ms).
    pub fn set_position_sample_time(&mut self, ms: u32) {
        self.position_sample_ms = ms;
    }

    /// Spin in place both ways and estimate the drive width.
    ///
    /// Each sample measures the differential wheel travel over the gyro's
    /// heading change, `|(right - left) / Δθ|`. The mean of all samples is
    /// stored as the width and returned. Blocks for about `duration_ms` and
    /// abandons any running maneuver.
    ///
    /// # Arguments
    ///
    /// * `duration_ms`: Total spin time.
    /// * `sample_ms`: Length of one sample.
    /// * `power`: Spin power.
    /// * `reverse_delay_ms`: Unsampled time after each change of direction.
    ///
    /// # Returns
    ///
    /// The new width, or the current one unchanged when a gyro and both
    /// encoders are not attached or no sample saw the heading change.
    pub fn calculate_width(&mut self, duration_ms: u32, sample_ms: u32, power: Power, reverse_delay_ms: u32) -> f64 {
        if !self.has_gyro() || !(self.left.has_encoder() && self.right.has_encoder()) {
            warn!("width calibration needs a gyro and encoders on both sides");
            return self.width;
        }
        if self.maneuver.take().is_some() {
            debug!("maneuver abandoned for width calibration");
        }

        let window = duration_ms.saturating_sub(reverse_delay_ms) / 2;
        let mut total = 0.0;
        let mut samples = 0u32;

        for direction in [1.0, -1.0] {
            let spin = to_power(direction * power as f64);
            self.set_drive_power(spin, -spin);
            self.hw.delay_ms(reverse_delay_ms);

            let timer = Timer::started(&self.hw);
            while timer.elapsed(&self.hw) < window {
                self.clear_maneuver_travel();
                self.reset_gyro();
                self.hw.delay_ms(sample_ms.max(1));

                let (left, right) = self.take_maneuver_travel(false);
                let delta = self.gyro_val(AngleUnit::Radians);
                if delta != 0.0 {
                    total += fabs((right - left) / delta);
                    samples += 1;
                }
            }
        }
        self.set_drive_power(0, 0);

        if samples > 0 {
            self.width = total / samples as f64;
        }
        debug!(width = self.width, samples, "width calibrated");
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel_drive::Side;
    use crate::parallel_drive::tests::{LEFT, RIGHT, sim_drive};
    use core::f64::consts::PI;
    use tankdrive_hal::{Clock, EncoderId, GyroId, SimHardware};
    const EPSILON: f64 = 1e-6;

    /// One encoder tick per distance unit, width 12, no gyro.
    fn unit_drive(hw: &SimHardware) -> ParallelDrive<&SimHardware> {
        let mut drive = ParallelDrive::new(hw, LEFT.to_vec(), RIGHT.to_vec());
        drive.add_encoder(Side::Left, EncoderId(1), false, 360.0 / PI, 1.0);
        drive.add_encoder(Side::Right, EncoderId(2), false, 360.0 / PI, 1.0);
        drive.set_width(12.0);
        drive
    }

    fn step(hw: &SimHardware, drive: &mut ParallelDrive<&SimHardware>, left: i32, right: i32) {
        hw.set_encoder(EncoderId(1), left);
        hw.set_encoder(EncoderId(2), right);
        hw.delay_ms(20);
        drive.update_position();
    }

    #[test]
    fn test_straight_segments_keep_heading() {
        let hw = SimHardware::new();
        let mut drive = unit_drive(&hw);
        drive.set_robot_position(0.0, 0.0, 90.0, AngleUnit::Degrees, false);

        for n in 1..=3 {
            step(&hw, &mut drive, 10, 10);
            assert!(drive.x().abs() < EPSILON);
            assert!((drive.y() - 10.0 * n as f64).abs() < EPSILON);
            assert!((drive.theta(AngleUnit::Degrees) - 90.0).abs() < EPSILON);
        }
    }

    #[test]
    fn test_arc_matches_closed_form() {
        let hw = SimHardware::new();
        let mut drive = unit_drive(&hw);
        step(&hw, &mut drive, 10, 20);

        let phi: f64 = (20.0 - 10.0) / 12.0;
        let radius = 12.0 / (20.0 / 10.0 - 1.0) + 12.0 / 2.0;
        assert!((drive.theta(AngleUnit::Radians) - phi).abs() < EPSILON);
        assert!((drive.x() - radius * phi.sin()).abs() < EPSILON);
        assert!((drive.y() - radius * (1.0 - phi.cos())).abs() < EPSILON);
    }

    #[test]
    fn test_spin_in_place_and_zero_left_are_finite() {
        let hw = SimHardware::new();
        let mut drive = unit_drive(&hw);

        step(&hw, &mut drive, -6, 6);
        assert!(drive.x().abs() < EPSILON && drive.y().abs() < EPSILON);
        assert!((drive.theta(AngleUnit::Radians) - 1.0).abs() < EPSILON);

        // pivot about the left wheel
        let mut drive = unit_drive(&hw);
        step(&hw, &mut drive, 0, 12);
        assert!((drive.theta(AngleUnit::Radians) - 1.0).abs() < EPSILON);
        assert!((drive.x() - 6.0 * 1.0_f64.sin()).abs() < EPSILON);
        assert!(drive.pose().x.is_finite() && drive.pose().y.is_finite());
    }

    #[test]
    fn test_sample_gating_and_zero_width() {
        let hw = SimHardware::new();
        let mut drive = unit_drive(&hw);
        hw.set_encoder(EncoderId(1), 10);
        hw.set_encoder(EncoderId(2), 10);
        hw.delay_ms(19);
        drive.update_position();
        assert_eq!(drive.x(), 0.0);

        hw.delay_ms(1);
        drive.update_position();
        assert!((drive.x() - 10.0).abs() < EPSILON);

        drive.set_width(0.0);
        step(&hw, &mut drive, 10, 10);
        assert!((drive.x() - 10.0).abs() < EPSILON);
    }

    #[test]
    fn test_medium_correction_takes_gyro_heading() {
        let hw = SimHardware::new();
        let mut drive = unit_drive(&hw);
        drive.add_gyro(GyroId(1), GyroCorrection::Medium, true);

        hw.set_gyro(GyroId(1), 600);
        step(&hw, &mut drive, 10, 20);
        assert!((drive.theta(AngleUnit::Degrees) - 60.0).abs() < EPSILON);
    }

    #[test]
    fn test_full_correction_matches_gyro_differential() {
        let hw = SimHardware::new();
        let mut drive = unit_drive(&hw);
        drive.add_gyro(GyroId(1), GyroCorrection::Full, true);

        // wheels claim a 10 unit differential, the gyro saw none:
        // both sides are rescaled to 40/3
        hw.set_gyro(GyroId(1), 0);
        step(&hw, &mut drive, 10, 20);
        assert!(drive.theta(AngleUnit::Radians).abs() < EPSILON);
        assert!((drive.x() - 40.0 / 3.0).abs() < EPSILON);
        assert!(drive.y().abs() < EPSILON);
    }

    #[test]
    fn test_single_encoder_stands_in_for_both() {
        let hw = SimHardware::new();
        let mut drive = ParallelDrive::new(&hw, LEFT.to_vec(), RIGHT.to_vec());
        drive.add_encoder(Side::Right, EncoderId(2), false, 360.0 / PI, 1.0);
        drive.set_width(12.0);
        step(&hw, &mut drive, 0, 8);
        assert!((drive.x() - 8.0).abs() < EPSILON);
        assert_eq!(drive.theta(AngleUnit::Radians), 0.0);
    }

    #[test]
    fn test_pose_tracks_simulated_drivetrain() {
        let hw = SimHardware::new();
        let mut drive = sim_drive(&hw, true);
        drive.set_drive_power(80, 120);
        for _ in 0..100 {
            hw.delay_ms(10);
            drive.update_position();
        }

        let (x, y, theta) = hw.true_pose();
        assert!((drive.x() - x).abs() < 0.5);
        assert!((drive.y() - y).abs() < 0.5);
        assert!((drive.theta(AngleUnit::Radians) - theta).abs() < 0.01);
    }

    #[test]
    fn test_calculate_width_from_spin() {
        let hw = SimHardware::new();
        let mut drive = sim_drive(&hw, true);
        drive.set_width(20.0);

        let width = drive.calculate_width(4000, 200, 80, 500);
        assert!((width - 12.0).abs() < 0.2);
        assert_eq!(drive.width(), width);
        assert_eq!(drive.left().power(), 0);
        assert!(hw.millis() >= 4000);
    }

    #[test]
    fn test_calculate_width_without_gyro_is_noop() {
        let hw = SimHardware::new();
        let mut drive = sim_drive(&hw, false);
        assert_eq!(drive.calculate_width(4000, 200, 80, 500), 12.0);
        assert_eq!(hw.millis(), 0);
    }
}
