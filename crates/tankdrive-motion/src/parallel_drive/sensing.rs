//! Encoder and gyro access for the drive.

use core::f64::consts::PI;

use libm::fabs;
use tankdrive_hal::{EncoderId, GyroId, Hardware};
use tracing::debug;

use super::{EncoderConfig, ParallelDrive, Side};
use crate::angle::{AngleUnit, convert_angle};
use crate::settings::GyroCorrection;

impl<H: Hardware + Clone> ParallelDrive<H> {
    /// Attach a wheel encoder to one side.
    ///
    /// # Arguments
    ///
    /// * `side`: Side the encoder measures.
    /// * `id`: Encoder to read.
    /// * `reversed`: Negate readings.
    /// * `wheel_diameter`: Wheel diameter in distance units.
    /// * `gear_ratio`: Wheel turns per encoder turn.
    ///
    /// The distance per tick is `π · wheel_diameter · gear_ratio / 360`. The
    /// default encoder configuration follows the attached sides.
    pub fn add_encoder(&mut self, side: Side, id: EncoderId, reversed: bool, wheel_diameter: f64, gear_ratio: f64) {
        let coefficient = PI * wheel_diameter * gear_ratio / 360.0;
        match side {
            Side::Left => self.left.add_encoder(id, coefficient, reversed),
            Side::Right => self.right.add_encoder(id, coefficient, reversed),
        }
        self.update_encoder_config();
    }

    /// Attach the chassis gyro.
    ///
    /// # Arguments
    ///
    /// * `id`: Gyro to read.
    /// * `correction`: How odometry uses the gyro.
    /// * `set_abs_angle`: Align the absolute heading with the current pose
    ///   heading.
    pub fn add_gyro(&mut self, id: GyroId, correction: GyroCorrection, set_abs_angle: bool) {
        debug!(gyro = id.0, ?correction, "gyro attached");
        self.gyro = Some(id);
        self.gyro_correction = correction;
        if set_abs_angle {
            self.set_abs_angle(self.pose.theta, AngleUnit::Radians);
        }
    }

    /// Whether a gyro is attached.
    pub fn has_gyro(&self) -> bool {
        self.gyro.is_some()
    }

    /// Which encoders feed default distance reads.
    pub fn encoder_config(&self) -> EncoderConfig {
        self.encoder_config
    }

    /// Override which encoders feed default distance reads.
    pub fn set_encoder_config(&mut self, config: EncoderConfig) {
        self.encoder_config = config;
    }

    fn update_encoder_config(&mut self) {
        self.encoder_config = match (self.left.has_encoder(), self.right.has_encoder()) {
            (true, true) => EncoderConfig::Average,
            (true, false) => EncoderConfig::Left,
            (false, true) => EncoderConfig::Right,
            (false, false) => EncoderConfig::Unassigned,
        };
    }

    /// Encoder reading since the drive last reset its encoders.
    ///
    /// # Arguments
    ///
    /// * `side`: Side to read. `Unassigned` uses the drive's configuration.
    /// * `raw`: Return ticks instead of distance.
    /// * `absolute`: For `Average`, average the magnitudes of both sides.
    ///
    /// # Returns
    ///
    /// The reading, or 0 if the selected side has no encoder.
    pub fn encoder_val(&self, side: EncoderConfig, raw: bool, absolute: bool) -> f64 {
        let side = if side == EncoderConfig::Unassigned { self.encoder_config } else { side };
        match side {
            EncoderConfig::Average => {
                let left = self.left.encoder_val(raw);
                let right = self.right.encoder_val(raw);
                if absolute { (fabs(left) + fabs(right)) / 2.0 } else { (left + right) / 2.0 }
            }
            EncoderConfig::Left => self.left.encoder_val(raw),
            EncoderConfig::Right => self.right.encoder_val(raw),
            EncoderConfig::Unassigned => 0.0,
        }
    }

    /// Zero both encoders. Travel read so far is kept for odometry.
    pub fn reset_encoders(&mut self) {
        self.sync_encoders();
    }

    /// Gyro heading since the last gyro reset, 0 without a gyro.
    pub fn gyro_val(&self, unit: AngleUnit) -> f64 {
        match self.gyro {
            Some(id) => convert_angle(self.hw.gyro_raw(id) as f64, AngleUnit::Raw, unit),
            None => 0.0,
        }
    }

    /// Zero the gyro, folding its reading into the absolute angle offset so
    /// [`abs_angle`](Self::abs_angle) is unaffected.
    pub fn reset_gyro(&mut self) {
        if let Some(id) = self.gyro {
            self.angle_offset += self.gyro_val(AngleUnit::Degrees);
            self.hw.reset_gyro(id, 0);
        }
    }

    /// Absolute heading, 0 without a gyro.
    pub fn abs_angle(&self, unit: AngleUnit) -> f64 {
        if self.gyro.is_none() {
            return 0.0;
        }
        convert_angle(self.gyro_val(AngleUnit::Degrees) + self.angle_offset, AngleUnit::Degrees, unit)
    }

    /// Set the angle offset so the current absolute heading equals `angle`.
    pub fn set_abs_angle(&mut self, angle: f64, unit: AngleUnit) {
        self.angle_offset = convert_angle(angle, unit, AngleUnit::Degrees) - self.gyro_val(AngleUnit::Degrees);
    }

    /// Read both encoders, credit the readings to every consumer and reset
    /// them.
    pub(crate) fn sync_encoders(&mut self) {
        let left = self.left.encoder_val(true);
        let right = self.right.encoder_val(true);
        self.left.reset_encoder();
        self.right.reset_encoder();

        self.ledger.odometry.0 += left;
        self.ledger.odometry.1 += right;
        self.ledger.maneuver.0 += left;
        self.ledger.maneuver.1 += right;
    }

    /// Drop travel not yet consumed by a maneuver.
    pub(crate) fn clear_maneuver_travel(&mut self) {
        self.sync_encoders();
        self.ledger.maneuver = (0.0, 0.0);
    }

    /// Signed `(left, right)` travel since the maneuver last drained it.
    pub(crate) fn take_maneuver_travel(&mut self, raw: bool) -> (f64, f64) {
        self.sync_encoders();
        let ticks = core::mem::take(&mut self.ledger.maneuver);
        self.scale_ticks(ticks, raw)
    }

    /// Signed `(left, right)` travel in distance units since the last
    /// odometry update.
    pub(crate) fn take_odometry_travel(&mut self) -> (f64, f64) {
        self.sync_encoders();
        let ticks = core::mem::take(&mut self.ledger.odometry);
        self.scale_ticks(ticks, false)
    }

    fn scale_ticks(&self, (left, right): (f64, f64), raw: bool) -> (f64, f64) {
        if raw {
            return (left, right);
        }
        (
            left * self.left.encoder_coefficient().unwrap_or(0.0),
            right * self.right.encoder_coefficient().unwrap_or(0.0),
        )
    }

    /// Magnitude of a travel sample per the encoder configuration.
    pub(crate) fn configured_travel(&self, (left, right): (f64, f64)) -> f64 {
        match self.encoder_config {
            EncoderConfig::Average => (fabs(left) + fabs(right)) / 2.0,
            EncoderConfig::Left => fabs(left),
            EncoderConfig::Right => fabs(right),
            EncoderConfig::Unassigned => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel_drive::tests::{LEFT, RIGHT};
    use tankdrive_hal::SimHardware;
    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_encoder_config_follows_attachment() {
        let hw = SimHardware::new();
        let mut drive = ParallelDrive::new(&hw, LEFT.to_vec(), RIGHT.to_vec());
        assert_eq!(drive.encoder_config(), EncoderConfig::Unassigned);

        drive.add_encoder(Side::Right, EncoderId(2), false, 4.0, 1.0);
        assert_eq!(drive.encoder_config(), EncoderConfig::Right);

        drive.add_encoder(Side::Left, EncoderId(1), false, 4.0, 1.0);
        assert_eq!(drive.encoder_config(), EncoderConfig::Average);
    }

    #[test]
    fn test_encoder_val_sides_and_average() {
        let hw = SimHardware::new();
        let mut drive = ParallelDrive::new(&hw, LEFT.to_vec(), RIGHT.to_vec());
        // one tick per distance unit
        drive.add_encoder(Side::Left, EncoderId(1), true, 360.0 / PI, 1.0);
        drive.add_encoder(Side::Right, EncoderId(2), false, 360.0 / PI, 1.0);
        hw.set_encoder(EncoderId(1), 30);
        hw.set_encoder(EncoderId(2), 10);

        assert!((drive.encoder_val(EncoderConfig::Left, false, true) + 30.0).abs() < EPSILON);
        assert!((drive.encoder_val(EncoderConfig::Right, true, true) - 10.0).abs() < EPSILON);
        assert!((drive.encoder_val(EncoderConfig::Average, false, true) - 20.0).abs() < EPSILON);
        assert!((drive.encoder_val(EncoderConfig::Average, false, false) + 10.0).abs() < EPSILON);
        assert!((drive.encoder_val(EncoderConfig::Unassigned, false, true) - 20.0).abs() < EPSILON);
    }

    #[test]
    fn test_missing_sensors_read_zero() {
        let hw = SimHardware::new();
        let mut drive = ParallelDrive::new(&hw, LEFT.to_vec(), RIGHT.to_vec());
        hw.set_gyro(GyroId(1), 450);
        assert_eq!(drive.encoder_val(EncoderConfig::Unassigned, false, true), 0.0);
        assert_eq!(drive.gyro_val(AngleUnit::Degrees), 0.0);
        assert_eq!(drive.abs_angle(AngleUnit::Degrees), 0.0);
        drive.reset_gyro();
        assert_eq!(hw.gyro_raw(GyroId(1)), 450);
    }

    #[test]
    fn test_abs_angle_survives_gyro_reset() {
        let hw = SimHardware::new();
        let mut drive = ParallelDrive::new(&hw, LEFT.to_vec(), RIGHT.to_vec());
        drive.add_gyro(GyroId(1), GyroCorrection::Medium, true);
        drive.set_abs_angle(90.0, AngleUnit::Degrees);

        hw.set_gyro(GyroId(1), 300);
        assert!((drive.gyro_val(AngleUnit::Degrees) - 30.0).abs() < EPSILON);
        assert!((drive.abs_angle(AngleUnit::Degrees) - 120.0).abs() < EPSILON);

        drive.reset_gyro();
        assert_eq!(drive.gyro_val(AngleUnit::Raw), 0.0);
        assert!((drive.abs_angle(AngleUnit::Degrees) - 120.0).abs() < EPSILON);
        assert!((drive.abs_angle(AngleUnit::Radians) - 120.0_f64.to_radians()).abs() < EPSILON);
    }

    #[test]
    fn test_reset_keeps_travel_for_every_consumer() {
        let hw = SimHardware::new();
        let mut drive = ParallelDrive::new(&hw, LEFT.to_vec(), RIGHT.to_vec());
        drive.add_encoder(Side::Left, EncoderId(1), false, 360.0 / PI, 1.0);
        drive.add_encoder(Side::Right, EncoderId(2), false, 360.0 / PI, 1.0);

        hw.set_encoder(EncoderId(1), 5);
        hw.set_encoder(EncoderId(2), 7);
        drive.reset_encoders();
        assert_eq!(hw.encoder_ticks(EncoderId(1)), 0);

        hw.set_encoder(EncoderId(1), 1);
        let (left, right) = drive.take_maneuver_travel(false);
        assert!((left - 6.0).abs() < EPSILON && (right - 7.0).abs() < EPSILON);

        let (left, right) = drive.take_odometry_travel();
        assert!((left - 6.0).abs() < EPSILON && (right - 7.0).abs() < EPSILON);

        assert_eq!(drive.take_odometry_travel(), (0.0, 0.0));
    }
}
