use std::sync::Arc;

use anyhow::bail;
use tankdrive_hal::{SimDrivetrain, SimHardware};
use tankdrive_motion::{ParallelDrive, Side};
use tracing::info;

use crate::config::RobotConfig;

/// The simulated robot: the hardware adapter and the drive wired to it.
pub struct Robot {
    pub hw: Arc<SimHardware>,
    pub drive: ParallelDrive<Arc<SimHardware>>,
}

impl Robot {
    /// Wire a drive to a fresh simulator according to `config`.
    pub fn from_config(config: &RobotConfig) -> anyhow::Result<Self> {
        let dt = &config.drivetrain;
        if dt.left_motors.is_empty() || dt.right_motors.is_empty() {
            bail!("both drive sides need at least one motor");
        }
        if !(dt.width > 0.0 && dt.wheel_diameter > 0.0) {
            bail!("drive width ({}) and wheel diameter ({}) must be positive", dt.width, dt.wheel_diameter);
        }

        let hw = Arc::new(SimHardware::new());
        hw.attach_drivetrain(SimDrivetrain {
            left_motors: dt.left_motors.clone(),
            right_motors: dt.right_motors.clone(),
            left_encoder: dt.left_encoder,
            right_encoder: dt.right_encoder,
            gyro: dt.gyro,
            width: dt.width,
            // the simulator counts encoder degrees, which span `gear_ratio` wheel turns
            wheel_diameter: dt.wheel_diameter * dt.gear_ratio,
            full_speed: config.simulation.full_speed,
        });

        let mut drive = ParallelDrive::new(Arc::clone(&hw), dt.left_motors.clone(), dt.right_motors.clone());
        if let Some(id) = dt.left_encoder {
            drive.add_encoder(Side::Left, id, dt.left_reversed, dt.wheel_diameter, dt.gear_ratio);
        }
        if let Some(id) = dt.right_encoder {
            drive.add_encoder(Side::Right, id, dt.right_reversed, dt.wheel_diameter, dt.gear_ratio);
        }
        if let Some(id) = dt.gyro {
            drive.add_gyro(id, dt.gyro_correction, true);
        }
        drive.set_width(dt.width);
        drive.set_position_sample_time(dt.position_sample_ms);

        let robot = Robot { hw, drive };
        let correction = robot.drive.resolve_correction(config.drive.correction);
        info!(
            encoders = ?robot.drive.encoder_config(),
            gyro = robot.drive.has_gyro(),
            ?correction,
            "Drive wired"
        );
        Ok(robot)
    }

    /// Ground-truth pose from the simulator, heading in degrees.
    pub fn true_pose(&self) -> (f64, f64, f64) {
        let (x, y, theta) = self.hw.true_pose();
        (x, y, theta.to_degrees())
    }
}
