use std::time::Duration;

use anyhow::Context;
use spin_sleep::SpinSleeper;
use tankdrive_hal::Clock;
use tankdrive_motion::{AngleUnit, ManeuverState};
use tracing::{info, info_span, warn};

use crate::config::RobotConfig;
use crate::robot::Robot;

/// Width calibration: 2 s of spinning at half power, 100 ms samples.
const CALIBRATION_MS: u32 = 2000;
const CALIBRATION_SAMPLE_MS: u32 = 100;
const CALIBRATION_POWER: i8 = 64;
const CALIBRATION_REVERSE_MS: u32 = 200;

/// Simulated milliseconds advanced per control tick.
const TICK_MS: u32 = 5;

/// Drive the configured polygon with the blocking maneuver wrappers.
pub fn run_square(robot: &mut Robot, config: &RobotConfig) -> anyhow::Result<()> {
    let _span = info_span!("square").entered();
    let auton = &config.autonomous;

    if auton.calibrate_width {
        let configured = robot.drive.width();
        let measured = robot
            .drive
            .calculate_width(CALIBRATION_MS, CALIBRATION_SAMPLE_MS, CALIBRATION_POWER, CALIBRATION_REVERSE_MS);
        info!(configured, measured, "Width calibrated");
        // calibration spins in place; start the route from the origin
        let heading = robot.drive.abs_angle(AngleUnit::Degrees);
        robot.drive.set_robot_position(0.0, 0.0, heading, AngleUnit::Degrees, false);
    }

    for leg in 1..=auton.legs {
        robot
            .drive
            .drive(auton.side_length, &config.drive)
            .with_context(|| format!("leg {leg}: drive {}", auton.side_length))?;
        robot
            .drive
            .turn(auton.turn_angle, &config.turn)
            .with_context(|| format!("leg {leg}: turn {}", auton.turn_angle))?;

        let (x, y, theta) = robot.true_pose();
        info!(leg, odometry = %robot.drive.pose(), "true = ({:.2}, {:.2}, {:.1}°)", x, y, theta);
    }
    Ok(())
}

/// Arm a straight drive and poll it from a fixed-rate loop, reporting the
/// pose while the maneuver runs.
pub fn run_cruise(robot: &mut Robot, config: &RobotConfig) -> anyhow::Result<()> {
    let _span = info_span!("cruise").entered();
    let auton = &config.autonomous;
    let sleeper = SpinSleeper::new(100_000);
    let period = Duration::from_millis(auton.report_period_ms);

    robot
        .drive
        .begin_drive(auton.cruise_distance, &config.drive)
        .context("arming cruise drive")?;

    let mut last_report = robot.hw.millis();
    while robot.drive.maneuver_state() != ManeuverState::Idle {
        robot.drive.execute_maneuver();
        robot.drive.update_position();
        robot.hw.delay_ms(TICK_MS);

        let now = robot.hw.millis();
        if now.wrapping_sub(last_report) as u64 >= auton.report_period_ms {
            last_report = now;
            info!(
                t_ms = now,
                progress = robot.drive.maneuver_progress(),
                pose = %robot.drive.pose(),
                "cruising"
            );
            // pace the report loop in wall-clock time as well
            sleeper.sleep(period);
        }
    }

    let (x, y, theta) = robot.true_pose();
    let drift = (robot.drive.x() - x).hypot(robot.drive.y() - y);
    if drift > 1.0 {
        warn!(drift, "Odometry drifted from the simulated pose");
    }
    info!(odometry = %robot.drive.pose(), "cruise finished, true = ({:.2}, {:.2}, {:.1}°)", x, y, theta);
    Ok(())
}
