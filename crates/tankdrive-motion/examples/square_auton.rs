use tankdrive_hal::{EncoderId, GyroId, MotorPort, SimDrivetrain, SimHardware};
use tankdrive_motion::*;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
        .init();

    let left = vec![MotorPort(1), MotorPort(2)];
    let right = vec![MotorPort(3), MotorPort(4)];
    let width = 12.0; // inches between wheel contact patches
    let wheel_diameter = 4.0;

    let hw = SimHardware::new();
    hw.attach_drivetrain(SimDrivetrain {
        left_motors: left.clone(),
        right_motors: right.clone(),
        left_encoder: Some(EncoderId(1)),
        right_encoder: Some(EncoderId(2)),
        gyro: Some(GyroId(1)),
        width,
        wheel_diameter,
        full_speed: 36.0, // inches per second at full power
    });

    let mut drive = ParallelDrive::new(&hw, left, right);
    drive.add_encoder(Side::Left, EncoderId(1), false, wheel_diameter, 1.0);
    drive.add_encoder(Side::Right, EncoderId(2), false, wheel_diameter, 1.0);
    drive.add_gyro(GyroId(1), GyroCorrection::Medium, true);
    drive.set_width(width);

    let drive_settings = DriveSettings {
        ramp: RampProfile::Quad { initial: 40.0, peak: 120.0, final_power: 30.0 },
        brake_power: 0,
        ..DriveSettings::default()
    };
    let turn_settings = TurnSettings {
        ramp: RampProfile::Quad { initial: 50.0, peak: 127.0, final_power: 30.0 },
        brake_power: 0,
        ..TurnSettings::default()
    };
    let side = 24.0;

    println!("Driving a {} in square...", side);
    println!("  Width:          {} in", width);
    println!("  Wheel Diameter: {} in", wheel_diameter);
    println!("  Drive Ramp:     {:?}", drive_settings.ramp);
    println!("  Turn Ramp:      {:?}", turn_settings.ramp);

    for leg in 0..4 {
        if let Err(e) = drive.drive(side, &drive_settings) {
            eprintln!("Failed to drive leg {}: {}", leg + 1, e);
            return;
        }
        // negative angles turn counter-clockwise
        if let Err(e) = drive.turn(-90.0, &turn_settings) {
            eprintln!("Failed to turn after leg {}: {}", leg + 1, e);
            return;
        }

        let (x, y, theta) = hw.true_pose();
        println!(
            "Leg {}: Odometry: {} | True: ({:.2}, {:.2}, {:.1}°)",
            leg + 1,
            drive.pose(),
            x,
            y,
            theta.to_degrees()
        );
    }

    println!("\nSquare complete.");
    println!("Final Pose:    {}", drive.pose());
    println!("Heading (gyro): {:.1}°", drive.abs_angle(AngleUnit::Degrees));
}
