mod autonomous; // blocking and polled routines
mod config;     // robot configuration loading
mod robot;      // simulator + drive wiring

use tracing::info;
use tracing_subscriber::{self, EnvFilter};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Tankdrive simulation runner started.");

    let config = config::load_config()?;
    let mut robot = robot::Robot::from_config(&config)?;

    autonomous::run_square(&mut robot, &config)?;
    autonomous::run_cruise(&mut robot, &config)?;

    info!(
        pose = %robot.drive.pose(),
        heading = robot.drive.abs_angle(tankdrive_motion::AngleUnit::Degrees),
        "Simulation finished."
    );
    Ok(())
}
