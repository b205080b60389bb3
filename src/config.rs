use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use tankdrive_hal::{EncoderId, GyroId, MotorPort};
use tankdrive_motion::{DEFAULT_POSITION_SAMPLE_MS, DriveSettings, GyroCorrection, TurnSettings};
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Per-robot wiring and geometry.
#[derive(Debug, Clone, Deserialize)]
pub struct DrivetrainConfig {
    pub left_motors: Vec<MotorPort>,
    pub right_motors: Vec<MotorPort>,
    pub left_encoder: Option<EncoderId>,
    pub right_encoder: Option<EncoderId>,
    #[serde(default)]
    pub left_reversed: bool,
    #[serde(default)]
    pub right_reversed: bool,
    pub gyro: Option<GyroId>,
    #[serde(default)]
    pub gyro_correction: GyroCorrection,
    pub width: f64,
    pub wheel_diameter: f64,
    #[serde(default = "default_gear_ratio")]
    pub gear_ratio: f64,
    #[serde(default = "default_position_sample_ms")]
    pub position_sample_ms: u32,
}

fn default_gear_ratio() -> f64 {
    1.0
}

fn default_position_sample_ms() -> u32 {
    DEFAULT_POSITION_SAMPLE_MS
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Wheel surface speed at full power, distance units per second.
    pub full_speed: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutonomousConfig {
    pub side_length: f64,
    pub legs: u32,
    pub turn_angle: f64,
    #[serde(default)]
    pub calibrate_width: bool,
    pub report_period_ms: u64,
    pub cruise_distance: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RobotConfig {
    pub drivetrain: DrivetrainConfig,
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub turn: TurnSettings,
    #[serde(default)]
    pub drive: DriveSettings,
    pub autonomous: AutonomousConfig,
}

/// Load the robot configuration from `config/default.toml`, overridden by
/// `TANKDRIVE__<SECTION>__<KEY>` environment variables.
pub fn load_config() -> Result<RobotConfig, ConfigError> {
    info!("Attempting to load configuration from {}", DEFAULT_CONFIG_PATH);

    let settings = Config::builder()
        .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(true))
        .add_source(
            Environment::with_prefix("TANKDRIVE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|config| config.try_deserialize::<RobotConfig>());

    match settings {
        Ok(config) => {
            info!("Successfully loaded configuration: {:?}", config);
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}
