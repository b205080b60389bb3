//! Simulated hardware adapter.
//!
//! `SimHardware` keeps every port in memory behind a lock and advances a
//! virtual millisecond clock only when asked to (`delay_ms` or `advance`).
//! Optional physics models turn commanded motor power into encoder, gyro and
//! potentiometer motion, so closed-loop code can run to completion
//! deterministically.

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    ANALOG_MAX, AnalogPort, AxisId, ButtonId, Clock, EncoderId, GyroId, Hardware, MotorPort,
    POWER_MAX, Power,
};

/// Simulated differential drivetrain.
///
/// Wheel speed is proportional to commanded power (the first motor of each
/// side is authoritative). Encoders count one tick per degree of wheel
/// rotation and the gyro reports counter-clockwise-positive tenths of a degree.
#[derive(Debug, Clone, PartialEq)]
pub struct SimDrivetrain {
    /// Motors driving the left wheels.
    pub left_motors: Vec<MotorPort>,
    /// Motors driving the right wheels.
    pub right_motors: Vec<MotorPort>,
    /// Encoder on the left wheels, if fitted.
    pub left_encoder: Option<EncoderId>,
    /// Encoder on the right wheels, if fitted.
    pub right_encoder: Option<EncoderId>,
    /// Gyro on the chassis, if fitted.
    pub gyro: Option<GyroId>,
    /// Wheel-to-wheel distance.
    pub width: f64,
    /// Wheel diameter, in the same units as `width`.
    pub wheel_diameter: f64,
    /// Wheel surface speed at full power, in distance units per second.
    pub full_speed: f64,
}

impl SimDrivetrain {
    fn ticks_per_unit(&self) -> f64 {
        360.0 / (PI * self.wheel_diameter)
    }
}

/// Position sensor attached to a simulated actuator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimSensor {
    /// Quadrature encoder.
    Encoder(EncoderId),
    /// Potentiometer on an analog port. Clamped to `[0, 4095]`.
    Potentiometer(AnalogPort),
}

/// Simulated single-axis mechanism (a lift, an arm).
#[derive(Debug, Clone, PartialEq)]
pub struct SimActuator {
    /// Motors driving the mechanism.
    pub motors: Vec<MotorPort>,
    /// Sensor the mechanism moves.
    pub sensor: SimSensor,
    /// Sensor units per millisecond at full power.
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct TruePose {
    x: f64,
    y: f64,
    theta: f64,
}

#[derive(Debug, Default)]
struct SimState {
    now_ms: u32,
    motors: HashMap<MotorPort, Power>,
    encoders: HashMap<EncoderId, f64>,
    analog: HashMap<AnalogPort, f64>,
    gyros: HashMap<GyroId, f64>,
    buttons: HashSet<ButtonId>,
    axes: HashMap<AxisId, i8>,
    drivetrain: Option<SimDrivetrain>,
    actuators: Vec<SimActuator>,
    pose: TruePose,
}

impl SimState {
    fn power_fraction(&self, motors: &[MotorPort]) -> f64 {
        motors
            .first()
            .map(|port| *self.motors.get(port).unwrap_or(&0) as f64 / POWER_MAX as f64)
            .unwrap_or(0.0)
    }

    fn step(&mut self) {
        self.now_ms = self.now_ms.wrapping_add(1);

        if let Some(dt) = self.drivetrain.clone() {
            let left = self.power_fraction(&dt.left_motors) * dt.full_speed / 1000.0;
            let right = self.power_fraction(&dt.right_motors) * dt.full_speed / 1000.0;

            if let Some(id) = dt.left_encoder {
                *self.encoders.entry(id).or_default() += left * dt.ticks_per_unit();
            }
            if let Some(id) = dt.right_encoder {
                *self.encoders.entry(id).or_default() += right * dt.ticks_per_unit();
            }

            let delta_theta = (right - left) / dt.width;
            let mid_theta = self.pose.theta + delta_theta / 2.0;
            let travel = (left + right) / 2.0;
            self.pose.x += travel * mid_theta.cos();
            self.pose.y += travel * mid_theta.sin();
            self.pose.theta += delta_theta;

            if let Some(id) = dt.gyro {
                *self.gyros.entry(id).or_default() += delta_theta * 1800.0 / PI;
            }
        }

        for index in 0..self.actuators.len() {
            let actuator = &self.actuators[index];
            let travel = self.power_fraction(&actuator.motors) * actuator.rate;
            let sensor = actuator.sensor;
            match sensor {
                SimSensor::Encoder(id) => *self.encoders.entry(id).or_default() += travel,
                SimSensor::Potentiometer(port) => {
                    let value = self.analog.entry(port).or_default();
                    *value = (*value + travel).clamp(0.0, ANALOG_MAX as f64);
                }
            }
        }
    }
}

/// In-memory hardware adapter with a virtual clock.
#[derive(Debug, Default)]
pub struct SimHardware {
    state: Mutex<SimState>,
}

impl SimHardware {
    /// A simulator with every port idle and the clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a drivetrain physics model.
    pub fn attach_drivetrain(&self, drivetrain: SimDrivetrain) {
        debug!(width = drivetrain.width, full_speed = drivetrain.full_speed, "sim drivetrain attached");
        self.state.lock().drivetrain = Some(drivetrain);
    }

    /// Add a single-axis mechanism physics model.
    pub fn attach_actuator(&self, actuator: SimActuator) {
        debug!(sensor = ?actuator.sensor, rate = actuator.rate, "sim actuator attached");
        self.state.lock().actuators.push(actuator);
    }

    /// Advance the virtual clock, stepping physics once per millisecond.
    pub fn advance(&self, ms: u32) {
        let mut state = self.state.lock();
        for _ in 0..ms {
            state.step();
        }
    }

    /// Overwrite an encoder count.
    pub fn set_encoder(&self, encoder: EncoderId, ticks: i32) {
        self.state.lock().encoders.insert(encoder, ticks as f64);
    }

    /// Overwrite an analog reading.
    pub fn set_analog(&self, port: AnalogPort, value: u16) {
        self.state.lock().analog.insert(port, value.min(ANALOG_MAX) as f64);
    }

    /// Overwrite a gyro reading (tenths of a degree).
    pub fn set_gyro(&self, gyro: GyroId, raw: i32) {
        self.state.lock().gyros.insert(gyro, raw as f64);
    }

    /// Hold or release a joystick button.
    pub fn set_button(&self, button: ButtonId, pressed: bool) {
        let mut state = self.state.lock();
        if pressed {
            state.buttons.insert(button);
        } else {
            state.buttons.remove(&button);
        }
    }

    /// Set a joystick axis. Clamped to `[-127, 127]`.
    pub fn set_axis(&self, axis: AxisId, value: i8) {
        self.state.lock().axes.insert(axis, value.max(-POWER_MAX));
    }

    /// Ground-truth drivetrain pose `(x, y, theta)` with `theta` in radians,
    /// counter-clockwise positive.
    pub fn true_pose(&self) -> (f64, f64, f64) {
        let pose = self.state.lock().pose;
        (pose.x, pose.y, pose.theta)
    }
}

impl Clock for SimHardware {
    fn millis(&self) -> u32 {
        self.state.lock().now_ms
    }

    fn delay_ms(&self, ms: u32) {
        self.advance(ms);
    }
}

impl Hardware for SimHardware {
    fn set_motor_power(&self, port: MotorPort, power: Power) {
        self.state.lock().motors.insert(port, power.max(-POWER_MAX));
    }

    fn motor_power(&self, port: MotorPort) -> Power {
        *self.state.lock().motors.get(&port).unwrap_or(&0)
    }

    fn encoder_ticks(&self, encoder: EncoderId) -> i32 {
        *self.state.lock().encoders.get(&encoder).unwrap_or(&0.0) as i32
    }

    fn reset_encoder(&self, encoder: EncoderId) {
        // the sub-tick position of the disc survives a reset
        let mut state = self.state.lock();
        let ticks = state.encoders.entry(encoder).or_default();
        *ticks = ticks.fract();
    }

    fn analog(&self, port: AnalogPort) -> u16 {
        *self.state.lock().analog.get(&port).unwrap_or(&0.0) as u16
    }

    fn gyro_raw(&self, gyro: GyroId) -> i32 {
        self.state.lock().gyros.get(&gyro).unwrap_or(&0.0).round() as i32
    }

    fn reset_gyro(&self, gyro: GyroId, raw: i32) {
        let mut state = self.state.lock();
        let value = state.gyros.entry(gyro).or_default();
        *value = raw as f64 + (*value - value.round());
    }

    fn button(&self, button: ButtonId) -> bool {
        self.state.lock().buttons.contains(&button)
    }

    fn axis(&self, axis: AxisId) -> i8 {
        *self.state.lock().axes.get(&axis).unwrap_or(&0)
    }
}
