//! Actuator groups with software position limits.

use alloc::vec::Vec;

use libm::{copysign, fabs};
use tankdrive_hal::{AnalogPort, ANALOG_MAX, EncoderId, Hardware, MotorPort, POWER_MAX, Power, Timer};
use tracing::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::input::InputStrategy;
use crate::pid::Pid;
use crate::util::to_power;

/// Poll interval of the blocking [`MotorGroup::go_to_position`].
const POLL_INTERVAL_MS: u32 = 5;

/// Software position limits of a motor group.
///
/// At or beyond a configured limit, a request driving further out than
/// `max_power` is replaced by `default_power` pointing out of the limit's
/// direction, e.g. `-default_power` at the minimum.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftLimits {
    /// Lowest allowed position.
    pub min: Option<f64>,
    /// Highest allowed position.
    pub max: Option<f64>,
    /// Power substituted at a limit.
    pub default_power: Power,
    /// Largest power still accepted at a limit.
    pub max_power: Power,
}

impl Default for SoftLimits {
    fn default() -> Self {
        SoftLimits { min: None, max: None, default_power: 0, max_power: 20 }
    }
}

impl SoftLimits {
    fn apply(&self, position: f64, power: Power) -> Power {
        let power = power as i16;
        if let Some(min) = self.min {
            if position <= min && power < -(self.max_power as i16) {
                return to_power(-(self.default_power as f64));
            }
        }
        if let Some(max) = self.max {
            if position >= max && power > self.max_power as i16 {
                return self.default_power;
            }
        }
        power as Power
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GroupEncoder {
    id: EncoderId,
    coefficient: f64,
    reversed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Potentiometer {
    port: AnalogPort,
    reversed: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct GroupManeuver {
    target: f64,
    end_power: Power,
    power: Power,
    timeout_ms: u32,
    forward: bool,
    executing: bool,
    timer: Timer,
}

/// A set of motors driven together, with optional position sensing.
///
/// Position comes from the potentiometer when it is the default sensor (or the
/// only one), otherwise from the encoder scaled by its coefficient. A group
/// without sensors reports position 0.
#[derive(Debug)]
pub struct MotorGroup<H: Hardware> {
    hw: H,
    motors: Vec<MotorPort>,
    encoder: Option<GroupEncoder>,
    potentiometer: Option<Potentiometer>,
    pot_is_default: bool,
    limits: SoftLimits,
    maneuver: GroupManeuver,
    position_pid: Option<Pid<H>>,
    targeting: bool,
    input: InputStrategy,
}

impl<H: Hardware + Clone> MotorGroup<H> {
    /// Create a group with no sensors, no limits and no input.
    pub fn new(hw: H, motors: Vec<MotorPort>) -> Self {
        let maneuver = GroupManeuver { timer: Timer::started(&hw), ..Default::default() };
        MotorGroup {
            hw,
            motors,
            encoder: None,
            potentiometer: None,
            pot_is_default: false,
            limits: SoftLimits::default(),
            maneuver,
            position_pid: None,
            targeting: false,
            input: InputStrategy::None,
        }
    }

    /// Command every motor, subject to soft limits.
    pub fn set_power(&self, power: Power) {
        let position = self.position();
        self.force_power(self.limits.apply(position, power));
    }

    /// Command every motor, ignoring soft limits.
    pub fn force_power(&self, power: Power) {
        let power = power.max(-POWER_MAX);
        for &motor in &self.motors {
            self.hw.set_motor_power(motor, power);
        }
    }

    /// Last power commanded to the first motor.
    pub fn power(&self) -> Power {
        self.motors.first().map(|&motor| self.hw.motor_power(motor)).unwrap_or(0)
    }

    /// Motor ports in the group.
    pub fn motors(&self) -> &[MotorPort] {
        &self.motors
    }

    /// Attach an encoder.
    ///
    /// # Arguments
    ///
    /// * `id`: Encoder to read.
    /// * `coefficient`: Distance per tick.
    /// * `reversed`: Negate readings.
    pub fn add_encoder(&mut self, id: EncoderId, coefficient: f64, reversed: bool) {
        debug!(encoder = id.0, coefficient, reversed, "encoder attached");
        self.encoder = Some(GroupEncoder { id, coefficient, reversed });
    }

    /// Attach a potentiometer. A reversed pot reads `4095 - raw`.
    pub fn add_potentiometer(&mut self, port: AnalogPort, reversed: bool) {
        debug!(port = port.0, reversed, "potentiometer attached");
        self.potentiometer = Some(Potentiometer { port, reversed });
    }

    /// Choose the potentiometer (`true`) or encoder (`false`) for positions
    /// when both are attached.
    pub fn set_pot_default(&mut self, pot_is_default: bool) {
        self.pot_is_default = pot_is_default;
    }

    /// Whether the potentiometer is the default position sensor.
    pub fn is_pot_default(&self) -> bool {
        self.pot_is_default
    }

    /// Whether an encoder is attached.
    pub fn has_encoder(&self) -> bool {
        self.encoder.is_some()
    }

    /// Whether a potentiometer is attached.
    pub fn has_potentiometer(&self) -> bool {
        self.potentiometer.is_some()
    }

    /// Distance per encoder tick, if an encoder is attached.
    pub fn encoder_coefficient(&self) -> Option<f64> {
        self.encoder.map(|enc| enc.coefficient)
    }

    /// Encoder reading: signed ticks when `raw`, otherwise ticks scaled by the
    /// coefficient. 0 without an encoder.
    pub fn encoder_val(&self, raw: bool) -> f64 {
        match self.encoder {
            Some(enc) => {
                let ticks = self.hw.encoder_ticks(enc.id) as f64;
                let ticks = if enc.reversed { -ticks } else { ticks };
                if raw { ticks } else { ticks * enc.coefficient }
            }
            None => 0.0,
        }
    }

    /// Zero the encoder, if attached.
    pub fn reset_encoder(&self) {
        if let Some(enc) = self.encoder {
            self.hw.reset_encoder(enc.id);
        }
    }

    /// Potentiometer reading in `[0, 4095]`. 0 without a potentiometer.
    pub fn pot_val(&self) -> f64 {
        match self.potentiometer {
            Some(pot) => {
                let raw = self.hw.analog(pot.port).min(ANALOG_MAX);
                (if pot.reversed { ANALOG_MAX - raw } else { raw }) as f64
            }
            None => 0.0,
        }
    }

    /// Position from the authoritative sensor.
    pub fn position(&self) -> f64 {
        match (self.potentiometer.is_some(), self.encoder.is_some()) {
            (true, true) if self.pot_is_default => self.pot_val(),
            (true, false) => self.pot_val(),
            (_, true) => self.encoder_val(false),
            (false, false) => 0.0,
        }
    }

    /// Configure a lower position limit.
    pub fn set_abs_min(&mut self, min: f64, default_power: Power, max_power: Power) {
        self.limits.min = Some(min);
        self.limits.default_power = default_power;
        self.limits.max_power = max_power;
    }

    /// Configure an upper position limit.
    pub fn set_abs_max(&mut self, max: f64, default_power: Power, max_power: Power) {
        self.limits.max = Some(max);
        self.limits.default_power = default_power;
        self.limits.max_power = max_power;
    }

    /// Configure both position limits.
    pub fn set_absolutes(&mut self, min: f64, max: f64, default_power: Power, max_power: Power) {
        self.limits = SoftLimits { min: Some(min), max: Some(max), default_power, max_power };
    }

    /// Replace the soft limits wholesale.
    pub fn set_limits(&mut self, limits: SoftLimits) {
        self.limits = limits;
    }

    /// Current soft limits.
    pub fn limits(&self) -> SoftLimits {
        self.limits
    }

    /// Command `|power|` toward `position`.
    pub fn move_toward_position(&self, position: f64, power: Power) {
        let direction = position - self.position();
        self.set_power(to_power(copysign(fabs(power as f64), direction)));
    }

    /// Arm a move-until-past-target maneuver.
    ///
    /// The direction is fixed now as `target > position`. Polling with
    /// [`execute_maneuver`](Self::execute_maneuver) keeps `maneuver_power`
    /// applied while the group is short of `target`; once it has been at or
    /// past the target for longer than `timeout_ms`, `end_power` is applied
    /// and the maneuver ends.
    pub fn create_maneuver(&mut self, target: f64, end_power: Power, maneuver_power: Power, timeout_ms: u32) {
        let forward = target > self.position();
        let magnitude = (maneuver_power as i16).abs().min(POWER_MAX as i16) as Power;
        let power = if forward { magnitude } else { -magnitude };

        self.maneuver = GroupManeuver {
            target,
            end_power,
            power,
            timeout_ms,
            forward,
            executing: true,
            timer: Timer::started(&self.hw),
        };
        debug!(target, power, timeout_ms, "group maneuver armed");

        self.set_power(power);
    }

    /// Advance the maneuver. Call every tick while it is executing.
    pub fn execute_maneuver(&mut self) {
        if !self.maneuver.executing {
            return;
        }

        let position = self.position();
        if self.maneuver.forward == (position < self.maneuver.target) {
            self.maneuver.timer.reset(&self.hw);
            self.set_power(self.maneuver.power);
        } else if self.maneuver.timer.elapsed(&self.hw) > self.maneuver.timeout_ms {
            self.maneuver.executing = false;
            debug!(position, end_power = self.maneuver.end_power, "group maneuver finished");
            self.set_power(self.maneuver.end_power);
        }
    }

    /// End the maneuver and stop the motors.
    pub fn stop_maneuver(&mut self) {
        self.maneuver.executing = false;
        self.set_power(0);
    }

    /// Whether a maneuver is executing.
    pub fn maneuver_executing(&self) -> bool {
        self.maneuver.executing
    }

    /// Blocking [`create_maneuver`](Self::create_maneuver) polled to completion.
    pub fn go_to_position(&mut self, target: f64, end_power: Power, maneuver_power: Power, timeout_ms: u32) {
        self.create_maneuver(target, end_power, maneuver_power, timeout_ms);
        while self.maneuver.executing {
            self.hw.delay_ms(POLL_INTERVAL_MS);
            self.execute_maneuver();
        }
    }

    /// Install the controller used by position targeting.
    pub fn set_position_pid(&mut self, kp: f64, ki: f64, kd: f64) {
        let target = self.position_pid.as_ref().map(|pid| pid.target()).unwrap_or_else(|| self.position());
        self.position_pid = Some(Pid::new(self.hw.clone(), target, kp, ki, kd));
    }

    /// Set the held position and activate targeting.
    pub fn set_target_position(&mut self, position: f64) {
        if let Some(pid) = self.position_pid.as_mut() {
            pid.change_target(position);
        }
        self.targeting = true;
    }

    /// Target position, if a controller is installed.
    pub fn target_position(&self) -> Option<f64> {
        self.position_pid.as_ref().map(|pid| pid.target())
    }

    /// Resume holding the target position.
    pub fn activate_position_targeting(&mut self) {
        self.targeting = true;
    }

    /// Stop holding the target position.
    pub fn deactivate_position_targeting(&mut self) {
        self.targeting = false;
    }

    /// Whether position targeting is active.
    pub fn position_targeting(&self) -> bool {
        self.targeting
    }

    /// Drive toward the target position. Call every tick.
    ///
    /// # Returns
    ///
    /// The commanded power, or `None` when targeting is inactive or no
    /// controller is installed.
    pub fn maintain_target_position(&mut self) -> Option<Power> {
        if !self.targeting {
            return None;
        }
        let position = self.position();
        let pid = self.position_pid.as_mut()?;
        let power = to_power(pid.evaluate(position));
        trace!(position, power, "holding position");
        self.set_power(power);
        Some(power)
    }

    /// Replace the operator input strategy.
    pub fn set_input_strategy(&mut self, input: InputStrategy) {
        self.input = input;
    }

    /// Current operator input strategy.
    pub fn input_strategy(&self) -> &InputStrategy {
        &self.input
    }

    /// Read operator input, apply it through the soft limits and return it.
    pub fn take_input(&mut self) -> Power {
        let current = self.power();
        let power = self.input.power(&self.hw, current);
        self.set_power(power);
        power
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{ButtonInput, JoystickInput};
    use tankdrive_hal::{AxisId, Button, ButtonId, Clock, SimActuator, SimHardware, SimSensor};
    const EPSILON: f64 = 1e-9;

    fn lift(hw: &SimHardware) -> MotorGroup<&SimHardware> {
        let mut group = MotorGroup::new(hw, vec![MotorPort(3), MotorPort(4)]);
        group.add_potentiometer(AnalogPort(1), false);
        group
    }

    #[test]
    fn test_set_power_drives_every_motor() {
        let hw = SimHardware::new();
        let group = MotorGroup::new(&hw, vec![MotorPort(1), MotorPort(2)]);
        group.set_power(-128);
        assert_eq!(hw.motor_power(MotorPort(1)), -127);
        assert_eq!(hw.motor_power(MotorPort(2)), -127);
        assert_eq!(group.power(), -127);
    }

    #[test]
    fn test_soft_min_substitutes_default_power() {
        let hw = SimHardware::new();
        let mut group = lift(&hw);
        group.set_abs_min(500.0, 15, 20);
        hw.set_analog(AnalogPort(1), 500);

        group.set_power(-21);
        assert_eq!(group.power(), -15);

        group.set_power(-20);
        assert_eq!(group.power(), -20);

        group.set_power(60);
        assert_eq!(group.power(), 60);

        group.force_power(-90);
        assert_eq!(group.power(), -90);
    }

    #[test]
    fn test_soft_max_and_inside_range() {
        let hw = SimHardware::new();
        let mut group = lift(&hw);
        group.set_absolutes(500.0, 3000.0, 10, 20);

        hw.set_analog(AnalogPort(1), 3100);
        group.set_power(100);
        assert_eq!(group.power(), 10);
        group.set_power(-100);
        assert_eq!(group.power(), -100);

        hw.set_analog(AnalogPort(1), 1000);
        group.set_power(127);
        assert_eq!(group.power(), 127);
        group.set_power(-127);
        assert_eq!(group.power(), -127);
    }

    #[test]
    fn test_position_sensor_selection() {
        let hw = SimHardware::new();
        let mut group = MotorGroup::new(&hw, vec![MotorPort(1)]);
        assert_eq!(group.position(), 0.0);

        group.add_encoder(EncoderId(2), 0.5, true);
        hw.set_encoder(EncoderId(2), 40);
        assert!((group.position() + 20.0).abs() < EPSILON);
        assert!((group.encoder_val(true) + 40.0).abs() < EPSILON);

        group.add_potentiometer(AnalogPort(3), true);
        hw.set_analog(AnalogPort(3), 95);
        assert!((group.position() + 20.0).abs() < EPSILON);

        group.set_pot_default(true);
        assert!((group.position() - 4000.0).abs() < EPSILON);

        group.reset_encoder();
        assert_eq!(group.encoder_val(false), 0.0);
    }

    #[test]
    fn test_maneuver_timeout_boundary() {
        let hw = SimHardware::new();
        let mut group = lift(&hw);
        hw.set_analog(AnalogPort(1), 1000);

        group.create_maneuver(2000.0, 15, 100, 50);
        assert!(group.maneuver_executing());
        assert_eq!(group.power(), 100);

        // short of target: timer keeps resetting
        hw.delay_ms(200);
        group.execute_maneuver();
        assert!(group.maneuver_executing());

        // past target: power held until the overshoot outlasts the timeout
        hw.set_analog(AnalogPort(1), 2100);
        group.execute_maneuver();
        hw.delay_ms(50);
        group.execute_maneuver();
        assert!(group.maneuver_executing());
        assert_eq!(group.power(), 100);

        hw.delay_ms(1);
        group.execute_maneuver();
        assert!(!group.maneuver_executing());
        assert_eq!(group.power(), 15);
    }

    #[test]
    fn test_maneuver_direction_fixed_at_start() {
        let hw = SimHardware::new();
        let mut group = lift(&hw);
        hw.set_analog(AnalogPort(1), 3000);

        group.create_maneuver(1000.0, 0, 127, 10);
        assert_eq!(group.power(), -127);

        hw.set_analog(AnalogPort(1), 900);
        group.execute_maneuver();
        hw.delay_ms(11);
        group.execute_maneuver();
        assert!(!group.maneuver_executing());
        assert_eq!(group.power(), 0);
    }

    #[test]
    fn test_go_to_position_with_simulated_lift() {
        let hw = SimHardware::new();
        hw.attach_actuator(SimActuator {
            motors: vec![MotorPort(3)],
            sensor: SimSensor::Potentiometer(AnalogPort(1)),
            rate: 5.0,
        });
        hw.set_analog(AnalogPort(1), 1000);
        let mut group = lift(&hw);

        group.go_to_position(1800.0, -10, 127, 20);
        assert!(!group.maneuver_executing());
        assert!(group.pot_val() >= 1800.0);
        assert_eq!(group.power(), -10);
    }

    #[test]
    fn test_move_toward_position() {
        let hw = SimHardware::new();
        let group = lift(&hw);
        hw.set_analog(AnalogPort(1), 2000);
        group.move_toward_position(500.0, 80);
        assert_eq!(group.power(), -80);
        group.move_toward_position(2500.0, -80);
        assert_eq!(group.power(), 80);
    }

    #[test]
    fn test_position_targeting() {
        let hw = SimHardware::new();
        let mut group = lift(&hw);
        hw.set_analog(AnalogPort(1), 1000);
        assert_eq!(group.maintain_target_position(), None);

        group.set_position_pid(0.2, 0.0, 0.0);
        group.set_target_position(1500.0);
        hw.delay_ms(1);
        assert_eq!(group.maintain_target_position(), Some(100));
        assert_eq!(group.power(), 100);

        group.deactivate_position_targeting();
        hw.delay_ms(1);
        assert_eq!(group.maintain_target_position(), None);
        assert_eq!(group.target_position(), Some(1500.0));
    }

    #[test]
    fn test_take_input_respects_limits() {
        let hw = SimHardware::new();
        let mut group = lift(&hw);
        group.set_abs_min(500.0, 0, 20);
        let up = ButtonId::new(1, 6, Button::Up);
        let down = ButtonId::new(1, 6, Button::Down);
        group.set_input_strategy(InputStrategy::Buttons(ButtonInput::new(up, down, 100, 0, 0)));

        hw.set_analog(AnalogPort(1), 400);
        hw.set_button(down, true);
        assert_eq!(group.take_input(), -100);
        assert_eq!(group.power(), 0);

        group.set_input_strategy(InputStrategy::Joystick(JoystickInput::new(AxisId::new(1, 2), 0.5, 1.0, 0, 5)));
        hw.set_axis(AxisId::new(1, 2), 100);
        assert_eq!(group.take_input(), 50);
        assert_eq!(group.power(), 50);
    }
}
