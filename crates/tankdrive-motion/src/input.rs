//! Operator input strategies for a motor group.
//!
//! A [`MotorGroup`](crate::MotorGroup) carries one [`InputStrategy`] that maps
//! joystick state to a power each time `take_input` is called.

use libm::{fabs, pow};
use tankdrive_hal::{AxisId, ButtonId, Hardware, POWER_MAX, Power};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::util::{sgn, to_power};

/// Source of operator power for a motor group.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(tag = "kind", rename_all = "snake_case")
)]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InputStrategy {
    /// No operator input. `take_input` commands zero.
    #[default]
    None,
    /// A pair of buttons moving the group up and down.
    Buttons(ButtonInput),
    /// A joystick axis mapped through a power curve.
    Joystick(JoystickInput),
}

impl InputStrategy {
    pub(crate) fn power<H: Hardware>(&mut self, hw: &H, current: Power) -> Power {
        match self {
            InputStrategy::None => 0,
            InputStrategy::Buttons(buttons) => buttons.power(hw),
            InputStrategy::Joystick(joystick) => joystick.power(hw, current),
        }
    }
}

/// Up/down button control.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonInput {
    /// Button commanding `up_power`.
    pub up: ButtonId,
    /// Button commanding `down_power`.
    pub down: ButtonId,
    /// Power while `up` is held.
    pub up_power: Power,
    /// Power while `down` is held.
    pub down_power: Power,
    /// Power while neither button is held.
    pub still_power: Power,
    /// Inactive groups command zero regardless of buttons.
    pub active: bool,
}

impl ButtonInput {
    /// Configure a button pair.
    ///
    /// # Arguments
    ///
    /// * `up`, `down`: Buttons moving the group up and down.
    /// * `power`: Power while `up` is held.
    /// * `down_power`: Magnitude while `down` is held, always opposite in sign
    ///   to `power`. Zero mirrors `power`.
    /// * `still_power`: Power while neither is held (a holding power for lifts).
    pub fn new(up: ButtonId, down: ButtonId, power: Power, down_power: Power, still_power: Power) -> Self {
        let power = power.max(-POWER_MAX);
        let down_power = if down_power == 0 {
            -power
        } else {
            let magnitude = (down_power as i16).abs().min(POWER_MAX as i16) as Power;
            if power < 0 { magnitude } else { -magnitude }
        };

        ButtonInput { up, down, up_power: power, down_power, still_power, active: true }
    }

    fn power<H: Hardware>(&self, hw: &H) -> Power {
        if !self.active {
            0
        } else if hw.button(self.up) {
            self.up_power
        } else if hw.button(self.down) {
            self.down_power
        } else {
            self.still_power
        }
    }
}

/// Joystick axis control with a power curve, deadband and optional slew limit.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoystickInput {
    /// Axis read each tick.
    pub axis: AxisId,
    /// Output scale.
    pub coeff: f64,
    /// Exponent of the power curve. 1 is linear.
    pub pow_map: f64,
    /// Largest power change per 100 ms. 0 disables slew limiting.
    pub max_acc_100ms: u8,
    /// Mapped powers below this magnitude become 0.
    pub deadband: u8,
    #[cfg_attr(feature = "serde", serde(skip))]
    last_updated: Option<u32>,
}

impl JoystickInput {
    /// Configure an axis.
    pub fn new(axis: AxisId, coeff: f64, pow_map: f64, max_acc_100ms: u8, deadband: u8) -> Self {
        JoystickInput { axis, coeff, pow_map, max_acc_100ms, deadband, last_updated: None }
    }

    /// Map a raw axis value through the power curve and deadband.
    pub fn map(&self, value: i8) -> Power {
        let v = value as f64;
        let mapped = sgn(v) * self.coeff * pow(fabs(v), self.pow_map)
            / pow(POWER_MAX as f64, self.pow_map - 1.0);

        if fabs(mapped) < self.deadband as f64 { 0 } else { to_power(mapped) }
    }

    fn power<H: Hardware>(&mut self, hw: &H, current: Power) -> Power {
        let desired = self.map(hw.axis(self.axis));
        if self.max_acc_100ms == 0 {
            return desired;
        }

        let now = hw.millis();
        let ms_per_step = (100 / self.max_acc_100ms as u32).max(1);
        let last = *self.last_updated.get_or_insert(now);
        let elapsed = now.wrapping_sub(last);
        // no step can exceed the full power range
        let max_diff = (elapsed / ms_per_step).min(2 * POWER_MAX as u32) as i32;
        let diff = desired as i32 - current as i32;

        if diff.abs() <= max_diff {
            self.last_updated = Some(now);
            desired
        } else if max_diff == 0 {
            current
        } else {
            // carry the unused remainder into the next step
            self.last_updated = Some(now.wrapping_sub(elapsed % ms_per_step));
            (current as i32 + diff.signum() * max_diff).clamp(-(POWER_MAX as i32), POWER_MAX as i32) as Power
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tankdrive_hal::{Button, Clock, SimHardware};

    #[test]
    fn test_button_powers() {
        let hw = SimHardware::new();
        let up = ButtonId::new(1, 6, Button::Up);
        let down = ButtonId::new(1, 6, Button::Down);
        let mut strategy = InputStrategy::Buttons(ButtonInput::new(up, down, 100, 0, -10));

        assert_eq!(strategy.power(&hw, 0), -10);
        hw.set_button(down, true);
        assert_eq!(strategy.power(&hw, 0), -100);
        hw.set_button(up, true);
        assert_eq!(strategy.power(&hw, 0), 100);
    }

    #[test]
    fn test_down_power_opposes_up_power() {
        let up = ButtonId::new(1, 5, Button::Up);
        let down = ButtonId::new(1, 5, Button::Down);
        assert_eq!(ButtonInput::new(up, down, 90, 40, 0).down_power, -40);
        assert_eq!(ButtonInput::new(up, down, 90, -40, 0).down_power, -40);
        assert_eq!(ButtonInput::new(up, down, -90, 40, 0).down_power, 40);
    }

    #[test]
    fn test_inactive_buttons_command_zero() {
        let hw = SimHardware::new();
        let up = ButtonId::new(1, 6, Button::Up);
        let mut buttons = ButtonInput::new(up, ButtonId::new(1, 6, Button::Down), 100, 0, -10);
        buttons.active = false;
        hw.set_button(up, true);
        assert_eq!(InputStrategy::Buttons(buttons).power(&hw, 0), 0);
    }

    #[test]
    fn test_joystick_curve_and_deadband() {
        let linear = JoystickInput::new(AxisId::new(1, 3), 1.0, 1.0, 0, 10);
        assert_eq!(linear.map(100), 100);
        assert_eq!(linear.map(-127), -127);
        assert_eq!(linear.map(9), 0);

        let squared = JoystickInput::new(AxisId::new(1, 3), 1.0, 2.0, 0, 10);
        // 64² / 127 = 32.25
        assert_eq!(squared.map(64), 32);
        assert_eq!(squared.map(-64), -32);
        assert_eq!(squared.map(127), 127);
    }

    #[test]
    fn test_joystick_slew_limit() {
        let hw = SimHardware::new();
        let axis = AxisId::new(1, 2);
        let mut strategy = InputStrategy::Joystick(JoystickInput::new(axis, 1.0, 1.0, 20, 0));
        hw.set_axis(axis, 127);

        // 20 per 100 ms is one power step every 5 ms
        assert_eq!(strategy.power(&hw, 0), 0);
        hw.delay_ms(50);
        assert_eq!(strategy.power(&hw, 0), 10);
        hw.delay_ms(12);
        assert_eq!(strategy.power(&hw, 10), 12);
        hw.delay_ms(3);
        assert_eq!(strategy.power(&hw, 12), 13);
    }

    #[test]
    fn test_joystick_slew_after_long_idle() {
        let hw = SimHardware::new();
        let axis = AxisId::new(1, 3);
        let mut strategy = InputStrategy::Joystick(JoystickInput::new(axis, 1.0, 1.0, 100, 0));
        assert_eq!(strategy.power(&hw, 0), 0);

        // a whole autonomous period without polling
        hw.delay_ms(33_000);
        hw.set_axis(axis, 100);
        assert_eq!(strategy.power(&hw, 0), 100);

        hw.delay_ms(70_000);
        hw.set_axis(axis, -127);
        assert_eq!(strategy.power(&hw, 100), -127);
    }
}
