use alloc::{rc::Rc, sync::Arc};
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Signed actuator power. Valid commands lie in `[-POWER_MAX, POWER_MAX]`.
pub type Power = i8;

/// Largest magnitude an actuator accepts.
pub const POWER_MAX: Power = 127;

/// Largest value an analog (potentiometer) port reports.
pub const ANALOG_MAX: u16 = 4095;

/// Motor (PWM) port identifier.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MotorPort(pub u8);

/// Quadrature encoder identifier.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EncoderId(pub u8);

/// Analog input port (potentiometers).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnalogPort(pub u8);

/// Gyroscope identifier.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GyroId(pub u8);

/// A button inside a joystick button group.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Button {
    /// Upper button of the group.
    Up,
    /// Lower button of the group.
    Down,
    /// Left button of the group.
    Left,
    /// Right button of the group.
    Right,
}

/// Fully qualified digital button: joystick, button group and button.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ButtonId {
    /// Joystick number, starting at 1.
    pub joystick: u8,
    /// Button group number on that joystick.
    pub group: u8,
    /// Button within the group.
    pub button: Button,
}

impl ButtonId {
    /// Construct a button identifier.
    pub const fn new(joystick: u8, group: u8, button: Button) -> Self {
        ButtonId { joystick, group, button }
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "joystick {} button {}{:?}", self.joystick, self.group, self.button)
    }
}

/// Analog joystick axis.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AxisId {
    /// Joystick number, starting at 1.
    pub joystick: u8,
    /// Axis number on that joystick.
    pub axis: u8,
}

impl AxisId {
    /// Construct an axis identifier.
    pub const fn new(joystick: u8, axis: u8) -> Self {
        AxisId { joystick, axis }
    }
}

/// Monotonic millisecond clock with a blocking delay.
///
/// Split from [`Hardware`] so controllers that only need elapsed time (the PID
/// controller) can be handed a clock without the rest of the I/O surface.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch. Wraps on overflow.
    fn millis(&self) -> u32;

    /// Block the calling loop for `ms` milliseconds.
    fn delay_ms(&self, ms: u32);
}

/// Actuator and sensor capabilities consumed by the motion core.
///
/// All methods take `&self`: an adapter maps them onto memory-mapped registers
/// or an interior-mutable model, and the core never holds a borrow across calls.
/// Reads of missing devices are the adapter's concern; the core only asks for
/// devices it was told exist.
pub trait Hardware: Clock {
    /// Command a motor port. `power` is in `[-127, 127]`.
    fn set_motor_power(&self, port: MotorPort, power: Power);

    /// Last power commanded on a motor port.
    fn motor_power(&self, port: MotorPort) -> Power;

    /// Signed encoder count.
    fn encoder_ticks(&self, encoder: EncoderId) -> i32;

    /// Zero an encoder.
    fn reset_encoder(&self, encoder: EncoderId);

    /// Analog reading in `[0, 4095]`.
    fn analog(&self, port: AnalogPort) -> u16;

    /// Gyro heading in raw units (tenths of a degree).
    fn gyro_raw(&self, gyro: GyroId) -> i32;

    /// Set a gyro's current reading to `raw`.
    fn reset_gyro(&self, gyro: GyroId, raw: i32);

    /// Whether a joystick button is held.
    fn button(&self, button: ButtonId) -> bool;

    /// Joystick axis value in `[-127, 127]`.
    fn axis(&self, axis: AxisId) -> i8;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn millis(&self) -> u32 {
        (**self).millis()
    }

    fn delay_ms(&self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn millis(&self) -> u32 {
        (**self).millis()
    }

    fn delay_ms(&self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn millis(&self) -> u32 {
        (**self).millis()
    }

    fn delay_ms(&self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

macro_rules! forward_hardware {
    ($($wrapper:ty),*) => {
        $(
            impl<H: Hardware + ?Sized> Hardware for $wrapper {
                fn set_motor_power(&self, port: MotorPort, power: Power) {
                    (**self).set_motor_power(port, power)
                }

                fn motor_power(&self, port: MotorPort) -> Power {
                    (**self).motor_power(port)
                }

                fn encoder_ticks(&self, encoder: EncoderId) -> i32 {
                    (**self).encoder_ticks(encoder)
                }

                fn reset_encoder(&self, encoder: EncoderId) {
                    (**self).reset_encoder(encoder)
                }

                fn analog(&self, port: AnalogPort) -> u16 {
                    (**self).analog(port)
                }

                fn gyro_raw(&self, gyro: GyroId) -> i32 {
                    (**self).gyro_raw(gyro)
                }

                fn reset_gyro(&self, gyro: GyroId, raw: i32) {
                    (**self).reset_gyro(gyro, raw)
                }

                fn button(&self, button: ButtonId) -> bool {
                    (**self).button(button)
                }

                fn axis(&self, axis: AxisId) -> i8 {
                    (**self).axis(axis)
                }
            }
        )*
    };
}

forward_hardware!(&H, Rc<H>, Arc<H>);
