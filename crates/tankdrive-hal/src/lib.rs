#![cfg_attr(not(any(test, feature = "sim")), no_std)]
#![warn(missing_docs)]
#![doc = "Hardware capability interface for differential-drive motion control."]
#![doc = ""]
#![doc = "The motion core never talks to registers directly. It consumes the [`Clock`]"]
#![doc = "and [`Hardware`] traits defined here, which an embedding program implements"]
#![doc = "for its controller. A simulated adapter is available behind the `sim` feature."]

extern crate alloc;

pub mod traits;
pub use traits::hardware::{
    AnalogPort, AxisId, Button, ButtonId, Clock, EncoderId, GyroId, Hardware, MotorPort, Power,
    ANALOG_MAX, POWER_MAX,
};

pub mod timer;
pub use timer::Timer;

#[cfg(feature = "sim")]
pub mod devices;
#[cfg(feature = "sim")]
pub use devices::sim::{SimActuator, SimDrivetrain, SimHardware, SimSensor};
