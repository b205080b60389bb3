//! Turn and drive maneuvers as a polled state machine.
//!
//! A maneuver is armed with `begin_turn`/`begin_drive` and advanced by
//! `execute_maneuver` once per tick. On arrival (or stall) it brakes, cuts
//! power and settles, each as a timed phase, so polling never blocks.
//! `turn`/`drive` wrap the same machine in a blocking loop.

use core::f64::consts::PI;

use libm::{fabs, sin};
use tankdrive_hal::{Hardware, POWER_MAX, Power, Timer};
use tracing::{debug, trace, warn};

use super::{EncoderConfig, ParallelDrive};
use crate::angle::{AngleUnit, convert_angle};
use crate::error::MotionError;
use crate::pid::Pid;
use crate::ramp::Ramp;
use crate::settings::{DriveCorrection, DriveSettings, TurnSettings};
use crate::util::{sgn, to_power};

/// Poll interval of the blocking `turn`/`drive` wrappers.
const POLL_INTERVAL_MS: u32 = 5;

/// What the drive is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManeuverState {
    /// No maneuver armed.
    Idle,
    /// Turning in place.
    Turning,
    /// Driving straight.
    Driving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Braking,
    Settling,
}

#[derive(Debug)]
enum Kind<H: Hardware> {
    Turn {
        using_gyro: bool,
        best_progress: f64,
    },
    Drive {
        correction: DriveCorrection,
        correction_pid: Pid<H>,
        raw_value: bool,
        min_travel_per_sample: f64,
        sample_time_ms: u32,
        sample_timer: Timer,
        left_dist: f64,
        right_dist: f64,
    },
}

#[derive(Debug)]
pub(crate) struct Maneuver<H: Hardware> {
    kind: Kind<H>,
    target: f64,
    ramp: Ramp<H>,
    progress: f64,
    phase: Phase,
    phase_timer: Timer,
    timeout_timer: Timer,
    timeout_ms: u32,
    brake_power: Power,
    brake_ms: u32,
    settle_ms: u32,
}

enum Step {
    Continue,
    Arrived,
    Stalled,
}

/// Split the post-arrival wait into brake and settle time.
fn end_phases(wait_at_end_ms: u32, brake_duration_ms: u32) -> (u32, u32) {
    let brake = brake_duration_ms.min(wait_at_end_ms);
    (brake, wait_at_end_ms - brake)
}

/// Scale both sides down together so neither exceeds full power.
fn fit_to_range(left: f64, right: f64) -> (f64, f64) {
    let largest = fabs(left).max(fabs(right));
    let limit = POWER_MAX as f64;
    if largest > limit {
        (left * limit / largest, right * limit / largest)
    } else {
        (left, right)
    }
}

impl<H: Hardware + Clone> ParallelDrive<H> {
    /// Resolve a requested correction against the attached sensors.
    ///
    /// `Auto` and `Encoder` need encoders on both sides, `Gyro` needs a gyro.
    /// Anything unsatisfiable becomes `None`.
    pub fn resolve_correction(&self, requested: DriveCorrection) -> DriveCorrection {
        let both_encoders = self.left.has_encoder() && self.right.has_encoder();
        match requested {
            DriveCorrection::None => DriveCorrection::None,
            DriveCorrection::Gyro if self.has_gyro() => DriveCorrection::Gyro,
            DriveCorrection::Encoder | DriveCorrection::Auto if both_encoders => DriveCorrection::Encoder,
            DriveCorrection::Auto => DriveCorrection::None,
            DriveCorrection::Gyro | DriveCorrection::Encoder => {
                warn!(?requested, "correction sensors missing, driving uncorrected");
                DriveCorrection::None
            }
        }
    }

    /// Arm a turn in place. Positive angles turn clockwise (left side forward).
    ///
    /// Progress is the gyro heading change when `use_gyro` is set and a gyro is
    /// attached, otherwise the wheel travel, for which the target becomes the
    /// arc length `π · width · degrees / 360`. Replaces any armed maneuver.
    ///
    /// # Errors
    ///
    /// [`MotionError::Ramp`] if the ramp cannot be built over the target.
    pub fn begin_turn(&mut self, angle: f64, settings: &TurnSettings) -> Result<(), MotionError> {
        let degrees = convert_angle(angle, settings.unit, AngleUnit::Degrees);
        let using_gyro = settings.use_gyro && self.has_gyro();
        if settings.use_gyro && !using_gyro {
            warn!("no gyro attached, turning by encoder travel");
        }
        if !using_gyro && self.encoder_config == EncoderConfig::Unassigned {
            warn!("turning without progress sensors, the turn will time out");
        }

        let target = if using_gyro { degrees } else { PI * self.width * degrees / 360.0 };
        let ramp = settings.ramp.build(self.hw.clone(), fabs(target))?;

        self.reset_gyro();
        self.clear_maneuver_travel();

        let (brake_ms, settle_ms) = end_phases(settings.wait_at_end_ms, settings.brake_duration_ms);
        self.maneuver = Some(Maneuver {
            kind: Kind::Turn { using_gyro, best_progress: 0.0 },
            target,
            ramp,
            progress: 0.0,
            phase: Phase::Running,
            phase_timer: Timer::started(&self.hw),
            timeout_timer: Timer::started(&self.hw),
            timeout_ms: settings.timeout_ms,
            brake_power: settings.brake_power,
            brake_ms,
            settle_ms,
        });
        debug!(target, using_gyro, "turn armed");
        Ok(())
    }

    /// Arm a straight drive of `distance` (negative drives backward).
    ///
    /// Replaces any armed maneuver.
    ///
    /// # Errors
    ///
    /// [`MotionError::Ramp`] if the ramp cannot be built over the distance.
    pub fn begin_drive(&mut self, distance: f64, settings: &DriveSettings) -> Result<(), MotionError> {
        let ramp = settings.ramp.build(self.hw.clone(), fabs(distance))?;
        let correction = self.resolve_correction(settings.correction);
        if correction == DriveCorrection::Gyro {
            self.reset_gyro();
        }
        self.clear_maneuver_travel();

        let gains = settings.correction_gains;
        let (brake_ms, settle_ms) = end_phases(settings.wait_at_end_ms, settings.brake_duration_ms);
        self.maneuver = Some(Maneuver {
            kind: Kind::Drive {
                correction,
                correction_pid: Pid::new(self.hw.clone(), 0.0, gains.kp, gains.ki, gains.kd),
                raw_value: settings.raw_value,
                min_travel_per_sample: settings.min_speed * settings.sample_time_ms as f64 / 1000.0,
                sample_time_ms: settings.sample_time_ms,
                sample_timer: Timer::started(&self.hw),
                left_dist: 0.0,
                right_dist: 0.0,
            },
            target: distance,
            ramp,
            progress: 0.0,
            phase: Phase::Running,
            phase_timer: Timer::started(&self.hw),
            timeout_timer: Timer::started(&self.hw),
            timeout_ms: settings.timeout_ms,
            brake_power: settings.brake_power,
            brake_ms,
            settle_ms,
        });
        debug!(distance, ?correction, "drive armed");
        Ok(())
    }

    /// Advance the armed maneuver. Call once per tick; never blocks.
    pub fn execute_maneuver(&mut self) {
        let Some(mut maneuver) = self.maneuver.take() else {
            return;
        };

        if maneuver.phase == Phase::Running {
            let step = match maneuver.kind {
                Kind::Turn { .. } => self.run_turn(&mut maneuver),
                Kind::Drive { .. } => self.run_drive(&mut maneuver),
            };
            match step {
                Step::Continue => {}
                Step::Arrived => {
                    debug!(progress = maneuver.progress, target = maneuver.target, "maneuver arrived");
                    self.begin_braking(&mut maneuver);
                }
                Step::Stalled => {
                    debug!(progress = maneuver.progress, target = maneuver.target, "maneuver timed out");
                    self.begin_braking(&mut maneuver);
                }
            }
        }

        if maneuver.phase == Phase::Braking && maneuver.phase_timer.elapsed(&self.hw) >= maneuver.brake_ms {
            self.set_drive_power(0, 0);
            maneuver.phase = Phase::Settling;
            maneuver.phase_timer.reset(&self.hw);
        }

        if maneuver.phase == Phase::Settling && maneuver.phase_timer.elapsed(&self.hw) >= maneuver.settle_ms {
            debug!(progress = maneuver.progress, "maneuver finished");
            return;
        }

        self.maneuver = Some(maneuver);
    }

    fn run_turn(&mut self, maneuver: &mut Maneuver<H>) -> Step {
        let Kind::Turn { using_gyro, best_progress } = &mut maneuver.kind else {
            return Step::Continue;
        };

        maneuver.progress = if *using_gyro {
            fabs(self.gyro_val(AngleUnit::Degrees))
        } else {
            let travel = self.take_maneuver_travel(false);
            maneuver.progress + self.configured_travel(travel)
        };

        if maneuver.progress > *best_progress {
            *best_progress = maneuver.progress;
            maneuver.timeout_timer.reset(&self.hw);
        }

        if maneuver.progress >= fabs(maneuver.target) {
            return Step::Arrived;
        }
        if maneuver.timeout_timer.elapsed(&self.hw) > maneuver.timeout_ms {
            return Step::Stalled;
        }

        let power = to_power(sgn(maneuver.target) * maneuver.ramp.evaluate(maneuver.progress));
        trace!(progress = maneuver.progress, power, "turning");
        self.set_drive_power(power, -power);
        Step::Continue
    }

    fn run_drive(&mut self, maneuver: &mut Maneuver<H>) -> Step {
        let Kind::Drive {
            correction,
            correction_pid,
            raw_value,
            min_travel_per_sample,
            sample_time_ms,
            sample_timer,
            left_dist,
            right_dist,
        } = &mut maneuver.kind
        else {
            return Step::Continue;
        };

        if sample_timer.elapsed(&self.hw) > *sample_time_ms {
            sample_timer.reset(&self.hw);

            let travel = self.take_maneuver_travel(*raw_value);
            *left_dist += fabs(travel.0);
            *right_dist += fabs(travel.1);
            maneuver.progress = self.configured_travel((*left_dist, *right_dist));

            if self.configured_travel(travel) > *min_travel_per_sample {
                maneuver.timeout_timer.reset(&self.hw);
            }

            if maneuver.progress >= fabs(maneuver.target) {
                return Step::Arrived;
            }

            let direction = sgn(maneuver.target);
            // driving backward, a fast right side turns the robot clockwise
            let error = match correction {
                DriveCorrection::Encoder => *right_dist - *left_dist,
                DriveCorrection::Gyro => direction * sin(self.gyro_val(AngleUnit::Radians)) * maneuver.progress,
                DriveCorrection::None | DriveCorrection::Auto => 0.0,
            };

            let base = maneuver.ramp.evaluate(maneuver.progress);
            let correction_percent = 1.0 + correction_pid.evaluate(error);
            let (left, right) = fit_to_range(base, base * correction_percent);

            trace!(progress = maneuver.progress, error, left, right, "driving");
            self.set_drive_power(to_power(direction * left), to_power(direction * right));
        }

        if maneuver.timeout_timer.elapsed(&self.hw) > maneuver.timeout_ms {
            return Step::Stalled;
        }
        Step::Continue
    }

    fn begin_braking(&mut self, maneuver: &mut Maneuver<H>) {
        let brake = sgn(maneuver.target) * maneuver.brake_power as f64;
        let (left, right) = match maneuver.kind {
            Kind::Turn { .. } => (-brake, brake),
            Kind::Drive { .. } => (-brake, -brake),
        };
        self.set_drive_power(to_power(left), to_power(right));
        maneuver.phase = Phase::Braking;
        maneuver.phase_timer.reset(&self.hw);
    }

    /// Brake and wind down the armed maneuver. Keep polling until it is idle.
    pub fn stop_maneuver(&mut self) {
        if let Some(mut maneuver) = self.maneuver.take() {
            if maneuver.phase == Phase::Running {
                self.begin_braking(&mut maneuver);
            }
            self.maneuver = Some(maneuver);
        }
    }

    /// Blocking [`begin_turn`](Self::begin_turn) polled to completion, with
    /// odometry updated along the way.
    ///
    /// # Errors
    ///
    /// As [`begin_turn`](Self::begin_turn). Nothing moves on error.
    pub fn turn(&mut self, angle: f64, settings: &TurnSettings) -> Result<(), MotionError> {
        self.begin_turn(angle, settings)?;
        self.run_to_completion();
        Ok(())
    }

    /// Blocking [`begin_drive`](Self::begin_drive) polled to completion, with
    /// odometry updated along the way.
    ///
    /// # Errors
    ///
    /// As [`begin_drive`](Self::begin_drive). Nothing moves on error.
    pub fn drive(&mut self, distance: f64, settings: &DriveSettings) -> Result<(), MotionError> {
        self.begin_drive(distance, settings)?;
        self.run_to_completion();
        Ok(())
    }

    fn run_to_completion(&mut self) {
        loop {
            self.execute_maneuver();
            self.update_position();
            if self.maneuver.is_none() {
                break;
            }
            self.hw.delay_ms(POLL_INTERVAL_MS);
        }
    }

    /// Current maneuver type.
    pub fn maneuver_state(&self) -> ManeuverState {
        match self.maneuver.as_ref().map(|m| &m.kind) {
            None => ManeuverState::Idle,
            Some(Kind::Turn { .. }) => ManeuverState::Turning,
            Some(Kind::Drive { .. }) => ManeuverState::Driving,
        }
    }

    /// Whether a maneuver is armed (including its brake and settle phases).
    pub fn maneuver_executing(&self) -> bool {
        self.maneuver.is_some()
    }

    /// Distance driven or angle turned so far, 0 when idle. Turns report
    /// degrees when measured by gyro, otherwise wheel travel.
    pub fn maneuver_progress(&self) -> f64 {
        self.maneuver.as_ref().map(|m| m.progress).unwrap_or(0.0)
    }
}
