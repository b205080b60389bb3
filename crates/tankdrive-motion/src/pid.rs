//! Single-input PID controller with sample gating.

use libm::{copysign, fabs};
use tankdrive_hal::{Clock, Timer};

/// PID controller that updates at most once per `min_sample_time`.
///
/// The controller owns a handle to the clock it gates on. Between updates
/// [`Pid::evaluate`] returns the previous output unchanged.
///
/// Integral accumulation saturates per step rather than in total: each update
/// adds the error itself while `|error| <= integral_max` (or when
/// `integral_max` is zero), otherwise `integral_max` with the sign of the
/// error.
#[derive(Debug, Clone)]
pub struct Pid<C: Clock> {
    clock: C,
    timer: Timer,
    target: f64,
    kp: f64,
    ki: f64,
    kd: f64,
    integral: f64,
    prev_error: f64,
    prev_output: f64,
    min_sample_time: u32,
    integral_max: f64,
    use_time_adjustment: bool,
}

impl<C: Clock> Pid<C> {
    /// Create a controller with no sample gating, no integral step limit and
    /// no time adjustment.
    ///
    /// # Arguments
    ///
    /// * `clock`: Clock used to gate updates.
    /// * `target`: Setpoint.
    /// * `kp`, `ki`, `kd`: Gains. Not range-checked.
    pub fn new(clock: C, target: f64, kp: f64, ki: f64, kd: f64) -> Self {
        let timer = Timer::started(&clock);
        Pid {
            clock,
            timer,
            target,
            kp,
            ki,
            kd,
            integral: 0.0,
            prev_error: 0.0,
            prev_output: 0.0,
            min_sample_time: 0,
            integral_max: 0.0,
            use_time_adjustment: false,
        }
    }

    /// Require more than `ms` milliseconds between updates.
    pub fn with_min_sample_time(mut self, ms: u32) -> Self {
        self.min_sample_time = ms;
        self
    }

    /// Bound each integral step to `|max|`. Zero disables the bound.
    pub fn with_integral_max(mut self, max: f64) -> Self {
        self.integral_max = fabs(max);
        self
    }

    /// Scale the integral and derivative terms by the elapsed update interval.
    pub fn with_time_adjustment(mut self, enabled: bool) -> Self {
        self.use_time_adjustment = enabled;
        self
    }

    /// Feed a measurement and return the controller output.
    ///
    /// # Arguments
    ///
    /// * `measurement`: Current value of the controlled quantity.
    ///
    /// # Returns
    ///
    /// The new output if more than `min_sample_time` ms have passed since the
    /// last update, otherwise the previous output.
    pub fn evaluate(&mut self, measurement: f64) -> f64 {
        let elapsed = self.timer.elapsed(&self.clock);
        if elapsed <= self.min_sample_time {
            return self.prev_output;
        }
        self.timer.reset(&self.clock);

        let error = self.target - measurement;
        let time_factor = if self.use_time_adjustment { elapsed as f64 } else { 1.0 };

        self.integral += if self.integral_max == 0.0 || fabs(error) <= self.integral_max {
            error
        } else {
            copysign(self.integral_max, error)
        };

        self.prev_output = self.kp * error
            + self.ki * self.integral * time_factor
            + self.kd * (error - self.prev_error) / time_factor;
        self.prev_error = error;

        self.prev_output
    }

    /// Zero the integral and previous error and restart the sample timer.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
        self.timer.reset(&self.clock);
    }

    /// Move the setpoint and [`reset`](Self::reset).
    pub fn change_target(&mut self, target: f64) {
        self.target = target;
        self.reset();
    }

    /// Current setpoint.
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Gains as `(kp, ki, kd)`.
    pub fn gains(&self) -> (f64, f64, f64) {
        (self.kp, self.ki, self.kd)
    }

    /// Replace all three gains.
    pub fn set_gains(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    /// Accumulated integral.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Overwrite the accumulated integral.
    pub fn set_integral(&mut self, integral: f64) {
        self.integral = integral;
    }

    /// Minimum time between updates (ms).
    pub fn min_sample_time(&self) -> u32 {
        self.min_sample_time
    }

    /// Set the minimum time between updates (ms).
    pub fn set_min_sample_time(&mut self, ms: u32) {
        self.min_sample_time = ms;
    }

    /// Per-step integral bound, always non-negative.
    pub fn integral_max(&self) -> f64 {
        self.integral_max
    }

    /// Set the per-step integral bound. Stored as a magnitude.
    pub fn set_integral_max(&mut self, max: f64) {
        self.integral_max = fabs(max);
    }

    /// Output of the most recent update.
    pub fn last_output(&self) -> f64 {
        self.prev_output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tankdrive_hal::SimHardware;
    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_integral_steps_saturate_above_bound() {
        let hw = SimHardware::new();
        let mut pid = Pid::new(&hw, 10.0, 0.0, 1.0, 0.0).with_integral_max(2.0);

        for step in 1..=3 {
            hw.delay_ms(1);
            pid.evaluate(0.0);
            assert!((pid.integral() - 2.0 * step as f64).abs() < EPSILON);
        }

        hw.delay_ms(1);
        pid.evaluate(20.0);
        assert!((pid.integral() - 4.0).abs() < EPSILON);
    }

    #[test]
    fn test_integral_adds_error_within_bound_or_unbounded() {
        let hw = SimHardware::new();
        let mut bounded = Pid::new(&hw, 1.5, 0.0, 1.0, 0.0).with_integral_max(-2.0);
        let mut unbounded = Pid::new(&hw, 50.0, 0.0, 1.0, 0.0);
        assert!((bounded.integral_max() - 2.0).abs() < EPSILON);

        hw.delay_ms(1);
        bounded.evaluate(0.0);
        unbounded.evaluate(0.0);
        assert!((bounded.integral() - 1.5).abs() < EPSILON);
        assert!((unbounded.integral() - 50.0).abs() < EPSILON);
    }

    #[test]
    fn test_sample_gating_holds_output() {
        let hw = SimHardware::new();
        let mut pid = Pid::new(&hw, 100.0, 0.5, 0.0, 0.0).with_min_sample_time(30);

        hw.delay_ms(31);
        let first = pid.evaluate(0.0);
        assert!((first - 50.0).abs() < EPSILON);

        hw.delay_ms(10);
        let second = pid.evaluate(60.0);
        assert_eq!(first, second);

        // exactly min_sample_time is still gated
        hw.delay_ms(20);
        assert_eq!(pid.evaluate(60.0), first);

        hw.delay_ms(1);
        assert!((pid.evaluate(60.0) - 20.0).abs() < EPSILON);
    }

    #[test]
    fn test_derivative_and_time_adjustment() {
        let hw = SimHardware::new();
        let mut pid = Pid::new(&hw, 0.0, 0.0, 1.0, 10.0).with_time_adjustment(true);

        hw.delay_ms(5);
        // error -4, integral -4 scaled by 5 ms, derivative -4 / 5
        let output = pid.evaluate(4.0);
        assert!((output - (-4.0 * 5.0 + 10.0 * -4.0 / 5.0)).abs() < EPSILON);
    }

    #[test]
    fn test_change_target_resets_state() {
        let hw = SimHardware::new();
        let mut pid = Pid::new(&hw, 5.0, 1.0, 1.0, 1.0);
        hw.delay_ms(2);
        pid.evaluate(0.0);
        assert!(pid.integral() != 0.0);

        pid.change_target(-3.0);
        assert_eq!(pid.target(), -3.0);
        assert_eq!(pid.integral(), 0.0);

        // no time has passed since the reset
        assert_eq!(pid.evaluate(0.0), pid.last_output());
    }
}
