//! # Extended PID controller
//!
//! Single axis PID controller used by every follower strategy. On top of the textbook terms it
//! supports:
//!
//! - **Proportional-on-measurement** - the proportional term acts on measurement change rather
//!   than error change, which removes the output kick a plain controller produces when the
//!   setpoint steps.
//! - **Back-calculation anti-windup** - while the output is saturated at a limit the integral
//!   term is bled off in proportion to the amount of saturation, bounding its growth.
//!
//! The controller is stepped explicitly with a measurement and a timestep, it does not measure
//! time itself. Callers own the cycle cadence.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Configuration for a single [`ExtendedPid`] axis.
#[derive(Debug, Clone, Deserialize)]
pub struct PidConfig {
    /// Proportional gain.
    pub k_p: f64,

    /// Integral gain.
    pub k_i: f64,

    /// Dervative gain.
    pub k_d: f64,

    /// The value the controller drives its measurement towards.
    #[serde(default)]
    pub setpoint: f64,

    /// Minimum and maximum controller output. `None` disables saturation entirely, in which
    /// case anti-windup never activates.
    #[serde(default)]
    pub output_limits: Option<(f64, f64)>,

    /// Enable the proportional-on-measurement term.
    #[serde(default)]
    pub proportional_on_measurement: bool,

    /// Enable back-calculation anti-windup.
    #[serde(default)]
    pub anti_windup: bool,

    /// Back-calculation coefficient applied to the saturation excess when anti-windup fires.
    #[serde(default = "PidConfig::default_back_calc_coeff")]
    pub back_calc_coeff: f64
}

/// A single axis extended PID controller.
///
/// Created from a [`PidConfig`], stepped once per control cycle with `step`. All state needed
/// between cycles (integral accumulator, previous error/measurement/output) lives here, so one
/// instance must only ever serve one axis.
pub struct ExtendedPid {
    k_p: f64,
    k_i: f64,
    k_d: f64,

    setpoint: f64,
    output_limits: Option<(f64, f64)>,

    proportional_on_measurement: bool,
    anti_windup: bool,
    back_calc_coeff: f64,

    integral: f64,
    last_output: f64,
    prev_error: Option<f64>,
    prev_measurement: Option<f64>
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl PidConfig {
    fn default_back_calc_coeff() -> f64 {
        0.1
    }
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            k_p: 0.0,
            k_i: 0.0,
            k_d: 0.0,
            setpoint: 0.0,
            output_limits: None,
            proportional_on_measurement: false,
            anti_windup: false,
            back_calc_coeff: Self::default_back_calc_coeff()
        }
    }
}

impl ExtendedPid {
    /// Create a new controller from the given configuration.
    pub fn new(config: &PidConfig) -> Self {
        Self {
            k_p: config.k_p,
            k_i: config.k_i,
            k_d: config.k_d,
            setpoint: config.setpoint,
            output_limits: config.output_limits,
            proportional_on_measurement: config.proportional_on_measurement,
            anti_windup: config.anti_windup,
            back_calc_coeff: config.back_calc_coeff,
            integral: 0.0,
            last_output: 0.0,
            prev_error: None,
            prev_measurement: None
        }
    }

    /// Step the controller with a new measurement over the given timestep, returning the new
    /// output.
    ///
    /// A non-finite measurement or a timestep that is zero, negative, or non-finite would
    /// corrupt the integral and derivative terms, so such steps are rejected: the internal
    /// state is left untouched and the previous output is returned.
    pub fn step(&mut self, measurement: f64, dt_s: f64) -> f64 {
        if !measurement.is_finite() || !dt_s.is_finite() || dt_s <= 0.0 {
            warn!(
                "Rejecting PID step (measurement {}, dt {} s), holding previous output",
                measurement, dt_s
            );
            return self.last_output;
        }

        // With proportional-on-measurement the setpoint is swapped for the previous measurement
        // for the duration of this step, so every term sees the measurement change rather than
        // the error change. The first step has no previous measurement and falls back to plain
        // error action.
        let true_setpoint = self.setpoint;
        if self.proportional_on_measurement {
            if let Some(prev) = self.prev_measurement {
                self.setpoint = prev;
            }
        }

        let error = self.setpoint - measurement;

        let p_term = self.k_p * error;

        // Integral, clamped to the output limits so it cannot wind past them on its own
        self.integral += self.k_i * error * dt_s;
        if let Some((min, max)) = self.output_limits {
            self.integral = self.integral.max(min).min(max);
        }

        // Dervative on error, nothing to differentiate against on the first step
        let d_term = match self.prev_error {
            Some(prev) => self.k_d * (error - prev) / dt_s,
            None => 0.0
        };

        let mut output = p_term + self.integral + d_term;

        if let Some((min, max)) = self.output_limits {
            if output > max {
                output = max;
            }
            if output < min {
                output = min;
            }

            // Back-calculation anti-windup. Fires when this step's output both moved and sits
            // at or beyond a limit. Two identical saturated outputs in a row skip the
            // correction, the integral clamp above still bounds the term in that case.
            if self.anti_windup
                && output != self.last_output
                && (output >= max || output <= min)
            {
                self.integral -= (output - self.last_output) * self.back_calc_coeff;
            }
        }

        self.setpoint = true_setpoint;

        self.prev_error = Some(error);
        self.prev_measurement = Some(measurement);
        self.last_output = output;

        output
    }

    /// Change the setpoint without disturbing the accumulated state.
    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    /// Change the gains without disturbing the accumulated state.
    pub fn set_gains(&mut self, k_p: f64, k_i: f64, k_d: f64) {
        self.k_p = k_p;
        self.k_i = k_i;
        self.k_d = k_d;
    }

    /// Change the output limits. `None` disables saturation.
    pub fn set_output_limits(&mut self, limits: Option<(f64, f64)>) {
        self.output_limits = limits;
    }

    /// Get the current setpoint.
    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// Get the output of the most recent accepted step.
    pub fn last_output(&self) -> f64 {
        self.last_output
    }

    /// Clear all accumulated state, returning the controller to its just-constructed condition.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_output = 0.0;
        self.prev_error = None;
        self.prev_measurement = None;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn config(k_p: f64, k_i: f64, k_d: f64) -> PidConfig {
        PidConfig {
            k_p,
            k_i,
            k_d,
            ..PidConfig::default()
        }
    }

    #[test]
    fn test_output_bounded_by_limits() {
        let mut config = config(10.0, 1.0, 0.0);
        config.setpoint = 100.0;
        config.output_limits = Some((-2.0, 2.0));
        let mut pid = ExtendedPid::new(&config);

        for _ in 0..50 {
            let output = pid.step(0.0, 0.1);
            assert!(output <= 2.0 && output >= -2.0);
        }
        assert_eq!(pid.step(0.0, 0.1), 2.0);

        // And hard against the lower limit for a large negative error
        pid.set_setpoint(-100.0);
        for _ in 0..50 {
            let output = pid.step(0.0, 0.1);
            assert!(output <= 2.0 && output >= -2.0);
        }
        assert_eq!(pid.step(0.0, 0.1), -2.0);
    }

    #[test]
    fn test_anti_windup_bounds_integral() {
        let mut config = config(0.0, 1.0, 0.0);
        config.setpoint = 1.0;
        config.output_limits = Some((-1.0, 1.0));
        config.anti_windup = true;
        let mut pid = ExtendedPid::new(&config);

        // First step: integral accumulates to 1.0 and is clamped there, the output moves from
        // 0 to the upper limit, so the back-calculation fires and bleeds 0.1 off the integral.
        assert_eq!(pid.step(0.0, 1.0), 1.0);
        assert!((pid.integral - 0.9).abs() < 1e-12);

        // Second step: output is saturated again but has not moved, so the correction is
        // skipped and the clamp holds the integral at the limit.
        assert_eq!(pid.step(0.0, 1.0), 1.0);
        assert!((pid.integral - 1.0).abs() < 1e-12);

        // Pin the output for many more cycles, the integral must stay bounded
        for _ in 0..1000 {
            assert_eq!(pid.step(0.0, 1.0), 1.0);
            assert!(pid.integral.abs() <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn test_pom_no_kick_on_setpoint_step() {
        let mut config = config(1.0, 0.0, 0.0);
        config.proportional_on_measurement = true;
        let mut pid = ExtendedPid::new(&config);

        // First step falls back to plain error action
        assert_eq!(pid.step(5.0, 0.1), -5.0);

        // Steady measurement, proportional term settles to zero
        let before = pid.step(5.0, 0.1);
        assert_eq!(before, 0.0);

        // A setpoint step with an unchanged measurement must not jump the output
        pid.set_setpoint(100.0);
        let after = pid.step(5.0, 0.1);
        assert_eq!(after, before);

        // And the true setpoint is restored after each step
        assert_eq!(pid.setpoint(), 100.0);
    }

    #[test]
    fn test_rejects_bad_steps() {
        let mut config = config(1.0, 1.0, 1.0);
        config.setpoint = 1.0;
        let mut pid = ExtendedPid::new(&config);

        let good = pid.step(0.0, 0.1);
        let integral = pid.integral;

        // Zero, negative, and non-finite timesteps return the previous output and leave the
        // state alone
        assert_eq!(pid.step(0.5, 0.0), good);
        assert_eq!(pid.step(0.5, -1.0), good);
        assert_eq!(pid.step(0.5, f64::NAN), good);
        assert_eq!(pid.step(f64::NAN, 0.1), good);
        assert_eq!(pid.integral, integral);

        // The next good step continues from where the last good one left off
        assert_eq!(pid.prev_error, Some(1.0));
    }

    #[test]
    fn test_no_limits_disables_saturation() {
        let mut config = config(1.0, 1.0, 0.0);
        config.setpoint = 1000.0;
        config.anti_windup = true;
        let mut pid = ExtendedPid::new(&config);

        // Without limits the output is unbounded and the integral is a pure accumulator, the
        // anti-windup branch never runs
        let output = pid.step(0.0, 1.0);
        assert_eq!(output, 2000.0);
        assert_eq!(pid.integral, 1000.0);

        let output = pid.step(0.0, 1.0);
        assert_eq!(output, 3000.0);
        assert_eq!(pid.integral, 2000.0);
    }

    #[test]
    fn test_derivative_first_step_is_zero() {
        let mut config = config(0.0, 0.0, 2.0);
        config.setpoint = 0.0;
        let mut pid = ExtendedPid::new(&config);

        // No previous error to differentiate against
        assert_eq!(pid.step(1.0, 0.5), 0.0);

        // error goes -1 -> -3, derivative = 2 * (-2 / 0.5) = -8
        assert_eq!(pid.step(3.0, 0.5), -8.0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut config = config(1.0, 1.0, 1.0);
        config.setpoint = 1.0;
        let mut pid = ExtendedPid::new(&config);

        pid.step(0.0, 0.1);
        pid.step(0.5, 0.1);
        pid.reset();

        assert_eq!(pid.integral, 0.0);
        assert_eq!(pid.last_output(), 0.0);
        assert_eq!(pid.prev_error, None);
        assert_eq!(pid.prev_measurement, None);
    }
}
