//! # Simulation vehicle driver
//!
//! A logging stand-in for a real vehicle driver, used when no flight control firmware is on the
//! other end. It enforces the same call discipline a real driver would (no commands before
//! `connect`), counts what it is asked to send, and logs everything. All state sits behind a
//! single mutex so the publisher and dispatch worker can call in concurrently, exactly as they
//! would against a real driver.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use async_trait::async_trait;
use log::{debug, info};
use std::sync::Mutex;

// Internal
use vehicle_if::driver::{DriverError, VehicleDriver};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Simulated vehicle driver.
pub struct SimDriver {
    state: Mutex<SimDriverState>
}

#[derive(Default)]
struct SimDriverState {
    connected: bool,
    offboard: bool,
    commands_sent: u64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimDriverState::default())
        }
    }

    /// The number of commands sent to the simulated vehicle so far.
    pub fn commands_sent(&self) -> u64 {
        match self.state.lock() {
            Ok(state) => state.commands_sent,
            Err(poisoned) => poisoned.into_inner().commands_sent
        }
    }

    /// Run a closure over the locked state, mapping a poisoned lock to a driver error.
    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut SimDriverState) -> Result<T, DriverError>
    ) -> Result<T, DriverError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DriverError::CommandFailed("sim driver state poisoned".to_string()))?;

        f(&mut state)
    }
}

#[async_trait]
impl VehicleDriver for SimDriver {
    async fn connect(&self) -> Result<(), DriverError> {
        self.with_state(|state| {
            state.connected = true;
            info!("Sim driver connected");
            Ok(())
        })
    }

    async fn disconnect(&self) -> Result<(), DriverError> {
        self.with_state(|state| {
            state.connected = false;
            state.offboard = false;
            info!("Sim driver disconnected");
            Ok(())
        })
    }

    async fn start_offboard_mode(&self) -> Result<(), DriverError> {
        self.with_state(|state| {
            if !state.connected {
                return Err(DriverError::NotConnected);
            }

            state.offboard = true;
            info!("Sim vehicle entered offboard mode");
            Ok(())
        })
    }

    async fn stop_offboard_mode(&self) -> Result<(), DriverError> {
        self.with_state(|state| {
            if !state.connected {
                return Err(DriverError::NotConnected);
            }

            state.offboard = false;
            info!("Sim vehicle left offboard mode");
            Ok(())
        })
    }

    async fn send_velocity_commands(
        &self,
        vx_ms: f64,
        vy_ms: f64,
        vz_ms: f64
    ) -> Result<(), DriverError> {
        self.with_state(|state| {
            if !state.connected {
                return Err(DriverError::NotConnected);
            }

            state.commands_sent += 1;
            debug!(
                "Sim vehicle velocity demand: vx {:.3} m/s, vy {:.3} m/s, vz {:.3} m/s",
                vx_ms, vy_ms, vz_ms
            );
            Ok(())
        })
    }

    async fn send_attitude_rate_commands(
        &self,
        roll_rate_rads: f64,
        pitch_rate_rads: f64,
        yaw_rate_rads: f64,
        thrust: f64
    ) -> Result<(), DriverError> {
        self.with_state(|state| {
            if !state.connected {
                return Err(DriverError::NotConnected);
            }

            state.commands_sent += 1;
            debug!(
                "Sim vehicle attitude rate demand: roll {:.3} rad/s, pitch {:.3} rad/s, \
                yaw {:.3} rad/s, thrust {:.3}",
                roll_rate_rads, pitch_rate_rads, yaw_rate_rads, thrust
            );
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
