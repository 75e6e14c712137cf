//! # Setpoint publisher
//!
//! The flight control firmware's offboard mode disengages if the setpoint stream pauses for
//! more than a few hundred milliseconds. The publisher keeps that stream alive: a dedicated
//! thread reads the follower's last committed command at a fixed rate and re-sends it to the
//! vehicle driver, independent of how often the follower itself recomputes. A tick with no
//! fresh computation re-sends the previous command unchanged.
//!
//! Send failures are logged and the loop carries on at the next tick, reconnection is the
//! driver's responsibility. The loop ends only on an explicit stop signal.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;

// Internal
use crate::setpoint::SetpointStore;
use vehicle_if::{
    driver::VehicleDriver,
    limit::{self, CommandLimiter}
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the setpoint publisher.
#[derive(Debug, Clone, Deserialize)]
pub struct SetpointPubParams {
    /// Period between publishes. The default keeps a 10 Hz stream, comfortably inside the
    /// firmware's offboard watchdog.
    ///
    /// Units: seconds
    #[serde(default = "SetpointPubParams::default_period_s")]
    pub period_s: f64,

    /// Log each outgoing command at debug level.
    #[serde(default)]
    pub log_commands: bool
}

/// Handle to a running setpoint publisher thread.
///
/// Dropping the handle without calling [`SetpointPublisher::stop`] leaves the thread running
/// for the life of the process.
pub struct SetpointPublisher {
    stop_flag: Arc<AtomicBool>,
    jh: Option<JoinHandle<()>>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while starting or stopping the publisher.
#[derive(Debug, Error)]
pub enum SetpointPubError {
    #[error("Could not build the publisher runtime: {0}")]
    RuntimeInitError(std::io::Error),

    #[error("Could not spawn the publisher thread: {0}")]
    SpawnError(std::io::Error),

    #[error("The publisher thread panicked")]
    JoinError
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SetpointPubParams {
    fn default_period_s() -> f64 {
        0.1
    }
}

impl SetpointPublisher {
    /// Start publishing the store's last command at the configured rate.
    ///
    /// The loop runs on its own thread inside a single threaded async runtime, so driver calls
    /// from the publisher never overlap each other.
    pub fn start(
        params: &SetpointPubParams,
        store: Arc<SetpointStore>,
        driver: Arc<dyn VehicleDriver>,
        limiter: Option<Arc<dyn CommandLimiter>>
    ) -> Result<Self, SetpointPubError> {
        let stop_flag = Arc::new(AtomicBool::new(false));

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(SetpointPubError::RuntimeInitError)?;

        let jh = thread::Builder::new()
            .name("setpoint_pub".to_string())
            .spawn({
                let stop_flag = stop_flag.clone();
                let params = params.clone();
                move || rt.block_on(publish_loop(params, stop_flag, store, driver, limiter))
            })
            .map_err(SetpointPubError::SpawnError)?;

        Ok(Self {
            stop_flag,
            jh: Some(jh)
        })
    }

    /// Signal the publisher to stop and wait for the thread to exit.
    ///
    /// Blocks for at most one publish period plus any in-flight driver call.
    pub fn stop(&mut self) -> Result<(), SetpointPubError> {
        self.stop_flag.store(true, Ordering::Relaxed);

        match self.jh.take() {
            Some(jh) => jh.join().map_err(|_| SetpointPubError::JoinError),
            None => Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Body of the publisher thread.
async fn publish_loop(
    params: SetpointPubParams,
    stop_flag: Arc<AtomicBool>,
    store: Arc<SetpointStore>,
    driver: Arc<dyn VehicleDriver>,
    limiter: Option<Arc<dyn CommandLimiter>>
) {
    let mut interval = tokio::time::interval(Duration::from_secs_f64(params.period_s));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !stop_flag.load(Ordering::Relaxed) {
        interval.tick().await;

        // The freshest command available, not necessarily computed this tick. Before the first
        // cycle there is nothing to keep alive yet.
        let cmd = match store.last_command() {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                warn!("Setpoint publisher could not read the store: {}", e);
                continue;
            }
        };

        let cmd = match limit::apply(&limiter, cmd) {
            Some(cmd) => cmd,
            None => continue
        };

        if params.log_commands {
            debug!("Republishing {:?}", cmd);
        }

        if let Err(e) = driver.send_control_command(&cmd).await {
            warn!("Setpoint publish failed, will retry at next tick: {}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{DriverCall, RecordingDriver};
    use vehicle_if::cmd::ControlCommand;
    use vehicle_if::limit::VelocityEnvelope;

    fn fast_params() -> SetpointPubParams {
        SetpointPubParams {
            period_s: 0.01,
            log_commands: false
        }
    }

    fn store_with_command(cmd: ControlCommand) -> Arc<SetpointStore> {
        let store = Arc::new(SetpointStore::new("chase_view").unwrap());
        store.commit_cycle(&[], cmd).unwrap();
        store
    }

    /// A command computed once must be re-sent on every tick until the publisher is stopped.
    #[test]
    fn test_republishes_latest_command_until_stopped() {
        let cmd = ControlCommand::VelocityBody {
            vx_ms: 1.0,
            vy_ms: 0.0,
            vz_ms: 0.0
        };
        let store = store_with_command(cmd);

        let recording = Arc::new(RecordingDriver::new());
        let driver: Arc<dyn VehicleDriver> = recording.clone();

        let mut publisher =
            SetpointPublisher::start(&fast_params(), store, driver, None).unwrap();
        thread::sleep(Duration::from_millis(100));
        publisher.stop().unwrap();

        let calls = recording.calls();
        assert!(
            calls.len() >= 3,
            "Expected repeated publishes, got {} calls",
            calls.len()
        );
        assert!(calls
            .iter()
            .all(|c| *c == DriverCall::Velocity(1.0, 0.0, 0.0)));
    }

    /// A failed send must not kill the loop, publishing resumes once the driver recovers.
    #[test]
    fn test_send_failure_does_not_stop_the_loop() {
        let store = store_with_command(ControlCommand::zero_velocity());

        let recording = Arc::new(RecordingDriver::new());
        recording.set_fail_sends(true);
        let driver: Arc<dyn VehicleDriver> = recording.clone();

        let mut publisher =
            SetpointPublisher::start(&fast_params(), store, driver, None).unwrap();
        thread::sleep(Duration::from_millis(50));

        assert_eq!(recording.send_count(), 0);

        recording.set_fail_sends(false);
        thread::sleep(Duration::from_millis(50));
        publisher.stop().unwrap();

        assert!(recording.send_count() >= 1);
    }

    #[test]
    fn test_nothing_published_before_first_command() {
        let store = Arc::new(SetpointStore::new("chase_view").unwrap());

        let recording = Arc::new(RecordingDriver::new());
        let driver: Arc<dyn VehicleDriver> = recording.clone();

        let mut publisher =
            SetpointPublisher::start(&fast_params(), store, driver, None).unwrap();
        thread::sleep(Duration::from_millis(50));
        publisher.stop().unwrap();

        assert_eq!(recording.send_count(), 0);
    }

    /// A configured limiter shapes everything leaving the publisher.
    #[test]
    fn test_limiter_clamps_published_commands() {
        let store = store_with_command(ControlCommand::VelocityBody {
            vx_ms: 10.0,
            vy_ms: 0.0,
            vz_ms: 0.0
        });

        let recording = Arc::new(RecordingDriver::new());
        let driver: Arc<dyn VehicleDriver> = recording.clone();
        let limiter: Arc<dyn CommandLimiter> = Arc::new(VelocityEnvelope {
            max_horiz_ms: 2.0,
            max_vert_ms: 1.0
        });

        let mut publisher =
            SetpointPublisher::start(&fast_params(), store, driver, Some(limiter)).unwrap();
        thread::sleep(Duration::from_millis(50));
        publisher.stop().unwrap();

        let calls = recording.calls();
        assert!(!calls.is_empty());
        assert!(calls
            .iter()
            .all(|c| *c == DriverCall::Velocity(2.0, 0.0, 0.0)));
    }
}
