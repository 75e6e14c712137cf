//! # Command dispatch worker
//!
//! Mode transitions and ad-hoc velocity injections can come from several threads at once, but
//! the vehicle driver's connection must only ever be driven from one context at a time within
//! this path. The dispatch worker bridges the two: producers push [`QueuedCommand`]s onto a
//! single queue from any thread, and one worker thread running a single threaded async runtime
//! pops them in FIFO order and makes the driver calls.
//!
//! The worker owns the driver's connection lifecycle. It connects once at startup (a failure
//! there is fatal to the worker), processes commands until `Exit` or until every producer
//! handle is dropped, then disconnects exactly once.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::sync::mpsc;

// Internal
use vehicle_if::{
    cmd::ControlCommand,
    driver::{DriverError, VehicleDriver},
    limit::{self, CommandLimiter}
};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A command placed on the dispatch worker's queue.
///
/// FIFO ordering within the queue is the only ordering guarantee, commands from different
/// producers interleave in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum QueuedCommand {
    /// Enter offboard mode and begin accepting the setpoint stream.
    StartFollowing,

    /// Exit offboard mode.
    StopFollowing,

    /// Send a single body-frame velocity demand directly to the driver, bypassing the
    /// follower and publisher path. Used for manual overrides and test injection.
    SendVelocity {
        vx_ms: f64,
        vy_ms: f64,
        vz_ms: f64
    },

    /// Stop the worker.
    Exit
}

/// Possible errors from the dispatch worker.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The worker could not establish the driver connection. Fatal to the worker.
    #[error("Could not connect to the vehicle driver: {0}")]
    ConnectionFailed(DriverError),

    #[error("Could not build the dispatch worker runtime: {0}")]
    RuntimeInitError(std::io::Error),

    #[error("Could not spawn the dispatch worker thread: {0}")]
    SpawnError(std::io::Error),

    /// The worker is no longer accepting commands.
    #[error("The dispatch worker is no longer running")]
    WorkerGone,

    #[error("The dispatch worker thread panicked")]
    JoinError
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Handle to a running command dispatch worker.
///
/// Dropping the handle without calling [`CommandDispatcher::shutdown`] closes the queue, the
/// worker then drains, disconnects and exits on its own, but nothing joins it.
pub struct CommandDispatcher {
    sender: mpsc::UnboundedSender<QueuedCommand>,
    jh: Option<JoinHandle<Result<(), DispatchError>>>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CommandDispatcher {
    /// Start the worker thread and connect it to the given driver.
    ///
    /// Returns as soon as the thread is spawned, the connection is established asynchronously
    /// inside the worker. A connect failure surfaces from [`CommandDispatcher::shutdown`].
    pub fn start(
        driver: Arc<dyn VehicleDriver>,
        limiter: Option<Arc<dyn CommandLimiter>>
    ) -> Result<Self, DispatchError> {
        let (sender, receiver) = mpsc::unbounded_channel();

        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(DispatchError::RuntimeInitError)?;

        let jh = thread::Builder::new()
            .name("cmd_dispatch".to_string())
            .spawn(move || rt.block_on(dispatch_loop(receiver, driver, limiter)))
            .map_err(DispatchError::SpawnError)?;

        Ok(Self {
            sender,
            jh: Some(jh)
        })
    }

    /// Place a command on the queue.
    pub fn enqueue(&self, cmd: QueuedCommand) -> Result<(), DispatchError> {
        self.sender.send(cmd).map_err(|_| DispatchError::WorkerGone)
    }

    /// Stop the worker and wait for it to drain and disconnect.
    ///
    /// Commands enqueued before this call are processed first, `Exit` joins the back of the
    /// queue. Returns the worker's own result, so a connect failure at startup surfaces here.
    pub fn shutdown(mut self) -> Result<(), DispatchError> {
        // The worker may already have exited, in which case the queue is closed and the send
        // fails, which is fine
        let _ = self.sender.send(QueuedCommand::Exit);

        match self.jh.take() {
            Some(jh) => jh.join().map_err(|_| DispatchError::JoinError)?,
            None => Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Body of the dispatch worker thread.
async fn dispatch_loop(
    mut receiver: mpsc::UnboundedReceiver<QueuedCommand>,
    driver: Arc<dyn VehicleDriver>,
    limiter: Option<Arc<dyn CommandLimiter>>
) -> Result<(), DispatchError> {
    driver
        .connect()
        .await
        .map_err(DispatchError::ConnectionFailed)?;

    info!("Command dispatch worker connected to the vehicle driver");

    // A `None` here means every producer handle was dropped, treated the same as Exit
    while let Some(cmd) = receiver.recv().await {
        debug!("Dispatching {:?}", cmd);

        match cmd {
            QueuedCommand::StartFollowing => {
                if let Err(e) = driver.start_offboard_mode().await {
                    warn!("Could not start offboard mode: {}", e);
                }
            }
            QueuedCommand::StopFollowing => {
                if let Err(e) = driver.stop_offboard_mode().await {
                    warn!("Could not stop offboard mode: {}", e);
                }
            }
            QueuedCommand::SendVelocity { vx_ms, vy_ms, vz_ms } => {
                let cmd = ControlCommand::VelocityBody { vx_ms, vy_ms, vz_ms };

                if let Some(cmd) = limit::apply(&limiter, cmd) {
                    if let Err(e) = driver.send_control_command(&cmd).await {
                        warn!("Velocity injection failed: {}", e);
                    }
                }
            }
            QueuedCommand::Exit => break
        }
    }

    if let Err(e) = driver.disconnect().await {
        warn!("Could not disconnect from the vehicle driver: {}", e);
    }

    info!("Command dispatch worker stopped");

    Ok(())
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{DriverCall, RecordingDriver};
    use vehicle_if::limit::VelocityEnvelope;

    /// The canonical session: start following, inject one velocity, stop following, exit.
    /// Exactly one connect and one disconnect bracket the driver calls.
    #[test]
    fn test_command_sequence_maps_to_driver_calls() {
        let recording = Arc::new(RecordingDriver::new());
        let driver: Arc<dyn VehicleDriver> = recording.clone();

        let dispatcher = CommandDispatcher::start(driver, None).unwrap();

        dispatcher.enqueue(QueuedCommand::StartFollowing).unwrap();
        dispatcher
            .enqueue(QueuedCommand::SendVelocity {
                vx_ms: 1.0,
                vy_ms: 0.0,
                vz_ms: 0.0
            })
            .unwrap();
        dispatcher.enqueue(QueuedCommand::StopFollowing).unwrap();
        dispatcher.enqueue(QueuedCommand::Exit).unwrap();

        dispatcher.shutdown().unwrap();

        assert_eq!(
            recording.calls(),
            vec![
                DriverCall::Connect,
                DriverCall::StartOffboard,
                DriverCall::Velocity(1.0, 0.0, 0.0),
                DriverCall::StopOffboard,
                DriverCall::Disconnect
            ]
        );
    }

    #[test]
    fn test_connect_failure_is_fatal_to_the_worker() {
        let recording = Arc::new(RecordingDriver::failing_connect());
        let driver: Arc<dyn VehicleDriver> = recording.clone();

        let dispatcher = CommandDispatcher::start(driver, None).unwrap();

        assert!(matches!(
            dispatcher.shutdown(),
            Err(DispatchError::ConnectionFailed(_))
        ));

        // The worker never got far enough to touch the driver beyond the failed connect
        assert!(recording.calls().is_empty());
    }

    #[test]
    fn test_velocity_injection_routes_through_the_limiter() {
        let recording = Arc::new(RecordingDriver::new());
        let driver: Arc<dyn VehicleDriver> = recording.clone();
        let limiter: Arc<dyn CommandLimiter> = Arc::new(VelocityEnvelope {
            max_horiz_ms: 2.0,
            max_vert_ms: 1.0
        });

        let dispatcher = CommandDispatcher::start(driver, Some(limiter)).unwrap();

        // Over the envelope, clamped
        dispatcher
            .enqueue(QueuedCommand::SendVelocity {
                vx_ms: 10.0,
                vy_ms: 0.0,
                vz_ms: 0.0
            })
            .unwrap();

        // Not even finite, vetoed outright
        dispatcher
            .enqueue(QueuedCommand::SendVelocity {
                vx_ms: f64::NAN,
                vy_ms: 0.0,
                vz_ms: 0.0
            })
            .unwrap();

        dispatcher.shutdown().unwrap();

        assert_eq!(
            recording.calls(),
            vec![
                DriverCall::Connect,
                DriverCall::Velocity(2.0, 0.0, 0.0),
                DriverCall::Disconnect
            ]
        );
    }

    /// Dropping the dispatcher closes the queue, the worker drains and disconnects on its own.
    #[test]
    fn test_dropping_the_handle_stops_the_worker() {
        let recording = Arc::new(RecordingDriver::new());
        let driver: Arc<dyn VehicleDriver> = recording.clone();

        let dispatcher = CommandDispatcher::start(driver, None).unwrap();
        dispatcher.enqueue(QueuedCommand::StartFollowing).unwrap();
        drop(dispatcher);

        // The worker exits asynchronously after the drop, poll briefly for the disconnect
        for _ in 0..100 {
            if recording.calls().last() == Some(&DriverCall::Disconnect) {
                return;
            }
            thread::sleep(std::time::Duration::from_millis(10));
        }

        panic!("Worker did not disconnect after the handle was dropped");
    }
}
