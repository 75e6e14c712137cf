//! # Guidance Executable
//!
//! Flies a follow-me behaviour against a synthetic target using the
//! simulation vehicle driver. The executable wires the full guidance stack
//! together:
//!
//! - a follower built by [`gnc_lib::follow_ctrl::make_follower`], which turns
//!   target coordinates into control commands each cycle,
//! - the setpoint publisher, which republishes the latest command at a fixed
//!   rate so the vehicle's offboard watchdog never trips,
//! - the command dispatch worker, which owns the driver connection and
//!   processes queued session commands.
//!
//! The target itself is generated in [`demo_target`], standing in for the
//! vision pipeline which would normally provide it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use gnc_lib::{
    cmd_dispatch::{CommandDispatcher, QueuedCommand},
    follow_ctrl::{make_follower, FollowCtrlParams, FollowerType},
    setpoint::load_profile_overrides,
    setpoint_pub::{SetpointPubParams, SetpointPublisher},
    sim_driver::SimDriver
};
use util::{
    logger::{logger_init, LevelFilter},
    raise_error,
    session::{self, Session}
};
use vehicle_if::{
    driver::VehicleDriver,
    limit::{CommandLimiter, VelocityEnvelope},
    target::TargetCoordinates
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of consecutive cycle overruns after which the executable gives up
/// rather than keep flying on a stale cadence.
const MAX_CONSEC_CYCLE_OVERRUNS: u64 = 500;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Guidance executable parameters
#[derive(Debug, Clone, Deserialize)]
struct GncExecParams {
    /// Target duration of one guidance cycle.
    ///
    /// Units: seconds
    cycle_period_s: f64,

    /// Number of guidance cycles to run before shutting down.
    num_cycles: u64,

    /// The follower behaviour to fly.
    follower_type: FollowerType,

    /// Save a follower telemetry snapshot every this many cycles. Zero
    /// disables the periodic saves.
    telem_save_cycles: u64,

    /// Drift of the synthetic target away from the frame centre.
    ///
    /// Units: pixels/cycle
    target_drift_px_per_cycle: f64,

    /// Velocity envelope applied to every outgoing command. Omit to run
    /// without a limiter.
    velocity_envelope: Option<VelocityEnvelope>
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("gnc_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution
    info!("Kestrel Guidance Executable\n");
    info!(
        "Running on system time {}\n",
        util::time::get_datetime_str()
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: GncExecParams = util::params::load("gnc_exec.toml")
        .wrap_err("Could not load gnc_exec params")?;

    let follow_params: FollowCtrlParams = util::params::load("follow_ctrl.toml")
        .wrap_err("Could not load follow control params")?;

    let pub_params: SetpointPubParams = util::params::load("setpoint_pub.toml")
        .wrap_err("Could not load setpoint publisher params")?;

    info!("Parameters loaded");

    // Profile overrides are optional, if the file is missing the builtin
    // profiles are used unchanged
    let num_overrides = load_profile_overrides("setpoint_profiles.toml")
        .wrap_err("Could not load setpoint profile overrides")?;

    if num_overrides > 0 {
        info!("{} setpoint profile override(s) in effect", num_overrides);
    }

    // ---- INITIALISE DRIVER AND FOLLOWER ----

    info!(
        "Flying \"{}\" against the simulation driver\n",
        exec_params.follower_type
    );

    // The concrete handle is kept alongside the trait object so the command
    // count can be read back at shutdown
    let sim_driver = Arc::new(SimDriver::new());
    let driver: Arc<dyn VehicleDriver> = sim_driver.clone();

    let limiter: Option<Arc<dyn CommandLimiter>> = exec_params
        .velocity_envelope
        .clone()
        .map(|env| Arc::new(env) as Arc<dyn CommandLimiter>);

    let mut follower = make_follower(
        exec_params.follower_type,
        &follow_params,
        driver.clone(),
        limiter.clone()
    )
    .wrap_err("Failed to build the follower")?;

    // ---- START WORKERS ----

    let dispatcher = CommandDispatcher::start(driver, limiter.clone())
        .wrap_err("Failed to start the command dispatch worker")?;

    dispatcher
        .enqueue(QueuedCommand::StartFollowing)
        .wrap_err("Could not enqueue the start following command")?;

    let mut publisher = SetpointPublisher::start(
        &pub_params,
        follower.setpoint_store().clone(),
        follower.driver().clone(),
        limiter
    )
    .wrap_err("Failed to start the setpoint publisher")?;

    // ---- MAIN LOOP ----

    info!("Begining guidance loop\n");

    let mut num_consec_cycle_overruns = 0u64;

    for cycle in 0..exec_params.num_cycles {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- TARGET INPUT ----

        // Synthetic target, standing in for the vision pipeline
        let target = demo_target(cycle, &exec_params, &follow_params);

        // ---- GUIDANCE PROCESSING ----

        // An invalid target leaves the previous command in the store, the
        // publisher keeps flying it, so warn and carry on
        match follower.calculate_velocity_commands(&target) {
            Ok(()) => (),
            Err(e) => warn!("Error during follower processing: {}", e)
        }

        // ---- TELEMETRY ----

        if exec_params.telem_save_cycles > 0
            && cycle % exec_params.telem_save_cycles == 0
        {
            session::save_with_timestamp(
                "telem/follower_telem.json",
                follower.get_follower_telemetry()
            );
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(exec_params.cycle_period_s)
            .checked_sub(cycle_dur)
        {
            Some(d) => {
                num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - exec_params.cycle_period_s
                );
                num_consec_cycle_overruns += 1;

                if num_consec_cycle_overruns > MAX_CONSEC_CYCLE_OVERRUNS {
                    raise_error!(
                        "More than {} consecutive cycle overruns!",
                        MAX_CONSEC_CYCLE_OVERRUNS
                    );
                }
            }
        }
    }

    // ---- SHUTDOWN ----

    info!("Guidance loop complete, shutting down\n");

    // Stop the publisher before leaving offboard mode, so that no setpoint
    // lands after the stop command
    publisher
        .stop()
        .wrap_err("Failed to stop the setpoint publisher")?;

    match dispatcher.enqueue(QueuedCommand::StopFollowing) {
        Ok(()) => (),
        Err(e) => warn!("Could not enqueue the stop following command: {}", e)
    }

    dispatcher
        .shutdown()
        .wrap_err("Command dispatch worker failed")?;

    info!(
        "{} commands reached the simulated vehicle",
        sim_driver.commands_sent()
    );

    // Save the final telemetry snapshot and end the session
    session.save(
        "final_follower_telem.json",
        follower.get_follower_telemetry()
    );

    session.exit();

    info!("End of execution");

    Ok(())
}

/// Build the synthetic target for the given cycle.
///
/// The target drifts diagonally away from the frame centre at the configured
/// rate, carrying whichever auxiliary geometry the chosen behaviour consumes:
/// a breathing range for distance hold, a sweeping pan angle for the gimbal
/// behaviours, a shrinking bounding box for ground view.
fn demo_target(
    cycle: u64,
    exec_params: &GncExecParams,
    follow_params: &FollowCtrlParams
) -> TargetCoordinates {
    let drift_px = exec_params.target_drift_px_per_cycle * cycle as f64;

    let target = TargetCoordinates::new(
        0.5 * follow_params.frame_width_px + drift_px,
        0.5 * follow_params.frame_height_px + 0.5 * drift_px
    );

    match exec_params.follower_type {
        FollowerType::McVelocityDistance => {
            target.with_range(12.0 + 3.0 * (cycle as f64 * 0.1).sin())
        }
        FollowerType::GmVelocityChase | FollowerType::GmVelocityVector => {
            target
                .with_gimbal_angles(0.3 * (cycle as f64 * 0.05).sin(), 0.2)
                .with_range(10.0)
        }
        FollowerType::McVelocityGround => {
            target.with_bounding_box(90.0, 100.0 + 0.2 * drift_px)
        }
        _ => target
    }
}
