//! Simulate command - runs one request against a simulated sensor.
//!
//! The service task owns a `LocationManager` wired to `SimulatedHardware`.
//! Callbacks run on a separate queue task, the way a host app would marshal
//! them onto its own thread. A synthetic walk feeds readings whose accuracy
//! improves with each fix.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, ValueEnum};
use parking_lot::Mutex;
use serde_json::json;

use locus::config::ConfigFile;
use locus::hardware::simulated::{HardwareLog, SimulatedHardware};
use locus::manager::LocationManager;
use locus::request::QueuedExecutor;
use locus::{
    Accuracy, AppState, AuthorizationStatus, Frequency, LocationError, LocationService, Reading,
    Request,
};

use crate::error::CliError;

const START_LATITUDE: f64 = 52.5200;
const START_LONGITUDE: f64 = 13.4050;
const STEP_DEGREES: f64 = 0.0001;
const FIRST_FIX_ACCURACY: f64 = 65.0;
const BEST_FIX_ACCURACY: f64 = 3.0;

/// Initial authorization status of the simulated device.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AuthorizationArg {
    /// The user has not been asked yet; the prompt is answered with a grant
    NotDetermined,
    /// Restricted by device policy
    Restricted,
    /// Denied by the user
    Denied,
    /// Granted while the app is in use
    WhenInUse,
    /// Granted always
    Always,
}

impl From<AuthorizationArg> for AuthorizationStatus {
    fn from(arg: AuthorizationArg) -> Self {
        match arg {
            AuthorizationArg::NotDetermined => AuthorizationStatus::NotDetermined,
            AuthorizationArg::Restricted => AuthorizationStatus::Restricted,
            AuthorizationArg::Denied => AuthorizationStatus::Denied,
            AuthorizationArg::WhenInUse => AuthorizationStatus::WhenInUse,
            AuthorizationArg::Always => AuthorizationStatus::Always,
        }
    }
}

/// Arguments for `locus simulate`.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Desired accuracy in meters (omit for best available)
    #[arg(long)]
    accuracy: Option<f64>,

    /// Complete after the first reading within the accuracy
    #[arg(long)]
    one_shot: bool,

    /// Allow the request to run in background and move the app there
    #[arg(long)]
    background: bool,

    /// Fail the request if no reading arrives within this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Number of readings to feed
    #[arg(long, default_value = "5")]
    readings: usize,

    /// Milliseconds between readings
    #[arg(long, default_value = "200")]
    interval_ms: u64,

    /// Initial authorization status
    #[arg(long, value_enum, default_value = "always")]
    authorization: AuthorizationArg,

    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone)]
enum Delivery {
    Reading(Reading),
    Error(LocationError),
}

/// Run the simulate command.
pub fn run(args: SimulateArgs, config: &ConfigFile) -> Result<(), CliError> {
    let accuracy = match args.accuracy {
        Some(m) if !m.is_finite() || m < 0.0 => {
            return Err(CliError::InvalidArgument(format!(
                "accuracy must be a non-negative number of meters, got {}",
                m
            )))
        }
        Some(m) => Accuracy::Meters(m),
        None => Accuracy::Best,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    runtime.block_on(simulate(args, accuracy, config))
}

async fn simulate(args: SimulateArgs, accuracy: Accuracy, config: &ConfigFile) -> Result<(), CliError> {
    let (hardware, log) = SimulatedHardware::new();
    log.set_authorization_status(args.authorization.into());

    let (executor, queue) = QueuedExecutor::new();
    let builder = LocationManager::builder(hardware)
        .executor(Arc::new(executor))
        .config(config.manager_config());

    let (service, inbox) = LocationService::channel();
    let service_task = inbox.spawn(builder);
    let queue_task = tokio::spawn(queue.run());

    let deliveries = Arc::new(Mutex::new(Vec::new()));
    let request = build_request(&args, accuracy, &deliveries);
    let id = service.submit(request)?;
    tracing::info!(request = %id, accuracy = %accuracy, "Submitted simulated request");

    if args.background {
        service.app_state_changed(AppState::Background)?;
    }
    answer_prompt(&service, &log, args.background).await?;

    let interval = Duration::from_millis(args.interval_ms);
    for step in 0..args.readings {
        tokio::time::sleep(interval).await;
        service.readings(vec![walk(step)])?;
    }

    if let Some(secs) = args.timeout {
        let elapsed = interval * args.readings as u32;
        let remaining = Duration::from_secs(secs).saturating_sub(elapsed);
        if !remaining.is_zero() {
            tracing::debug!(remaining = ?remaining, "Waiting out the request timeout");
            tokio::time::sleep(remaining + interval).await;
        }
    }

    let snapshot = service.snapshot().await?;
    service.shutdown();
    if let Err(e) = service_task.await {
        tracing::warn!(error = %e, "Service task ended abnormally");
    }
    drop(service);
    if let Err(e) = queue_task.await {
        tracing::warn!(error = %e, "Callback queue ended abnormally");
    }

    let deliveries = deliveries.lock().clone();
    let commands = log.commands();

    if args.json {
        let readings: Vec<&Reading> = deliveries
            .iter()
            .filter_map(|d| match d {
                Delivery::Reading(r) => Some(r),
                Delivery::Error(_) => None,
            })
            .collect();
        let errors: Vec<&LocationError> = deliveries
            .iter()
            .filter_map(|d| match d {
                Delivery::Error(e) => Some(e),
                Delivery::Reading(_) => None,
            })
            .collect();
        let commands: Vec<String> = commands.iter().map(|c| format!("{:?}", c)).collect();
        let report = json!({
            "request": id,
            "readings": readings,
            "errors": errors,
            "hardware_commands": commands,
            "snapshot": snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Request {}", id);
    println!();
    for delivery in &deliveries {
        match delivery {
            Delivery::Reading(r) => println!(
                "  reading  {:.5}, {:.5}  ±{:.1} m",
                r.latitude, r.longitude, r.horizontal_accuracy
            ),
            Delivery::Error(e) => println!("  error    {}", e),
        }
    }
    if deliveries.is_empty() {
        println!("  (nothing delivered)");
    }
    println!();
    println!("Hardware commands: {}", commands.len());
    for command in &commands {
        println!("  {:?}", command);
    }
    println!();
    println!("Authorization:  {}", snapshot.authorization);
    println!("App state:      {}", snapshot.app_state);
    println!("Bridge windows: {}", snapshot.bridge_windows);
    match snapshot.best_reading {
        Some(best) => println!("Best fix:       ±{:.1} m", best.horizontal_accuracy),
        None => println!("Best fix:       (none)"),
    }

    Ok(())
}

fn build_request(
    args: &SimulateArgs,
    accuracy: Accuracy,
    deliveries: &Arc<Mutex<Vec<Delivery>>>,
) -> Request {
    let mut request = if args.one_shot {
        Request::one_shot(accuracy)
    } else {
        Request::location(accuracy, Frequency::Continuous)
    };
    if let Some(secs) = args.timeout {
        request = request.with_timeout(Duration::from_secs(secs));
    }

    let on_reading = Arc::clone(deliveries);
    let on_error = Arc::clone(deliveries);
    request
        .with_background(args.background)
        .on_reading(move |r| on_reading.lock().push(Delivery::Reading(r.clone())))
        .on_error(move |e| on_error.lock().push(Delivery::Error(e.clone())))
}

/// Grants authorization if the manager prompted for it.
async fn answer_prompt(
    service: &LocationService,
    log: &HardwareLog,
    background: bool,
) -> Result<(), CliError> {
    // A snapshot round-trip guarantees registration has been processed.
    let snapshot = service.snapshot().await?;
    if !snapshot.prompt_in_flight || log.authorization_requests() == 0 {
        return Ok(());
    }

    let granted = if background {
        AuthorizationStatus::Always
    } else {
        AuthorizationStatus::WhenInUse
    };
    tracing::info!(status = %granted, "Answering authorization prompt");
    log.set_authorization_status(granted);
    service.authorization_changed(granted)?;
    Ok(())
}

/// The `step`th fix of a walk heading north.
fn walk(step: usize) -> Reading {
    let accuracy = (FIRST_FIX_ACCURACY / 2f64.powi(step as i32)).max(BEST_FIX_ACCURACY);
    Reading::new(
        START_LATITUDE + STEP_DEGREES * step as f64,
        START_LONGITUDE,
        accuracy,
        Utc::now(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_improves_accuracy() {
        let fixes: Vec<f64> = (0..6).map(|i| walk(i).horizontal_accuracy).collect();
        assert_eq!(fixes[0], FIRST_FIX_ACCURACY);
        assert!(fixes.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(fixes[5], BEST_FIX_ACCURACY);
    }

    #[test]
    fn test_walk_moves_north() {
        assert!(walk(3).latitude > walk(0).latitude);
        assert_eq!(walk(3).longitude, START_LONGITUDE);
    }
}
