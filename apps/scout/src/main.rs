//! Scout: drive a scripted agent through one mission on a remote simulation
//! host. Starts a mission, waits for the host to confirm it is running, then
//! issues move/turn commands while polling world state until the host stops
//! the mission.

mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use tokio::time::sleep;
use tracing::{error, info, warn};

use mission_sdk::{
    shutdown_channel, AwaitStartError, Command, HostConfig, MissionClient, MissionConfig,
    RecordConfig, Shutdown, StartError,
};

use telemetry::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "scout",
    about = "Run one scripted mission against a remote simulation host",
    version
)]
struct Cli {
    #[arg(
        long,
        env = "SCOUT_HOST_URL",
        default_value = "http://127.0.0.1:9000",
        help = "Base URL for the simulation host"
    )]
    host_url: String,

    #[arg(
        long,
        default_value = "./saved_data.tgz",
        help = "Destination archive for recorded mission streams"
    )]
    record_path: PathBuf,

    #[arg(long, default_value_t = 10, help = "Mission time limit in seconds")]
    time_limit_secs: u64,

    #[arg(
        long = "log-level",
        value_enum,
        env = "SCOUT_LOG_LEVEL",
        default_value_t = LogLevel::Info,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    log_level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        env = "SCOUT_LOG_FILE",
        help = "Write structured logs to the specified file"
    )]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help, version, and malformed arguments all land here; the
            // usage path is user assistance, not a failure.
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
    };

    let log_config = LogConfig {
        level: cli.log_level,
        file: cli.log_file.clone(),
    };
    if let Err(err) = telemetry::init(&log_config) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "error starting mission");
            ExitCode::FAILURE
        }
    }
}

/// Only start-phase failures propagate out of here; everything after a
/// successful start is absorbed into diagnostics and a clean exit.
async fn run(cli: Cli) -> Result<(), StartError> {
    let host = HostConfig::new(&cli.host_url)?;
    let client = MissionClient::new(host)?;

    let mission = MissionConfig::new()
        .with_time_limit(Duration::from_secs(cli.time_limit_secs))
        .request_video(320, 240)
        .reward_for_reaching_position(19.5, 0.0, 19.5, 100.0, 1.1);

    let record = RecordConfig::new(&cli.record_path)
        .record_commands()
        .record_mp4(20, 400_000)
        .record_rewards()
        .record_observations();

    let (shutdown_handle, mut shutdown) = shutdown_channel();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("ctrl-c received, shutting down");
        shutdown_handle.trigger();
    });

    let mut session = client.start(mission, record).await?;
    info!(handle = %session.handle(), "mission submitted, waiting for start");

    match session.await_start(&mut shutdown).await {
        Ok(()) => info!("mission running"),
        Err(AwaitStartError::Interrupted) => {
            info!("interrupted before mission start");
            return Ok(());
        }
        Err(err) => {
            warn!(error = %err, "giving up waiting for mission start");
            return Ok(());
        }
    }

    drive_mission(&mut session, &mut shutdown).await;
    Ok(())
}

async fn drive_mission(session: &mut mission_sdk::MissionSession, shutdown: &mut Shutdown) {
    let mut rng = rand::thread_rng();
    let mut summed_reward = 0.0;

    while session.is_running() {
        session.send(Command::Move(1.0)).await;
        session.send(Command::Turn(rng.gen::<f32>())).await;

        tokio::select! {
            _ = sleep(Duration::from_millis(500)) => {}
            _ = shutdown.triggered() => {
                info!("interrupted, leaving mission loop");
                return;
            }
        }

        let state = match session.poll().await {
            Ok(state) => state,
            Err(err) => {
                warn!(error = %err, "lost contact with the host, abandoning the mission");
                return;
            }
        };

        info!(
            video_frames = state.video_frames_since_last_state,
            observations = state.observations_since_last_state,
            rewards = state.rewards_since_last_state,
            "state received"
        );
        for reward in &state.rewards {
            summed_reward += reward.value;
            info!(value = reward.value, summed = summed_reward, "reward");
        }
    }

    info!(summed_reward, "mission has stopped");
}
