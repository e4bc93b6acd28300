use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::{HostBackend, HostConfig, PollError};
use crate::shutdown::Shutdown;
use crate::state::WorldState;

/// Tunables for one mission attempt's control loops.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Cadence of the start-confirmation wait loop.
    pub poll_interval: Duration,
    /// Upper bound on how long [`MissionSession::await_start`] waits for the
    /// host to flip the running flag.
    pub start_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            start_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Bounded capped-exponential retry for transient poll failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Lifecycle of one mission attempt as observed through polled snapshots.
///
/// The running flag in a snapshot is the sole transition signal: host error
/// strings never move the phase by themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionPhase {
    NotStarted,
    Starting,
    Running,
    Stopped,
}

/// Identity of a live mission attempt on the host. Owned by exactly one
/// [`MissionSession`] and invalid once the attempt stops.
#[derive(Debug, Clone)]
pub struct MissionHandle {
    mission_id: Uuid,
}

impl MissionHandle {
    pub(crate) fn new(mission_id: Uuid) -> Self {
        Self { mission_id }
    }

    pub fn mission_id(&self) -> Uuid {
        self.mission_id
    }
}

impl fmt::Display for MissionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mission={}", self.mission_id)
    }
}

/// A typed agent command, rendered to the host's whitespace-delimited text
/// form on dispatch. `Raw` passes unknown verbs through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Move(f32),
    Turn(f32),
    Strafe(f32),
    Pitch(f32),
    Jump(bool),
    Raw(String),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Move(v) => write!(f, "move {}", v),
            Command::Turn(v) => write!(f, "turn {}", v),
            Command::Strafe(v) => write!(f, "strafe {}", v),
            Command::Pitch(v) => write!(f, "pitch {}", v),
            Command::Jump(on) => write!(f, "jump {}", if *on { 1 } else { 0 }),
            Command::Raw(text) => f.write_str(text),
        }
    }
}

/// One live mission attempt: owns the handle, the phase machine, and the
/// poll/command exchanges with the host.
pub struct MissionSession {
    config: Arc<HostConfig>,
    backend: Arc<dyn HostBackend>,
    client_config: ClientConfig,
    handle: MissionHandle,
    phase: MissionPhase,
}

impl std::fmt::Debug for MissionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MissionSession")
            .field("config", &self.config)
            .field("client_config", &self.client_config)
            .field("handle", &self.handle)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

#[derive(Error, Debug)]
pub enum AwaitStartError {
    #[error("mission did not start within {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error("interrupted by shutdown")]
    Interrupted,
}

impl MissionSession {
    pub(crate) fn new(
        config: Arc<HostConfig>,
        backend: Arc<dyn HostBackend>,
        client_config: ClientConfig,
        handle: MissionHandle,
    ) -> Self {
        Self {
            config,
            backend,
            client_config,
            handle,
            phase: MissionPhase::Starting,
        }
    }

    pub fn handle(&self) -> &MissionHandle {
        &self.handle
    }

    pub fn phase(&self) -> MissionPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == MissionPhase::Running
    }

    /// Polls until the host reports the mission running.
    ///
    /// Bounded by `start_timeout` and interruptible through the shutdown
    /// token; no command can be dispatched before this returns `Ok`.
    pub async fn await_start(&mut self, shutdown: &mut Shutdown) -> Result<(), AwaitStartError> {
        let deadline = Instant::now() + self.client_config.start_timeout;
        loop {
            if shutdown.is_triggered() {
                return Err(AwaitStartError::Interrupted);
            }
            let state = self.poll().await?;
            if state.is_mission_running {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AwaitStartError::TimedOut(self.client_config.start_timeout));
            }
            tokio::select! {
                _ = sleep(self.client_config.poll_interval) => {}
                _ = shutdown.triggered() => return Err(AwaitStartError::Interrupted),
            }
        }
    }

    /// Drains whatever the host has buffered since the previous poll.
    ///
    /// Transient transport failures are retried within the configured
    /// policy; an exhausted budget surfaces as
    /// [`PollError::RetriesExhausted`] and leaves the phase untouched.
    pub async fn poll(&mut self) -> Result<WorldState, PollError> {
        let retry = self.client_config.retry;
        let mut backoff = retry.initial_backoff;
        let mut last_error = String::new();

        for attempt in 1..=retry.max_attempts.max(1) {
            match self
                .backend
                .world_state(self.config.base_url(), self.handle.mission_id)
                .await
            {
                Ok(state) => {
                    self.observe(&state);
                    return Ok(state);
                }
                Err(err) => {
                    warn!(
                        target = "mission.poll",
                        handle = %self.handle,
                        attempt,
                        error = %err,
                        "world state poll failed"
                    );
                    last_error = err.to_string();
                    if attempt < retry.max_attempts {
                        sleep(backoff).await;
                        backoff = (backoff * 2).min(retry.max_backoff);
                    }
                }
            }
        }

        Err(PollError::RetriesExhausted {
            attempts: retry.max_attempts,
            last: last_error,
        })
    }

    /// Dispatches a typed command. See [`send_command`](Self::send_command).
    pub async fn send(&mut self, command: Command) {
        self.send_command(&command.to_string()).await;
    }

    /// Best-effort command dispatch: no delivery confirmation, transport
    /// errors are logged and swallowed, and anything sent outside the
    /// running phase is a no-op.
    pub async fn send_command(&mut self, command: &str) {
        if self.phase != MissionPhase::Running {
            debug!(
                target = "mission.command",
                handle = %self.handle,
                phase = ?self.phase,
                command,
                "dropping command outside running phase"
            );
            return;
        }
        if let Err(err) = self
            .backend
            .send_command(self.config.base_url(), self.handle.mission_id, command)
            .await
        {
            warn!(
                target = "mission.command",
                handle = %self.handle,
                command,
                error = %err,
                "command dispatch failed"
            );
        }
    }

    fn observe(&mut self, state: &WorldState) {
        for error in &state.errors {
            warn!(
                target = "mission.host",
                handle = %self.handle,
                error = %error.text,
                "host reported error"
            );
        }
        match (self.phase, state.is_mission_running) {
            (MissionPhase::NotStarted | MissionPhase::Starting, true) => {
                debug!(target = "mission.session", handle = %self.handle, "mission running");
                self.phase = MissionPhase::Running;
            }
            (MissionPhase::Running, false) => {
                debug!(target = "mission.session", handle = %self.handle, "mission stopped");
                self.phase = MissionPhase::Stopped;
            }
            _ => {}
        }
    }
}
