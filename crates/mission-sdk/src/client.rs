use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::{MissionConfig, RecordConfig};
use crate::session::{ClientConfig, MissionHandle, MissionSession};
use crate::state::WorldState;

/// Location of the remote simulation host's control endpoint.
#[derive(Clone, Debug)]
pub struct HostConfig {
    base_url: Url,
}

impl HostConfig {
    pub fn new(host_base_url: impl AsRef<str>) -> Result<Self, StartError> {
        let mut base = host_base_url.as_ref().trim().to_string();
        if base.is_empty() {
            return Err(StartError::InvalidConfig(
                "host base url cannot be empty".into(),
            ));
        }
        if !base.starts_with("http://") && !base.starts_with("https://") {
            base = format!("http://{}", base);
        }
        let parsed = Url::parse(&base)
            .map_err(|err| StartError::InvalidConfig(format!("invalid host url: {err}")))?;
        Ok(Self { base_url: parsed })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// Entry point for one or more mission attempts against a single host.
///
/// Each successful [`start`](Self::start) hands back a [`MissionSession`]
/// that exclusively owns the attempt; a new attempt requires a new start
/// call.
#[derive(Clone)]
pub struct MissionClient {
    config: Arc<HostConfig>,
    client_config: ClientConfig,
    backend: Arc<dyn HostBackend>,
}

impl MissionClient {
    pub fn new(config: HostConfig) -> Result<Self, StartError> {
        Self::with_client_config(config, ClientConfig::default())
    }

    pub fn with_client_config(
        config: HostConfig,
        client_config: ClientConfig,
    ) -> Result<Self, StartError> {
        let backend = Arc::new(ReqwestHostBackend::new()?);
        Ok(Self {
            config: Arc::new(config),
            client_config,
            backend,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_backend(
        config: HostConfig,
        client_config: ClientConfig,
        backend: Arc<dyn HostBackend>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            client_config,
            backend,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Submits the mission and recording configuration to the host.
    ///
    /// Failure here is fatal to the attempt: the caller gets no session and
    /// must not enter the poll loop.
    pub async fn start(
        &self,
        mission: MissionConfig,
        record: RecordConfig,
    ) -> Result<MissionSession, StartError> {
        validate_recording_destination(&record)?;

        let request = StartMissionRequest {
            mission: &mission,
            record: &record,
        };
        let response = self
            .backend
            .start_mission(self.config.base_url(), &request)
            .await?;

        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "mission start rejected".to_string());
            return Err(StartError::Rejected(message));
        }
        let mission_id = response
            .mission_id
            .ok_or_else(|| StartError::InvalidResponse("missing mission id".into()))?;

        Ok(MissionSession::new(
            self.config.clone(),
            self.backend.clone(),
            self.client_config.clone(),
            MissionHandle::new(mission_id),
        ))
    }
}

fn validate_recording_destination(record: &RecordConfig) -> Result<(), StartError> {
    let destination = record.destination();
    if destination.as_os_str().is_empty() {
        return Err(StartError::RecordingPath {
            path: destination.to_path_buf(),
            reason: "destination path is empty".into(),
        });
    }
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(StartError::RecordingPath {
                path: destination.to_path_buf(),
                reason: format!("parent directory {} does not exist", parent.display()),
            });
        }
    }
    Ok(())
}

#[derive(Error, Debug)]
pub enum StartError {
    #[error("invalid host configuration: {0}")]
    InvalidConfig(String),
    #[error("recording destination {path:?} is unusable: {reason}")]
    RecordingPath { path: PathBuf, reason: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected http status {0}")]
    HttpStatus(StatusCode),
    #[error("host rejected mission start: {0}")]
    Rejected(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A single failed exchange with the host. Transient by construction: the
/// session retries these and only surfaces [`PollError::RetriesExhausted`]
/// once its retry budget is spent.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected http status {0}")]
    HttpStatus(StatusCode),
    #[error("world state poll failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

#[async_trait]
pub(crate) trait HostBackend: Send + Sync {
    async fn start_mission(
        &self,
        base_url: &Url,
        request: &StartMissionRequest<'_>,
    ) -> Result<StartMissionResponse, StartError>;

    async fn world_state(&self, base_url: &Url, mission_id: Uuid)
        -> Result<WorldState, PollError>;

    async fn send_command(
        &self,
        base_url: &Url,
        mission_id: Uuid,
        command: &str,
    ) -> Result<(), PollError>;
}

struct ReqwestHostBackend {
    client: reqwest::Client,
}

impl ReqwestHostBackend {
    fn new() -> Result<Self, StartError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(8))
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HostBackend for ReqwestHostBackend {
    async fn start_mission(
        &self,
        base_url: &Url,
        request: &StartMissionRequest<'_>,
    ) -> Result<StartMissionResponse, StartError> {
        let endpoint = base_url
            .join("missions")
            .map_err(|err| StartError::InvalidConfig(format!("invalid missions endpoint: {err}")))?;
        let response = self.client.post(endpoint).json(request).send().await?;
        if !response.status().is_success() {
            return Err(StartError::HttpStatus(response.status()));
        }
        let payload = response.json::<StartMissionResponse>().await?;
        Ok(payload)
    }

    async fn world_state(
        &self,
        base_url: &Url,
        mission_id: Uuid,
    ) -> Result<WorldState, PollError> {
        let endpoint = base_url
            .join(&format!("missions/{}/state", mission_id))
            .map_err(|_| PollError::HttpStatus(StatusCode::BAD_REQUEST))?;
        let response = self.client.get(endpoint).send().await?;
        if !response.status().is_success() {
            return Err(PollError::HttpStatus(response.status()));
        }
        let payload = response.json::<WorldState>().await?;
        Ok(payload)
    }

    async fn send_command(
        &self,
        base_url: &Url,
        mission_id: Uuid,
        command: &str,
    ) -> Result<(), PollError> {
        let endpoint = base_url
            .join(&format!("missions/{}/commands", mission_id))
            .map_err(|_| PollError::HttpStatus(StatusCode::BAD_REQUEST))?;
        let response = self
            .client
            .post(endpoint)
            .json(&CommandRequest { command })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PollError::HttpStatus(response.status()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StartMissionRequest<'a> {
    pub mission: &'a MissionConfig,
    pub record: &'a RecordConfig,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartMissionResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub mission_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct CommandRequest<'a> {
    command: &'a str,
}
