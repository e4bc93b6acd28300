//! End-to-end tests against an in-process mock simulation host.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use mission_sdk::{
    shutdown_channel, ClientConfig, Command, HostConfig, MissionClient, MissionConfig,
    MissionPhase, RecordConfig, RetryPolicy, StartError, TimestampedReward, WorldState,
};

struct MockHost {
    reject_start: bool,
    snapshots: Vec<WorldState>,
    polls: AtomicUsize,
    commands: Mutex<Vec<String>>,
    started_payloads: Mutex<Vec<Value>>,
}

impl MockHost {
    fn with_snapshots(snapshots: Vec<WorldState>) -> Arc<Self> {
        Arc::new(Self {
            reject_start: false,
            snapshots,
            polls: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
            started_payloads: Mutex::new(Vec::new()),
        })
    }

    fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject_start: true,
            snapshots: Vec::new(),
            polls: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
            started_payloads: Mutex::new(Vec::new()),
        })
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

async fn start_mission(State(host): State<Arc<MockHost>>, Json(body): Json<Value>) -> Json<Value> {
    host.started_payloads.lock().unwrap().push(body);
    if host.reject_start {
        return Json(json!({
            "success": false,
            "message": "no simulation client available",
        }));
    }
    Json(json!({
        "success": true,
        "mission_id": uuid::Uuid::new_v4(),
    }))
}

async fn world_state(
    State(host): State<Arc<MockHost>>,
    Path(_mission_id): Path<String>,
) -> Json<Value> {
    let index = host.polls.fetch_add(1, Ordering::SeqCst);
    let snapshot = host
        .snapshots
        .get(index.min(host.snapshots.len().saturating_sub(1)))
        .cloned()
        .unwrap_or_else(|| WorldState::idle(false));
    Json(serde_json::to_value(snapshot).unwrap())
}

async fn send_command(
    State(host): State<Arc<MockHost>>,
    Path(_mission_id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    let command = body["command"].as_str().unwrap_or_default().to_string();
    host.commands.lock().unwrap().push(command);
    StatusCode::NO_CONTENT
}

async fn spawn_host(host: Arc<MockHost>) -> SocketAddr {
    let app = Router::new()
        .route("/missions", post(start_mission))
        .route("/missions/:id/state", get(world_state))
        .route("/missions/:id/commands", post(send_command))
        .with_state(host);
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock host");
    let addr = listener.local_addr().expect("mock host addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

fn fast_config() -> ClientConfig {
    ClientConfig::default()
        .with_poll_interval(Duration::from_millis(5))
        .with_start_timeout(Duration::from_secs(5))
        .with_retry(RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
        })
}

fn scripted_mission() -> (MissionConfig, RecordConfig) {
    let mission = MissionConfig::new()
        .with_time_limit(Duration::from_secs(10))
        .request_video(320, 240)
        .reward_for_reaching_position(19.5, 0.0, 19.5, 100.0, 1.1);
    let record = RecordConfig::new("./saved_data.tgz")
        .record_commands()
        .record_mp4(20, 400_000)
        .record_rewards()
        .record_observations();
    (mission, record)
}

fn running_with_reward(value: f64) -> WorldState {
    WorldState {
        is_mission_running: true,
        rewards: vec![TimestampedReward {
            timestamp: SystemTime::now(),
            value,
        }],
        rewards_since_last_state: 1,
        ..WorldState::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn full_mission_lifecycle() {
    let host = MockHost::with_snapshots(vec![
        WorldState::idle(false),
        WorldState::idle(false),
        WorldState::idle(true),
        running_with_reward(100.0),
        WorldState::idle(false),
    ]);
    let addr = spawn_host(host.clone()).await;

    let config = HostConfig::new(format!("http://{}", addr)).unwrap();
    let client = MissionClient::with_client_config(config, fast_config()).unwrap();

    let (mission, record) = scripted_mission();
    let mut session = client.start(mission, record).await.unwrap();
    assert_eq!(session.phase(), MissionPhase::Starting);

    let (_shutdown_handle, mut shutdown) = shutdown_channel();
    session.await_start(&mut shutdown).await.unwrap();
    assert!(session.is_running());
    assert!(
        host.commands().is_empty(),
        "no command may reach the host before the running phase"
    );

    let mut summed_reward = 0.0;
    let mut iterations = 0;
    while session.is_running() {
        session.send(Command::Move(1.0)).await;
        let state = session.poll().await.unwrap();
        summed_reward += state.summed_reward();
        iterations += 1;
        assert!(iterations < 10, "loop must exit once the host stops");
    }

    assert_eq!(session.phase(), MissionPhase::Stopped);
    assert_eq!(summed_reward, 100.0);
    assert!(!host.commands().is_empty());

    // Commands after the stop are dropped client-side.
    let dispatched = host.commands().len();
    session.send(Command::Move(1.0)).await;
    assert_eq!(host.commands().len(), dispatched);
}

#[tokio::test(flavor = "multi_thread")]
async fn start_payload_carries_mission_and_record_configuration() {
    let host = MockHost::with_snapshots(vec![WorldState::idle(false)]);
    let addr = spawn_host(host.clone()).await;

    let config = HostConfig::new(format!("http://{}", addr)).unwrap();
    let client = MissionClient::with_client_config(config, fast_config()).unwrap();
    let (mission, record) = scripted_mission();
    client.start(mission, record).await.unwrap();

    let payloads = host.started_payloads.lock().unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["mission"]["time_limit_secs"], 10.0);
    assert_eq!(payloads[0]["mission"]["video"]["width"], 320);
    assert_eq!(
        payloads[0]["mission"]["reward_rules"][0]["trigger"]["kind"],
        "reach_position"
    );
    assert_eq!(payloads[0]["record"]["video"]["frames_per_second"], 20);
    assert_eq!(payloads[0]["record"]["observations"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_start_surfaces_the_host_message() {
    let host = MockHost::rejecting();
    let addr = spawn_host(host.clone()).await;

    let config = HostConfig::new(format!("http://{}", addr)).unwrap();
    let client = MissionClient::with_client_config(config, fast_config()).unwrap();

    let (mission, record) = scripted_mission();
    let err = client.start(mission, record).await.unwrap_err();
    assert!(
        matches!(err, StartError::Rejected(ref msg) if msg.contains("no simulation client")),
        "unexpected error: {err}"
    );
    assert_eq!(host.polls.load(Ordering::SeqCst), 0, "no poll after a failed start");
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_host_fails_the_start_call() {
    // Bind-then-drop to get a port nobody is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = HostConfig::new(format!("http://{}", addr)).unwrap();
    let client = MissionClient::with_client_config(config, fast_config()).unwrap();

    let (mission, record) = scripted_mission();
    let err = client.start(mission, record).await.unwrap_err();
    assert!(matches!(err, StartError::Network(_)));
}
