//! Mission SDK: session client for a remote simulation host.
//!
//! Responsibilities:
//! - submitting mission and recording configuration to the host
//! - waiting for mission start and polling buffered world state
//! - dispatching best-effort agent commands while the mission runs
//!
//! The host is an external actor with its own simulation tick; nothing here
//! assumes a sent command is visible in the next polled snapshot.

pub mod client;
pub mod config;
pub mod session;
pub mod shutdown;
pub mod state;

pub use client::{HostConfig, MissionClient, PollError, StartError};
pub use config::{MissionConfig, RecordConfig, RewardRule, RewardTrigger};
pub use session::{
    AwaitStartError, ClientConfig, Command, MissionHandle, MissionPhase, MissionSession,
    RetryPolicy,
};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownHandle};
pub use state::{TimestampedReward, TimestampedText, WorldState};
