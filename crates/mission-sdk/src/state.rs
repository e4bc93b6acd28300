use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A point-in-time view of host events observed since the previous poll.
///
/// Snapshots are produced fresh on every poll and never mutated afterwards;
/// the `*_since_last_state` counts are deltas, not cumulative totals, so
/// callers must not expect monotonic growth across snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldState {
    #[serde(default)]
    pub is_mission_running: bool,
    /// Host-reported error strings in arrival order. Diagnostic only; an
    /// error here does not imply the mission has stopped.
    #[serde(default)]
    pub errors: Vec<TimestampedText>,
    /// Rewards granted since the previous poll, in arrival order.
    #[serde(default)]
    pub rewards: Vec<TimestampedReward>,
    #[serde(default)]
    pub video_frames_since_last_state: u64,
    #[serde(default)]
    pub observations_since_last_state: u64,
    #[serde(default)]
    pub rewards_since_last_state: u64,
}

impl WorldState {
    /// An empty snapshot carrying only the running flag, used when the host
    /// had nothing new to report.
    pub fn idle(is_mission_running: bool) -> Self {
        Self {
            is_mission_running,
            ..Self::default()
        }
    }

    pub fn summed_reward(&self) -> f64 {
        self.rewards.iter().map(|r| r.value).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedText {
    pub timestamp: SystemTime,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedReward {
    pub timestamp: SystemTime,
    pub value: f64,
}
