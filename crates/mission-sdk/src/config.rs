use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

/// Declarative mission parameters handed to the host when an attempt starts.
///
/// Built once per attempt and never mutated after submission; a fresh start
/// call requires a fresh configuration.
#[derive(Debug, Clone, Serialize)]
pub struct MissionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    time_limit_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video: Option<VideoRequest>,
    reward_rules: Vec<RewardRule>,
}

#[derive(Debug, Clone, Serialize)]
struct VideoRequest {
    width: u32,
    height: u32,
}

/// A single reward-shaping rule; rules are evaluated by the host in the
/// order they were added.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardRule {
    pub trigger: RewardTrigger,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RewardTrigger {
    ReachPosition {
        x: f64,
        y: f64,
        z: f64,
        tolerance: f64,
    },
    TouchingBlock {
        block: String,
    },
    PerCommand,
}

impl MissionConfig {
    pub fn new() -> Self {
        Self {
            time_limit_secs: None,
            video: None,
            reward_rules: Vec::new(),
        }
    }

    /// Caps the mission's wall-clock duration; the host flips the running
    /// flag once the limit elapses.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit_secs = Some(limit.as_secs_f64());
        self
    }

    pub fn request_video(mut self, width: u32, height: u32) -> Self {
        self.video = Some(VideoRequest { width, height });
        self
    }

    pub fn reward_for_reaching_position(
        mut self,
        x: f64,
        y: f64,
        z: f64,
        value: f64,
        tolerance: f64,
    ) -> Self {
        self.reward_rules.push(RewardRule {
            trigger: RewardTrigger::ReachPosition { x, y, z, tolerance },
            value,
        });
        self
    }

    pub fn reward_for_touching_block(mut self, block: impl Into<String>, value: f64) -> Self {
        self.reward_rules.push(RewardRule {
            trigger: RewardTrigger::TouchingBlock {
                block: block.into(),
            },
            value,
        });
        self
    }

    pub fn reward_per_command(mut self, value: f64) -> Self {
        self.reward_rules.push(RewardRule {
            trigger: RewardTrigger::PerCommand,
            value,
        });
        self
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs.map(Duration::from_secs_f64)
    }

    pub fn reward_rules(&self) -> &[RewardRule] {
        &self.reward_rules
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Recording options paired with one mission attempt.
///
/// The host packages the selected streams into an archive at the destination
/// path; the client never reads the artifact back.
#[derive(Debug, Clone, Serialize)]
pub struct RecordConfig {
    destination: PathBuf,
    commands: bool,
    rewards: bool,
    observations: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    video: Option<Mp4Settings>,
}

#[derive(Debug, Clone, Serialize)]
struct Mp4Settings {
    frames_per_second: u32,
    bit_rate: u32,
}

impl RecordConfig {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            commands: false,
            rewards: false,
            observations: false,
            video: None,
        }
    }

    pub fn record_commands(mut self) -> Self {
        self.commands = true;
        self
    }

    pub fn record_rewards(mut self) -> Self {
        self.rewards = true;
        self
    }

    pub fn record_observations(mut self) -> Self {
        self.observations = true;
        self
    }

    pub fn record_mp4(mut self, frames_per_second: u32, bit_rate: u32) -> Self {
        self.video = Some(Mp4Settings {
            frames_per_second,
            bit_rate,
        });
        self
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}
