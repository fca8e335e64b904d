//! AI返信の生成と逐次表示

pub mod orchestrator;
pub mod queue;
pub mod sequencer;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use orchestrator::{
    AutoReplyRule, Disposition, OrchestratorOptions, ReplyOrchestrator, StaleReplyPolicy,
};
pub use queue::{QueuedReply, ReplyQueue, DEFAULT_QUEUE_CAPACITY};
pub use sequencer::{DisplayEvent, ReplySequencer, SequencerState, SequencerTiming};

/// 返信まわりの設定（設定ファイルの `[reply]`）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplySettings {
    pub queue_capacity: usize,
    pub typing_interval_ms: u64,
    pub display_hold_ms: u64,
    pub silent_hold_ms: u64,
    pub cooldown_ms: u64,
    pub max_concurrent_requests: usize,
    pub stale_policy: StaleReplyPolicy,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            typing_interval_ms: 50,
            display_hold_ms: 5000,
            silent_hold_ms: 1500,
            cooldown_ms: 500,
            max_concurrent_requests: 1,
            stale_policy: StaleReplyPolicy::Enqueue,
        }
    }
}

impl ReplySettings {
    pub fn timing(&self) -> SequencerTiming {
        SequencerTiming {
            typing_interval: Duration::from_millis(self.typing_interval_ms),
            display_hold: Duration::from_millis(self.display_hold_ms),
            silent_hold: Duration::from_millis(self.silent_hold_ms),
            cooldown: Duration::from_millis(self.cooldown_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing_matches_sequencer_defaults() {
        assert_eq!(ReplySettings::default().timing(), SequencerTiming::default());
    }

    #[test]
    fn test_partial_toml() {
        let settings: ReplySettings =
            toml::from_str("stale_policy = \"discard\"\ncooldown_ms = 0").unwrap();
        assert_eq!(settings.stale_policy, StaleReplyPolicy::Discard);
        assert_eq!(settings.cooldown_ms, 0);
        assert_eq!(settings.queue_capacity, 10);
    }
}
