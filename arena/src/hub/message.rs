//! Broadcast message envelope
//!
//! Every message goes out as `{"type": ..., "data": {...}}`. There is no
//! version field; consumers tolerate additive fields.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::results::ContestResult;
use crate::state::{ClassId, ContestId};

/// Message type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Compact stage snapshot
    #[serde(rename = "STATE_UPDATE")]
    StateUpdate,
    /// Stage, contest, channel flags and progress
    #[serde(rename = "debate_update")]
    DebateUpdate,
    /// Aggregate vote count, global subscribers only
    #[serde(rename = "vote_progress")]
    VoteProgress,
    /// Computed contest result
    #[serde(rename = "results_reveal")]
    ResultsReveal,
    /// Countdown tick
    #[serde(rename = "TIMER_UPDATE")]
    TimerUpdate,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StateUpdate => "STATE_UPDATE",
            Self::DebateUpdate => "debate_update",
            Self::VoteProgress => "vote_progress",
            Self::ResultsReveal => "results_reveal",
            Self::TimerUpdate => "TIMER_UPDATE",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message ready for fan-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub data: Value,
}

impl HubMessage {
    /// Wrap any serializable payload. A payload that fails to serialize
    /// is logged and sent as `null`.
    pub fn new<T: Serialize>(kind: MessageKind, payload: &T) -> Self {
        let data = serde_json::to_value(payload).unwrap_or_else(|e| {
            warn!(kind = %kind, "Failed to serialize message payload: {}", e);
            Value::Null
        });
        Self { kind, data }
    }

    pub fn timer_update(class_id: ClassId, countdown: u64) -> Self {
        Self {
            kind: MessageKind::TimerUpdate,
            data: json!({ "countdown": countdown, "class_id": class_id }),
        }
    }

    pub fn vote_progress(class_id: ClassId, contest_id: ContestId, total_votes: u64) -> Self {
        Self {
            kind: MessageKind::VoteProgress,
            data: json!({
                "total_votes": total_votes,
                "contest_id": contest_id,
                "class_id": class_id,
            }),
        }
    }

    pub fn results_reveal(class_id: ClassId, results: &ContestResult) -> Self {
        Self {
            kind: MessageKind::ResultsReveal,
            data: json!({ "class_id": class_id, "results": results }),
        }
    }

    /// Wire text sent to subscribers.
    pub fn to_text(&self) -> String {
        json!({ "type": self.kind, "data": self.data }).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let msg = HubMessage::timer_update(5, 3);
        let parsed: Value = serde_json::from_str(&msg.to_text()).unwrap();
        assert_eq!(parsed["type"], "TIMER_UPDATE");
        assert_eq!(parsed["data"]["countdown"], 3);
        assert_eq!(parsed["data"]["class_id"], 5);
    }

    #[test]
    fn test_message_parses_back() {
        let msg = HubMessage::vote_progress(7, 2, 41);
        let back: HubMessage = serde_json::from_str(&msg.to_text()).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.kind.as_str(), "vote_progress");
    }

    #[test]
    fn test_kind_tags_match_wire() {
        for kind in [
            MessageKind::StateUpdate,
            MessageKind::DebateUpdate,
            MessageKind::VoteProgress,
            MessageKind::ResultsReveal,
            MessageKind::TimerUpdate,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
