//! Live debate contest orchestration
//!
//! This library provides:
//! - A per-class stage machine that gates audience voting and judge scoring
//! - Result calculation: swing votes, growth rates, winner and debater ranks
//! - A broadcast hub with class-scoped and venue-wide subscribers and
//!   per-class countdown timers
//!
//! # Usage
//!
//! ```ignore
//! use arena::{ArenaConfig, ArenaService, ContestStage, MemoryStore};
//!
//! let service = ArenaService::new(ArenaConfig::default(), MemoryStore::new().shared());
//! let (_id, mut screen) = service.subscribe(None);
//! service.controller().set_stage(7, ContestStage::PreVoting, Some(1)).await?;
//! service.start_countdown(7, Some(60), None);
//! ```

pub mod config;
pub mod error;
pub mod hub;
pub mod results;
pub mod reveal;
pub mod service;
pub mod stage;
pub mod state;
pub mod submissions;
pub mod telemetry;

pub use config::{ArenaConfig, ConfigError};
pub use error::{ArenaError, ArenaResult};
pub use hub::{
    BroadcastHub, ChannelSubscriber, CountdownCallback, DeliveryError, FanoutReport, HubMessage,
    MessageKind, SharedBroadcastHub, Subscriber, SubscriberHandle, SubscriberId,
};
pub use results::{
    ContestResult, DebaterRanking, GrowthRate, ResultEngine, SideTally, SwingVotes,
    VoteStatistics, Winner,
};
pub use reveal::{RevealOutcome, RevealWorkflow};
pub use service::ArenaService;
pub use stage::{DebateProgress, DebateSnapshot, StageController, StateUpdate};
pub use state::{
    ChannelFlags, ClassId, Contest, ContestId, ContestStage, ContestStore, MemoryStore,
    SharedContestStore, StageState, TeamSide, UserId, VotePhase,
};
pub use submissions::{ScoreSubmission, SubmissionDesk, VoteReceipt, VoteSubmission};
