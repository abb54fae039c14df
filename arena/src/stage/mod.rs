//! Per-class stage machine and channel gating
//!
//! # Usage
//!
//! ```ignore
//! use arena::stage::StageController;
//! use arena::state::ContestStage;
//!
//! let controller = StageController::new(store, hub);
//! controller.set_stage(7, ContestStage::PreVoting, Some(1)).await?;
//! assert!(!controller.can_reveal(7).await?);
//! ```

pub mod controller;
pub mod snapshot;

pub use controller::{SharedStageController, StageController};
pub use snapshot::{ContestSummary, DebateProgress, DebateSnapshot, ProgressCount, StateUpdate};
