//! Sense/think/act agent: snapshot, prompt, command parsing, dispatch and the control loop.
//!
//! The world and the model are reached only through the [`WorldApi`] and [`LlmClient`]
//! traits, so everything here runs the same against a live bridge or in-process fakes.

pub mod command;
pub mod executor;
pub mod game_api;
pub mod goal;
pub mod harness;
pub mod r#loop;
pub mod memory;
pub mod observation;
pub mod prompt;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use command::{Command, CommandParseError, Direction, parse_command};
pub use game_api::{ActionFuture, Block, BlockPos, EntityKind, EntitySummary, NavGoal, WorldApi, WorldError};
pub use goal::{GoalThresholds, goals_met};
pub use harness::{HarnessConfig, LlmClient, TickOutcome, TickReport};
pub use memory::{ConversationHistory, DEFAULT_SYSTEM_PROMPT, GoalProgress, HistoryEntry, ResultRecord};
pub use observation::{Snapshot, SnapshotBuilder, Vec3};
pub use r#loop::{AgentLoop, ExitReason, LoopExit, LoopState};
