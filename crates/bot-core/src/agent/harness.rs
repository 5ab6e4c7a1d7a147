use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{info, warn};

use super::AgentLoop;
use super::command::{Command, CommandParseError, parse_command};
use super::goal::{goals_met, tally};
use super::memory::{HistoryEntry, TurnRole};
use super::prompt::build_user_prompt;

pub trait LlmClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        messages: Vec<HistoryEntry>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;
}

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Pause between the end of one tick and the start of the next.
    pub tick_interval: Duration,
    /// Stop after this many ticks even if goals are not met. `None` runs until done.
    pub max_ticks: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_ticks: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A command was parsed and handed to the executor.
    Dispatched { command: Command, result: String },
    /// The model replied, but the reply was not a valid command.
    ParseFailed {
        error: CommandParseError,
        result: String,
    },
    /// No usable reply; nothing was dispatched this tick.
    InferenceFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub outcome: TickOutcome,
    pub goal_reached: bool,
}

/// One observe/infer/act/check cycle.
///
/// Owns no timers; the caller decides when to run the next tick. Goals are checked against
/// the snapshot taken at the start of the tick.
pub async fn tick(agent: &mut AgentLoop, llm: &dyn LlmClient) -> TickReport {
    let tick = agent.begin_tick();
    let snapshot = agent.observe();
    let prompt = build_user_prompt(&snapshot, &agent.prompt_cfg);
    agent.history.append(TurnRole::User, prompt);

    let messages = agent.history.snapshot_for_inference().to_vec();
    let outcome = match llm.complete(messages).await {
        Ok(raw) if !raw.trim().is_empty() => {
            let reply = raw.trim().to_string();
            agent.history.append(TurnRole::Assistant, reply.clone());
            match parse_command(&reply) {
                Ok(command) => {
                    let result = agent.executor.execute(&command);
                    TickOutcome::Dispatched { command, result }
                }
                Err(error) => {
                    let result = agent.executor.record_parse_failure(&error);
                    TickOutcome::ParseFailed { error, result }
                }
            }
        }
        Ok(_) => {
            warn!(tick, "agent.inference.empty");
            TickOutcome::InferenceFailed {
                reason: "empty response".to_string(),
            }
        }
        Err(err) => {
            let reason = format!("{err:#}");
            warn!(tick, error = %reason, "agent.inference.failed");
            TickOutcome::InferenceFailed { reason }
        }
    };

    let reaped = agent.executor.reap_finished();
    let goal_reached = goals_met(&snapshot);
    let goals = tally(&snapshot.inventory);
    info!(
        tick,
        dirt = goals.dirt,
        wood = goals.wood,
        reaped,
        goal_reached,
        "agent.tick"
    );

    TickReport {
        tick,
        outcome,
        goal_reached,
    }
}
