use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info};

use super::executor::Executor;
use super::game_api::WorldApi;
use super::goal::GoalThresholds;
use super::harness::{HarnessConfig, LlmClient, tick};
use super::memory::{ConversationHistory, GoalProgress};
use super::observation::{Snapshot, SnapshotBuilder};
use super::prompt::PromptConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Terminal. Background work has been cancelled and navigation cleared.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    GoalReached,
    TickLimit,
    /// The loop was already shut down when `run` was called.
    Stopped,
}

/// What the host gets back when the loop stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopExit {
    pub reason: ExitReason,
    pub ticks: u64,
    pub progress: GoalProgress,
}

pub struct AgentLoop {
    pub history: ConversationHistory,
    pub prompt_cfg: PromptConfig,
    pub executor: Executor,
    pub snapshot_builder: SnapshotBuilder,
    state: LoopState,
    ticks: u64,
}

impl AgentLoop {
    pub fn new(system_prompt: impl Into<String>, world: Arc<dyn WorldApi>) -> Self {
        Self {
            history: ConversationHistory::new(system_prompt),
            prompt_cfg: PromptConfig::default(),
            executor: Executor::new(world),
            snapshot_builder: SnapshotBuilder::default(),
            state: LoopState::Running,
            ticks: 0,
        }
    }

    /// Replaces the goal thresholds used by both the snapshot and the prompt text.
    pub fn with_thresholds(mut self, thresholds: GoalThresholds) -> Self {
        self.prompt_cfg =
            PromptConfig::for_thresholds(thresholds.dirt_required, thresholds.wood_required);
        self.snapshot_builder = SnapshotBuilder::new(thresholds);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub(crate) fn begin_tick(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }

    pub fn observe(&self) -> Snapshot {
        self.snapshot_builder.build(
            self.executor.world().as_ref(),
            self.executor.result_record().get(),
        )
    }

    /// Enters `Done`; cancels background work and clears navigation. Safe to call twice.
    pub fn shutdown(&mut self) {
        if self.state == LoopState::Done {
            return;
        }
        self.state = LoopState::Done;
        self.executor.shutdown();
    }

    pub async fn run(&mut self, llm: &dyn LlmClient, cfg: &HarnessConfig) -> LoopExit {
        info!(
            tick_interval_ms = cfg.tick_interval.as_millis() as u64,
            max_ticks = ?cfg.max_ticks,
            "agent.loop.start"
        );

        while self.state == LoopState::Running {
            match AssertUnwindSafe(tick(self, llm)).catch_unwind().await {
                Ok(report) if report.goal_reached => {
                    info!(tick = report.tick, "agent.goal.reached");
                    return self.finish(ExitReason::GoalReached);
                }
                Ok(_) => {}
                Err(panic) => {
                    error!(
                        tick = self.ticks,
                        panic = %panic_message(panic.as_ref()),
                        "agent.tick.panicked"
                    );
                }
            }

            if let Some(max) = cfg.max_ticks
                && self.ticks >= max
            {
                return self.finish(ExitReason::TickLimit);
            }
            tokio::time::sleep(cfg.tick_interval).await;
        }

        self.exit(ExitReason::Stopped)
    }

    fn finish(&mut self, reason: ExitReason) -> LoopExit {
        self.shutdown();
        let exit = self.exit(reason);
        info!(
            reason = ?exit.reason,
            ticks = exit.ticks,
            houses_built = exit.progress.houses_built,
            "agent.loop.done"
        );
        exit
    }

    fn exit(&self, reason: ExitReason) -> LoopExit {
        LoopExit {
            reason,
            ticks: self.ticks,
            progress: self.executor.progress().get(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
