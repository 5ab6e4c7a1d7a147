//! In-process fakes for the world and inference collaborators.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use super::game_api::{ActionFuture, Block, BlockPos, EntitySummary, NavGoal, WorldApi, WorldError};
use super::harness::LlmClient;
use super::memory::HistoryEntry;
use super::observation::{InventoryItem, Vec3, Vitals};
use crate::world::WorldState;

#[derive(Debug, Clone, PartialEq)]
pub enum WorldAction {
    Dig(Block),
    Place { reference: Block, target: Vec3 },
    SetGoal(Option<NavGoal>),
    Attack(u64),
    Chat(String),
}

type StateHook = Box<dyn FnOnce(&mut WorldState) + Send>;

#[derive(Default)]
pub struct FakeWorld {
    state: Mutex<WorldState>,
    actions: Mutex<Vec<WorldAction>>,
    action_outcomes: Mutex<VecDeque<Result<(), WorldError>>>,
    action_effects: Mutex<VecDeque<StateHook>>,
}

impl FakeWorld {
    pub fn with_state(&self, f: impl FnOnce(&mut WorldState)) {
        f(&mut self.state.lock().unwrap());
    }

    /// Outcome for the next dig/place; defaults to success when nothing is queued.
    pub fn push_action_outcome(&self, outcome: Result<(), WorldError>) {
        self.action_outcomes.lock().unwrap().push_back(outcome);
    }

    /// State change applied when the next dig/place is issued.
    pub fn on_next_action(&self, effect: impl FnOnce(&mut WorldState) + Send + 'static) {
        self.action_effects.lock().unwrap().push_back(Box::new(effect));
    }

    pub fn actions(&self) -> Vec<WorldAction> {
        self.actions.lock().unwrap().clone()
    }

    pub fn chats(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                WorldAction::Chat(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, action: WorldAction) {
        self.actions.lock().unwrap().push(action);
    }

    fn next_outcome(&self) -> Result<(), WorldError> {
        let effect = self.action_effects.lock().unwrap().pop_front();
        if let Some(effect) = effect {
            effect(&mut self.state.lock().unwrap());
        }
        self.action_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

impl WorldApi for FakeWorld {
    fn position(&self) -> Vec3 {
        self.state.lock().unwrap().position
    }

    fn inventory(&self) -> Vec<InventoryItem> {
        self.state.lock().unwrap().inventory.clone()
    }

    fn vitals(&self) -> Vitals {
        self.state.lock().unwrap().vitals
    }

    fn block_at(&self, pos: BlockPos) -> Option<Block> {
        self.state.lock().unwrap().block(pos)
    }

    fn biome(&self) -> Option<String> {
        self.state.lock().unwrap().biome.clone()
    }

    fn nearby_players(&self) -> Vec<String> {
        self.state.lock().unwrap().players.clone()
    }

    fn entities(&self) -> Vec<EntitySummary> {
        self.state.lock().unwrap().entities.values().cloned().collect()
    }

    fn dig(&self, block: Block) -> ActionFuture {
        self.record(WorldAction::Dig(block));
        let outcome = self.next_outcome();
        Box::pin(async move { outcome })
    }

    fn place_block(&self, reference: Block, target: Vec3) -> ActionFuture {
        self.record(WorldAction::Place { reference, target });
        let outcome = self.next_outcome();
        Box::pin(async move { outcome })
    }

    fn set_goal(&self, goal: Option<NavGoal>) {
        self.record(WorldAction::SetGoal(goal));
    }

    fn attack(&self, entity: &EntitySummary) -> Result<(), WorldError> {
        self.record(WorldAction::Attack(entity.id));
        Ok(())
    }

    fn chat(&self, text: &str) {
        self.record(WorldAction::Chat(text.to_string()));
    }
}

#[derive(Default)]
pub struct FakeLlm {
    responses: Mutex<VecDeque<anyhow::Result<String>>>,
    requests: Mutex<Vec<Vec<HistoryEntry>>>,
}

impl FakeLlm {
    pub fn push_response(&self, raw: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(raw.into()));
    }

    pub fn push_error(&self, msg: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!(msg.to_string())));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<Vec<HistoryEntry>> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl LlmClient for FakeLlm {
    fn complete<'a>(
        &'a self,
        messages: Vec<HistoryEntry>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(messages);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| anyhow::bail!("no llm response queued"))
        })
    }
}
