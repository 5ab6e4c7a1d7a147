use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::agent::game_api::{Block, BlockPos, EntitySummary};
use crate::agent::observation::{InventoryItem, Vec3, Vitals};

/// One state update pushed by the game bridge.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorldUpdate {
    Position {
        x: f64,
        y: f64,
        z: f64,
    },
    Inventory {
        items: Vec<InventoryItem>,
    },
    Vitals {
        health: f32,
        food: f32,
    },
    /// A single block changed; `name: None` means air / unloaded.
    Block {
        pos: BlockPos,
        #[serde(default)]
        name: Option<String>,
    },
    Biome {
        #[serde(default)]
        name: Option<String>,
    },
    Players {
        names: Vec<String>,
    },
    Entities {
        entities: Vec<EntitySummary>,
    },
    EntityGone {
        id: u64,
    },
    Chat {
        from: String,
        message: String,
    },
}

/// Local cache of everything the bridge has told us about the world.
#[derive(Debug, Default)]
pub struct WorldState {
    pub position: Vec3,
    pub inventory: Vec<InventoryItem>,
    pub vitals: Vitals,
    pub blocks: HashMap<BlockPos, String>,
    pub biome: Option<String>,
    pub players: Vec<String>,
    pub entities: BTreeMap<u64, EntitySummary>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, update: WorldUpdate) {
        match update {
            WorldUpdate::Position { x, y, z } => self.apply_position(Vec3 { x, y, z }),
            WorldUpdate::Inventory { items } => self.inventory = items,
            WorldUpdate::Vitals { health, food } => self.vitals = Vitals { health, food },
            WorldUpdate::Block { pos, name } => match name {
                Some(name) if !name.is_empty() && name != "air" => {
                    self.blocks.insert(pos, name);
                }
                _ => {
                    self.blocks.remove(&pos);
                }
            },
            WorldUpdate::Biome { name } => self.biome = name,
            WorldUpdate::Players { names } => self.players = names,
            WorldUpdate::Entities { entities } => {
                self.entities = entities.into_iter().map(|e| (e.id, e)).collect();
            }
            WorldUpdate::EntityGone { id } => {
                self.entities.remove(&id);
            }
            // Logged by the bridge; not part of the observation.
            WorldUpdate::Chat { .. } => {}
        }
    }

    pub fn apply_position(&mut self, pos: Vec3) {
        self.position = pos;
    }

    pub fn set_block(&mut self, pos: BlockPos, name: impl Into<String>) {
        self.blocks.insert(pos, name.into());
    }

    pub fn block(&self, pos: BlockPos) -> Option<Block> {
        self.blocks.get(&pos).map(|name| Block {
            name: name.clone(),
            pos,
        })
    }
}
