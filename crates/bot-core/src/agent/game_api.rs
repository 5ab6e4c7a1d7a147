use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::observation::{InventoryItem, Vec3, Vitals};

/// Integer block coordinates (floored world position). Arithmetic saturates at the i64 range.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPos {
    pub fn floor(v: Vec3) -> Self {
        Self {
            x: v.x.floor() as i64,
            y: v.y.floor() as i64,
            z: v.z.floor() as i64,
        }
    }

    pub fn offset(self, dx: i64, dy: i64, dz: i64) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            z: self.z.saturating_add(dz),
        }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3 {
            x: self.x as f64,
            y: self.y as f64,
            z: self.z as f64,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Block {
    pub name: String,
    pub pos: BlockPos,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    Mob,
    /// A dropped item lying on the ground.
    Item,
    Other,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EntitySummary {
    pub id: u64,
    pub name: String,
    pub kind: EntityKind,
    pub pos: Vec3,
}

/// Navigation target handed to the world's pathfinder.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavGoal {
    /// Stand on this exact block.
    Block { pos: BlockPos },
    /// Get within `range` of a point.
    Near { pos: Vec3, range: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// Digging was interrupted, usually by a pathfinder reset.
    #[error("Digging aborted")]
    DigAborted,
    #[error("{0}")]
    Rejected(String),
    #[error("world connection closed")]
    Disconnected,
}

pub type ActionFuture = Pin<Box<dyn Future<Output = Result<(), WorldError>> + Send + 'static>>;

/// Boundary the agent uses to read world state and act on it.
///
/// Reads are synchronous and must not block indefinitely; they return sentinel-friendly
/// `Option`s instead of failing. Dig/place hand back an owned future so the executor can
/// run the completion in the background while the loop carries on.
pub trait WorldApi: Send + Sync {
    fn position(&self) -> Vec3;

    fn inventory(&self) -> Vec<InventoryItem>;

    fn vitals(&self) -> Vitals;

    fn block_at(&self, pos: BlockPos) -> Option<Block>;

    fn biome(&self) -> Option<String>;

    /// Names of other players in range, excluding ourselves.
    fn nearby_players(&self) -> Vec<String>;

    fn entities(&self) -> Vec<EntitySummary>;

    fn dig(&self, block: Block) -> ActionFuture;

    fn place_block(&self, reference: Block, target: Vec3) -> ActionFuture;

    /// `None` clears any active navigation goal.
    fn set_goal(&self, goal: Option<NavGoal>);

    fn attack(&self, entity: &EntitySummary) -> Result<(), WorldError>;

    fn chat(&self, text: &str);
}
