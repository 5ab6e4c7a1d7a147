use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::game_api::{BlockPos, WorldApi};
use super::goal::GoalThresholds;

pub const NO_BLOCK: &str = "none";
pub const UNKNOWN_BIOME: &str = "Unknown";

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn offset(self, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    pub fn dist_sq(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct InventoryItem {
    pub name: String,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Default)]
pub struct Vitals {
    pub health: f32,
    pub food: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BlocksAround {
    pub north: String,
    pub south: String,
    pub east: String,
    pub west: String,
    pub up: String,
    pub down: String,
}

/// Read-only capture of everything the model gets to see for one tick.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Snapshot {
    pub position: Vec3,
    pub inventory: Vec<InventoryItem>,
    pub blocks_around: BlocksAround,
    pub stats: Vitals,
    pub biome: String,
    pub nearby_players: BTreeSet<String>,
    pub time: String,
    pub previous_command_result: String,
    pub goals: GoalThresholds,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    pub thresholds: GoalThresholds,
}

fn block_name(world: &dyn WorldApi, pos: BlockPos) -> String {
    world
        .block_at(pos)
        .map(|b| b.name)
        .unwrap_or_else(|| NO_BLOCK.to_string())
}

impl SnapshotBuilder {
    pub fn new(thresholds: GoalThresholds) -> Self {
        Self { thresholds }
    }

    pub fn build(&self, world: &dyn WorldApi, previous_command_result: String) -> Snapshot {
        let position = world.position();
        let here = BlockPos::floor(position);

        let blocks_around = BlocksAround {
            north: block_name(world, here.offset(0, 0, -1)),
            south: block_name(world, here.offset(0, 0, 1)),
            east: block_name(world, here.offset(1, 0, 0)),
            west: block_name(world, here.offset(-1, 0, 0)),
            up: block_name(world, here.offset(0, 1, 0)),
            down: block_name(world, here.offset(0, -1, 0)),
        };

        Snapshot {
            position,
            inventory: world.inventory(),
            blocks_around,
            stats: world.vitals(),
            biome: world
                .biome()
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_BIOME.to_string()),
            nearby_players: world.nearby_players().into_iter().collect(),
            time: chrono::Local::now().format("%H:%M:%S").to_string(),
            previous_command_result,
            goals: self.thresholds.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::FakeWorld;

    #[test]
    fn empty_world_uses_sentinels() {
        let world = FakeWorld::default();
        let snap = SnapshotBuilder::default().build(&world, "None".to_string());
        assert_eq!(snap.blocks_around.north, NO_BLOCK);
        assert_eq!(snap.blocks_around.down, NO_BLOCK);
        assert_eq!(snap.biome, UNKNOWN_BIOME);
        assert!(snap.nearby_players.is_empty());
        assert_eq!(snap.previous_command_result, "None");
        assert_eq!(snap.goals, GoalThresholds::default());
    }

    #[test]
    fn adjacency_uses_cardinal_offsets() {
        let world = FakeWorld::default();
        world.with_state(|w| {
            w.apply_position(Vec3 {
                x: 0.5,
                y: 64.0,
                z: 0.5,
            });
            w.set_block(BlockPos { x: 0, y: 64, z: -1 }, "stone");
            w.set_block(BlockPos { x: 1, y: 64, z: 0 }, "oak_log");
            w.set_block(BlockPos { x: 0, y: 63, z: 0 }, "grass_block");
            w.biome = Some("plains".to_string());
            w.players = vec!["steve".to_string(), "alex".to_string()];
        });

        let snap = SnapshotBuilder::default().build(&world, "ok".to_string());
        assert_eq!(snap.blocks_around.north, "stone");
        assert_eq!(snap.blocks_around.east, "oak_log");
        assert_eq!(snap.blocks_around.down, "grass_block");
        assert_eq!(snap.blocks_around.south, NO_BLOCK);
        assert_eq!(snap.biome, "plains");
        assert_eq!(
            snap.nearby_players.iter().cloned().collect::<Vec<_>>(),
            vec!["alex".to_string(), "steve".to_string()]
        );
    }

    #[test]
    fn snapshot_serializes_for_prompt() {
        let world = FakeWorld::default();
        let snap = SnapshotBuilder::default().build(&world, "None".to_string());
        let v = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["goals"]["dirt_required"], 128);
        assert_eq!(v["blocks_around"]["up"], "none");
    }
}
