use serde::{Deserialize, Serialize};

use super::observation::{InventoryItem, Snapshot};

/// Inventory targets the agent has to reach before the loop may finish.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GoalThresholds {
    pub dirt_required: u32,
    pub wood_required: u32,
}

impl Default for GoalThresholds {
    fn default() -> Self {
        // Two stacks of dirt, one stack of wood.
        Self {
            dirt_required: 128,
            wood_required: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GoalTally {
    pub dirt: u64,
    pub wood: u64,
}

pub fn is_dirt(name: &str) -> bool {
    name == "dirt" || name == "minecraft:dirt"
}

pub fn is_wood(name: &str) -> bool {
    name.contains("log") || name.contains("wood")
}

pub fn tally(inventory: &[InventoryItem]) -> GoalTally {
    inventory.iter().fold(GoalTally::default(), |mut t, item| {
        if is_dirt(&item.name) {
            t.dirt += u64::from(item.count);
        }
        if is_wood(&item.name) {
            t.wood += u64::from(item.count);
        }
        t
    })
}

impl GoalTally {
    pub fn meets(&self, thresholds: &GoalThresholds) -> bool {
        self.dirt >= u64::from(thresholds.dirt_required)
            && self.wood >= u64::from(thresholds.wood_required)
    }
}

/// True once the snapshot's inventory satisfies its own goal thresholds.
///
/// Callers pass the snapshot taken at the start of the tick, so an inventory change caused
/// by this tick's command is only seen on the next tick.
pub fn goals_met(snapshot: &Snapshot) -> bool {
    tally(&snapshot.inventory).meets(&snapshot.goals)
}
