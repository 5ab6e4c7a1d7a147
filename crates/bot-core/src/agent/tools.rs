use super::command::Command;

/// One line of the command menu shown to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuEntry {
    pub description: &'static str,
    pub example: &'static str,
}

pub const COMMAND_MENU: &[MenuEntry] = &[
    MenuEntry {
        description: "Walk",
        example: "walk north for 5 seconds",
    },
    MenuEntry {
        description: "Explore to a position using pathfinding",
        example: "explore to {x:20, y:64, z:-8}",
    },
    MenuEntry {
        description: "Mine blocks",
        example: "mine block at {x:10, y:64, z:15}",
    },
    MenuEntry {
        description: "Place a block",
        example: "place block at {x:10, y:65, z:15}",
    },
    MenuEntry {
        description: "Build a house",
        example: "build house at {x:11, y:64, z:15}",
    },
    MenuEntry {
        description: "Attack an entity",
        example: "attack entity at {x:12, y:64, z:15}",
    },
    MenuEntry {
        description: "Craft an item",
        example: "craft item sword",
    },
    MenuEntry {
        description: "Stop current movement",
        example: "stop",
    },
    MenuEntry {
        description: "Report status",
        example: "status",
    },
    MenuEntry {
        description: "Dig a column",
        example: "dig column",
    },
    MenuEntry {
        description: "Pick up items",
        example: "pickup",
    },
    MenuEntry {
        description: "Chop tree",
        example: "chop tree",
    },
    MenuEntry {
        description: "List nearby ores",
        example: "list ores",
    },
    MenuEntry {
        description: "Report surroundings",
        example: "report surroundings",
    },
    MenuEntry {
        description: "Mark other assigned tasks as done",
        example: "complete other goals",
    },
];

pub fn render_menu() -> String {
    COMMAND_MENU
        .iter()
        .map(|e| format!("- {} (e.g., \"{}\")", e.description, e.example))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stable verb name used in logs.
pub trait CommandMeta {
    fn verb(&self) -> &'static str;
}

impl CommandMeta for Command {
    fn verb(&self) -> &'static str {
        match self {
            Command::Walk { .. } => "walk",
            Command::MineAt(_) => "mine",
            Command::PlaceAt(_) => "place",
            Command::BuildHouseAt(_) => "build_house",
            Command::Attack(_) => "attack",
            Command::Craft { .. } => "craft",
            Command::Explore(_) => "explore",
            Command::Stop => "stop",
            Command::Status => "status",
            Command::DigColumn => "dig_column",
            Command::Pickup => "pickup",
            Command::ChopTree => "chop_tree",
            Command::ListOres => "list_ores",
            Command::ReportSurroundings => "report_surroundings",
            Command::CompleteOtherGoals => "complete_other_goals",
            Command::Unknown { .. } => "unknown",
        }
    }
}
