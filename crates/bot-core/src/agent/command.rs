use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::observation::Vec3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("{verb}: expected `{expected}`")]
    Pattern {
        verb: &'static str,
        expected: &'static str,
    },
    #[error("unknown direction: {0}")]
    UnknownDirection(String),
    #[error("{verb}: invalid position literal {literal}: {reason}")]
    InvalidPosition {
        verb: &'static str,
        literal: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" => Some(Direction::North),
            "south" => Some(Direction::South),
            "east" => Some(Direction::East),
            "west" => Some(Direction::West),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }

    /// Unit offset on the horizontal plane (north is -z).
    pub fn offset(self) -> (f64, f64) {
        match self {
            Direction::North => (0.0, -1.0),
            Direction::South => (0.0, 1.0),
            Direction::East => (1.0, 0.0),
            Direction::West => (-1.0, 0.0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Walk {
        direction: Direction,
        duration_secs: u32,
    },
    MineAt(Vec3),
    PlaceAt(Vec3),
    BuildHouseAt(Vec3),
    Attack(Vec3),
    Craft {
        item: String,
    },
    Explore(Vec3),
    Stop,
    Status,
    DigColumn,
    Pickup,
    ChopTree,
    ListOres,
    ReportSurroundings,
    CompleteOtherGoals,
    Unknown {
        raw: String,
    },
}

static WALK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^walk\s+(\w+)\s+for\s+(\d+)\s+seconds?\b").expect("walk pattern")
});
static MINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^mine\s+block\s+at\s+(\{.*\})").expect("mine pattern"));
static PLACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^place\s+block\s+at\s+(\{.*\})").expect("place pattern"));
static BUILD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^build\s+house\s+at\s+(\{.*\})").expect("build pattern")
});
static ATTACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^attack\s+entity\s+at\s+(\{.*\})").expect("attack pattern")
});
static CRAFT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^craft\s+item\s+(\w+)").expect("craft pattern"));
static EXPLORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^explore\s+to\s+(\{.*\})").expect("explore pattern"));
static BARE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([{,]\s*)([A-Za-z0-9_]+)\s*:").expect("bare key pattern"));

/// Rewrites a loosely formatted object literal (`{x:1, 'y': 2}`) into JSON.
pub fn normalize_object_literal(literal: &str) -> String {
    BARE_KEY_RE
        .replace_all(literal, "$1\"$2\":")
        .replace('\'', "\"")
}

/// Largest coordinate magnitude accepted in a position literal (the world border).
pub const MAX_COORDINATE: f64 = 3.0e7;

#[derive(Deserialize)]
struct PositionLiteral {
    x: f64,
    y: f64,
    z: f64,
}

/// Parses a position literal such as `{x:10, y:64, z:-3.5}`.
pub fn parse_position(literal: &str) -> Result<Vec3, String> {
    let json = normalize_object_literal(literal.trim());
    let lit: PositionLiteral = serde_json::from_str(&json).map_err(|e| e.to_string())?;
    if !(lit.x.is_finite() && lit.y.is_finite() && lit.z.is_finite()) {
        return Err("coordinates must be finite".to_string());
    }
    if [lit.x, lit.y, lit.z].iter().any(|c| c.abs() > MAX_COORDINATE) {
        return Err(format!("coordinates must be within ±{MAX_COORDINATE}"));
    }
    Ok(Vec3 {
        x: lit.x,
        y: lit.y,
        z: lit.z,
    })
}

/// Picks the command line out of a model reply: first non-empty line, stripped of quoting.
pub fn command_line(raw: &str) -> &str {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    line.trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim()
        .trim_end_matches('.')
        .trim()
}

fn starts_with_verb(line: &str, verb: &str) -> bool {
    line.len() >= verb.len()
        && line.is_char_boundary(verb.len())
        && line[..verb.len()].eq_ignore_ascii_case(verb)
        && !line[verb.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

fn position_arg(
    re: &Regex,
    line: &str,
    verb: &'static str,
    expected: &'static str,
) -> Result<Vec3, CommandParseError> {
    let caps = re
        .captures(line)
        .ok_or(CommandParseError::Pattern { verb, expected })?;
    let literal = &caps[1];
    parse_position(literal).map_err(|reason| CommandParseError::InvalidPosition {
        verb,
        literal: literal.to_string(),
        reason,
    })
}

/// Parses one line of model output into a [`Command`].
///
/// Unrecognised verbs become [`Command::Unknown`]; a recognised verb with a malformed
/// argument is an error so the caller can report it without touching the world.
pub fn parse_command(raw: &str) -> Result<Command, CommandParseError> {
    let line = command_line(raw);
    if line.is_empty() {
        return Err(CommandParseError::Empty);
    }

    // Multi-word verbs first so that a longer verb never loses to a shorter prefix.
    let zero_arg: [(&str, Command); 8] = [
        ("complete other goals", Command::CompleteOtherGoals),
        ("report surroundings", Command::ReportSurroundings),
        ("dig column", Command::DigColumn),
        ("chop tree", Command::ChopTree),
        ("list ores", Command::ListOres),
        ("pickup", Command::Pickup),
        ("status", Command::Status),
        ("stop", Command::Stop),
    ];

    if starts_with_verb(line, "build house") {
        let pos = position_arg(&BUILD_RE, line, "build house", "build house at {x,y,z}")?;
        return Ok(Command::BuildHouseAt(pos));
    }
    for (verb, cmd) in zero_arg {
        if starts_with_verb(line, verb) {
            return Ok(cmd);
        }
    }

    if starts_with_verb(line, "walk") {
        let caps = WALK_RE.captures(line).ok_or(CommandParseError::Pattern {
            verb: "walk",
            expected: "walk <direction> for <N> seconds",
        })?;
        let direction = Direction::parse(&caps[1])
            .ok_or_else(|| CommandParseError::UnknownDirection(caps[1].to_ascii_lowercase()))?;
        let duration_secs = caps[2].parse().map_err(|_| CommandParseError::Pattern {
            verb: "walk",
            expected: "walk <direction> for <N> seconds",
        })?;
        return Ok(Command::Walk {
            direction,
            duration_secs,
        });
    }
    if starts_with_verb(line, "mine") {
        let pos = position_arg(&MINE_RE, line, "mine", "mine block at {x,y,z}")?;
        return Ok(Command::MineAt(pos));
    }
    if starts_with_verb(line, "place") {
        let pos = position_arg(&PLACE_RE, line, "place", "place block at {x,y,z}")?;
        return Ok(Command::PlaceAt(pos));
    }
    if starts_with_verb(line, "attack") {
        let pos = position_arg(&ATTACK_RE, line, "attack", "attack entity at {x,y,z}")?;
        return Ok(Command::Attack(pos));
    }
    if starts_with_verb(line, "craft") {
        let caps = CRAFT_RE.captures(line).ok_or(CommandParseError::Pattern {
            verb: "craft",
            expected: "craft item <name>",
        })?;
        return Ok(Command::Craft {
            item: caps[1].to_string(),
        });
    }
    if starts_with_verb(line, "explore") {
        let pos = position_arg(&EXPLORE_RE, line, "explore", "explore to {x,y,z}")?;
        return Ok(Command::Explore(pos));
    }

    Ok(Command::Unknown {
        raw: line.to_string(),
    })
}
