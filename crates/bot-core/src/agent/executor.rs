use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::command::{Command, CommandParseError, Direction};
use super::game_api::{ActionFuture, Block, BlockPos, EntityKind, NavGoal, WorldApi, WorldError};
use super::goal::is_wood;
use super::memory::{ProgressHandle, ResultRecord};
use super::observation::{UNKNOWN_BIOME, Vec3};
use super::tools::CommandMeta;

/// Entities further than this on any axis from the requested point are ignored.
pub const ATTACK_RADIUS: f64 = 5.0;
pub const TREE_SEARCH_DISTANCE: f64 = 6.0;
pub const ORE_SCAN_RADIUS: i64 = 5;
pub const PICKUP_RANGE: f64 = 1.0;
pub const DEFAULT_BUILD_DURATION: Duration = Duration::from_secs(5);

type Completion = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

enum Dispatch {
    Done(String),
    /// Immediate result, plus work whose outcome overwrites the record when it lands.
    Background(String, Completion),
}

/// Runs parsed commands against the world and owns the background work they start.
pub struct Executor {
    world: Arc<dyn WorldApi>,
    result: ResultRecord,
    progress: ProgressHandle,
    background: JoinSet<()>,
    pub build_duration: Duration,
}

impl Executor {
    pub fn new(world: Arc<dyn WorldApi>) -> Self {
        Self {
            world,
            result: ResultRecord::default(),
            progress: ProgressHandle::default(),
            background: JoinSet::new(),
            build_duration: DEFAULT_BUILD_DURATION,
        }
    }

    pub fn world(&self) -> &Arc<dyn WorldApi> {
        &self.world
    }

    pub fn result_record(&self) -> &ResultRecord {
        &self.result
    }

    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }

    #[cfg(test)]
    pub(crate) fn pending_background(&self) -> usize {
        self.background.len()
    }

    /// Executes one command and returns the text written to the result record.
    pub fn execute(&mut self, command: &Command) -> String {
        debug!(verb = command.verb(), "agent.command.start");
        match self.dispatch(command) {
            Dispatch::Done(text) => {
                self.result.set(text.clone());
                info!(verb = command.verb(), result = %text, "agent.command");
                text
            }
            Dispatch::Background(text, completion) => {
                // Write before spawning so a fast completion is never overwritten.
                self.result.set(text.clone());
                self.background.spawn(completion);
                info!(
                    verb = command.verb(),
                    result = %text,
                    pending = self.background.len(),
                    "agent.command.background"
                );
                text
            }
        }
    }

    pub fn record_parse_failure(&self, err: &CommandParseError) -> String {
        let text = format!("Failed to parse command: {err}");
        warn!(error = %err, "agent.command.parse_failed");
        self.result.set(text.clone());
        text
    }

    /// Collects finished background tasks; returns how many were reaped.
    pub fn reap_finished(&mut self) -> usize {
        let mut reaped = 0;
        while let Some(res) = self.background.try_join_next() {
            reaped += 1;
            if let Err(err) = res
                && err.is_panic()
            {
                error!(error = %err, "agent.background.panicked");
            }
        }
        reaped
    }

    /// Cancels outstanding background work and clears navigation.
    pub fn shutdown(&mut self) {
        let pending = self.background.len();
        self.background.abort_all();
        self.world.set_goal(None);
        info!(aborted = pending, "agent.executor.shutdown");
    }

    fn dispatch(&self, command: &Command) -> Dispatch {
        match command {
            Command::Walk {
                direction,
                duration_secs,
            } => Dispatch::Done(self.walk(*direction, *duration_secs)),
            Command::Explore(pos) => {
                self.world.set_goal(Some(NavGoal::Block {
                    pos: BlockPos::floor(*pos),
                }));
                Dispatch::Done(format!("Exploring towards {pos}."))
            }
            Command::MineAt(pos) => match self.world.block_at(BlockPos::floor(*pos)) {
                Some(block) => {
                    let text = format!("Mining {} at {pos}.", block.name);
                    let dig = self.world.dig(block);
                    Dispatch::Background(
                        text,
                        self.report_completion(dig, "Block mined successfully.", "Error mining block"),
                    )
                }
                None => Dispatch::Done(format!("No block found at position {pos}.")),
            },
            Command::PlaceAt(pos) => {
                let below = BlockPos::floor(*pos).offset(0, -1, 0);
                match self.world.block_at(below) {
                    Some(reference) => {
                        let text = format!("Placing block at {pos} on top of {}.", reference.name);
                        let place = self.world.place_block(reference, *pos);
                        Dispatch::Background(
                            text,
                            self.report_completion(
                                place,
                                "Block placed successfully.",
                                "Error placing block",
                            ),
                        )
                    }
                    None => Dispatch::Done(format!("No reference block found below {pos}.")),
                }
            }
            Command::BuildHouseAt(pos) => {
                let pos = *pos;
                let delay = self.build_duration;
                let progress = self.progress.clone();
                let result = self.result.clone();
                Dispatch::Background(
                    format!("Building a house at {pos}..."),
                    Box::pin(async move {
                        tokio::time::sleep(delay).await;
                        let total = progress.record_house_built();
                        let text = format!("House built at {pos}. Total houses built: {total}");
                        info!(houses_built = total, "agent.house.built");
                        result.set(text);
                    }),
                )
            }
            Command::Attack(pos) => Dispatch::Done(self.attack(*pos)),
            Command::Craft { item } => {
                self.world.chat(&format!("Crafting {item}... (simulation)"));
                Dispatch::Done(format!("Attempting to craft item: {item} (simulation)"))
            }
            Command::Stop => {
                self.world.set_goal(None);
                Dispatch::Done("Pathfinding stopped.".to_string())
            }
            Command::Status => {
                let vitals = self.world.vitals();
                let text = format!(
                    "Status: Health={}, Food={}, Position={}, Biome={}, Nearby players={}",
                    vitals.health,
                    vitals.food,
                    self.world.position(),
                    self.biome(),
                    self.players_list()
                );
                self.world.chat(&text);
                Dispatch::Done(text)
            }
            Command::ReportSurroundings => {
                let text = format!(
                    "Current biome: {}. Nearby players: {}. Position: {}",
                    self.biome(),
                    self.players_list(),
                    self.world.position()
                );
                self.world.chat(&text);
                Dispatch::Done(text)
            }
            Command::DigColumn => self.dig_column(),
            Command::Pickup => Dispatch::Done(self.pickup()),
            Command::ChopTree => self.chop_tree(),
            Command::ListOres => Dispatch::Done(self.list_ores()),
            Command::CompleteOtherGoals => {
                self.progress.mark_other_goals_completed();
                Dispatch::Done("Other goals have been marked as completed.".to_string())
            }
            Command::Unknown { raw } => {
                debug!(raw = %raw, "agent.command.unknown");
                Dispatch::Done("Unknown command executed.".to_string())
            }
        }
    }

    fn walk(&self, direction: Direction, duration_secs: u32) -> String {
        // Duration doubles as a distance in blocks.
        let (dx, dz) = direction.offset();
        let dist = f64::from(duration_secs);
        let target = self.world.position().offset(dx * dist, 0.0, dz * dist);
        self.world.set_goal(Some(NavGoal::Block {
            pos: BlockPos::floor(target),
        }));
        format!(
            "Walking {direction} for {duration_secs} seconds (target: {:.2}, {:.2}, {:.2}).",
            target.x, target.y, target.z
        )
    }

    fn attack(&self, pos: Vec3) -> String {
        let target = self
            .world
            .entities()
            .into_iter()
            .filter(|e| {
                (e.pos.x - pos.x).abs() < ATTACK_RADIUS
                    && (e.pos.y - pos.y).abs() < ATTACK_RADIUS
                    && (e.pos.z - pos.z).abs() < ATTACK_RADIUS
            })
            .min_by(|a, b| a.pos.dist_sq(&pos).total_cmp(&b.pos.dist_sq(&pos)));

        let Some(target) = target else {
            return "No entity found near the given position to attack.".to_string();
        };
        match self.world.attack(&target) {
            Ok(()) => format!("Attacking entity {} at {}", target.name, target.pos),
            Err(err) => format!("Error attacking entity {}: {err}", target.name),
        }
    }

    fn dig_column(&self) -> Dispatch {
        let below = BlockPos::floor(self.world.position()).offset(0, -1, 0);
        let Some(block) = self.world.block_at(below) else {
            return Dispatch::Done("No block to dig for column.".to_string());
        };
        let text = format!("Digging column through {}.", block.name);
        let dig = self.world.dig(block);
        let result = self.result.clone();
        Dispatch::Background(
            text,
            Box::pin(async move {
                let text = match dig.await {
                    Ok(()) => "Dug column block successfully.".to_string(),
                    Err(WorldError::DigAborted) => {
                        warn!("agent.dig_column.aborted");
                        "Digging aborted.".to_string()
                    }
                    Err(err) => format!("Error digging column: {err}"),
                };
                result.set(text);
            }),
        )
    }

    fn pickup(&self) -> String {
        let here = self.world.position();
        let nearest = self
            .world
            .entities()
            .into_iter()
            .filter(|e| e.kind == EntityKind::Item)
            .min_by(|a, b| a.pos.dist_sq(&here).total_cmp(&b.pos.dist_sq(&here)));
        match nearest {
            Some(item) => {
                self.world.set_goal(Some(NavGoal::Near {
                    pos: item.pos,
                    range: PICKUP_RANGE,
                }));
                "Moving to pick up item.".to_string()
            }
            None => "No items nearby to pick up.".to_string(),
        }
    }

    fn chop_tree(&self) -> Dispatch {
        let here = self.world.position();
        let radius = TREE_SEARCH_DISTANCE.ceil() as i64;
        let max_sq = TREE_SEARCH_DISTANCE * TREE_SEARCH_DISTANCE;
        let nearest = scan_cube(self.world.as_ref(), BlockPos::floor(here), radius)
            .into_iter()
            .filter(|b| is_wood(&b.name))
            .map(|b| (b.pos.to_vec3().dist_sq(&here), b))
            .filter(|(d, _)| *d <= max_sq)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, b)| b);

        let Some(block) = nearest else {
            return Dispatch::Done("No wood block found nearby to chop.".to_string());
        };
        let text = format!("Chopping {} at {}.", block.name, block.pos.to_vec3());
        let dig = self.world.dig(block);
        Dispatch::Background(
            text,
            self.report_completion(dig, "Tree block chopped successfully.", "Error chopping tree"),
        )
    }

    fn list_ores(&self) -> String {
        let ores: Vec<Block> = scan_cube(
            self.world.as_ref(),
            BlockPos::floor(self.world.position()),
            ORE_SCAN_RADIUS,
        )
        .into_iter()
        .filter(|b| b.name.contains("ore"))
        .collect();

        if ores.is_empty() {
            return "No ores found nearby.".to_string();
        }
        let listing = serde_json::to_string(&ores).unwrap_or_else(|_| format!("{ores:?}"));
        format!("Found ores: {listing}")
    }

    fn biome(&self) -> String {
        self.world
            .biome()
            .unwrap_or_else(|| UNKNOWN_BIOME.to_string())
    }

    fn players_list(&self) -> String {
        let players = self.world.nearby_players();
        if players.is_empty() {
            "None".to_string()
        } else {
            players.join(", ")
        }
    }

    fn report_completion(
        &self,
        action: ActionFuture,
        success: &'static str,
        failure_prefix: &'static str,
    ) -> Completion {
        let result = self.result.clone();
        Box::pin(async move {
            match action.await {
                Ok(()) => {
                    info!(result = success, "agent.action.completed");
                    result.set(success);
                }
                Err(err) => {
                    warn!(error = %err, "agent.action.failed");
                    result.set(format!("{failure_prefix}: {err}"));
                }
            }
        })
    }
}

/// Every known block in the cube of `radius` around `center`, in scan order.
fn scan_cube(world: &dyn WorldApi, center: BlockPos, radius: i64) -> Vec<Block> {
    let mut found = Vec::new();
    for dx in -radius..=radius {
        for dy in -radius..=radius {
            for dz in -radius..=radius {
                if let Some(block) = world.block_at(center.offset(dx, dy, dz)) {
                    found.push(block);
                }
            }
        }
    }
    found
}
