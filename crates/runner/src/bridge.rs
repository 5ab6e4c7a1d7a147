//! Line-delimited JSON link to the external game bridge.
//!
//! Inbound lines are world updates (tagged by `type`) or `action_result` replies to dig and
//! place requests. Outbound lines are [`BridgeRequest`]s tagged by `op`. Reads served to the
//! agent come from a local [`WorldState`] cache, so they never wait on the network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use craft_bot_core::agent::game_api::{
    ActionFuture, Block, BlockPos, EntitySummary, NavGoal, WorldApi, WorldError,
};
use craft_bot_core::agent::observation::{InventoryItem, Vec3, Vitals};
use craft_bot_core::world::{WorldState, WorldUpdate};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeRequest {
    Dig {
        id: u64,
        pos: BlockPos,
    },
    Place {
        id: u64,
        reference: BlockPos,
        target: Vec3,
    },
    /// `goal: null` clears navigation.
    SetGoal {
        goal: Option<NavGoal>,
    },
    Attack {
        entity_id: u64,
    },
    Chat {
        message: String,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ActionResult {
    pub id: u64,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ActionResult {
    fn into_outcome(self) -> Result<(), WorldError> {
        if self.ok {
            return Ok(());
        }
        let msg = self.error.unwrap_or_else(|| "action failed".to_string());
        if msg.contains("Digging aborted") {
            Err(WorldError::DigAborted)
        } else {
            Err(WorldError::Rejected(msg))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Update(WorldUpdate),
    ActionResult(ActionResult),
}

pub fn decode_line(line: &str) -> anyhow::Result<Inbound> {
    let v: serde_json::Value = serde_json::from_str(line).context("invalid bridge json")?;
    if v.get("type").and_then(|t| t.as_str()) == Some("action_result") {
        let res = serde_json::from_value(v).context("decode action_result")?;
        return Ok(Inbound::ActionResult(res));
    }
    let update = serde_json::from_value(v).context("decode world update")?;
    Ok(Inbound::Update(update))
}

type Pending = HashMap<u64, oneshot::Sender<Result<(), WorldError>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// [`WorldApi`] backed by the bridge connection.
pub struct BridgeWorld {
    state: Arc<Mutex<WorldState>>,
    pending: Arc<Mutex<Pending>>,
    /// Set by the reader once the inbound stream ends; guarded by the `pending` lock.
    closed: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<BridgeRequest>,
    next_id: AtomicU64,
}

pub struct BridgeTasks {
    pub reader: JoinHandle<()>,
    pub writer: JoinHandle<()>,
}

impl BridgeTasks {
    pub fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }

    /// Stops reading and gives queued requests up to `grace` to reach the bridge.
    ///
    /// The writer only drains once every [`BridgeWorld`] handle has been dropped.
    pub async fn close(self, grace: Duration) {
        self.reader.abort();
        if tokio::time::timeout(grace, self.writer).await.is_err() {
            warn!("bridge.close.timeout");
        }
    }
}

impl BridgeWorld {
    pub async fn connect(addr: &str, timeout: Duration) -> anyhow::Result<(Arc<Self>, BridgeTasks)> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .with_context(|| format!("timed out connecting to bridge {addr}"))?
            .with_context(|| format!("connect bridge {addr}"))?;
        stream.set_nodelay(true).ok();
        info!(addr, "bridge.connected");
        let (read, write) = stream.into_split();
        Ok(Self::spawn(read, write))
    }

    pub fn spawn<R, W>(reader: R, writer: W) -> (Arc<Self>, BridgeTasks)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let world = Arc::new(Self {
            state: Arc::new(Mutex::new(WorldState::new())),
            pending: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
            outbound: tx,
            next_id: AtomicU64::new(1),
        });

        let tasks = BridgeTasks {
            reader: tokio::spawn(read_loop(
                reader,
                world.state.clone(),
                world.pending.clone(),
                world.closed.clone(),
            )),
            writer: tokio::spawn(write_loop(writer, rx)),
        };
        (world, tasks)
    }

    fn send(&self, req: BridgeRequest) -> bool {
        self.outbound.send(req).is_ok()
    }

    fn request_action(&self, make: impl FnOnce(u64) -> BridgeRequest) -> ActionFuture {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = lock(&self.pending);
            if self.closed.load(Ordering::Acquire) {
                return Box::pin(async { Err(WorldError::Disconnected) });
            }
            pending.insert(id, tx);
        }
        if !self.send(make(id)) {
            lock(&self.pending).remove(&id);
            return Box::pin(async { Err(WorldError::Disconnected) });
        }
        Box::pin(async move { rx.await.unwrap_or(Err(WorldError::Disconnected)) })
    }
}

impl WorldApi for BridgeWorld {
    fn position(&self) -> Vec3 {
        lock(&self.state).position
    }

    fn inventory(&self) -> Vec<InventoryItem> {
        lock(&self.state).inventory.clone()
    }

    fn vitals(&self) -> Vitals {
        lock(&self.state).vitals
    }

    fn block_at(&self, pos: BlockPos) -> Option<Block> {
        lock(&self.state).block(pos)
    }

    fn biome(&self) -> Option<String> {
        lock(&self.state).biome.clone()
    }

    fn nearby_players(&self) -> Vec<String> {
        lock(&self.state).players.clone()
    }

    fn entities(&self) -> Vec<EntitySummary> {
        lock(&self.state).entities.values().cloned().collect()
    }

    fn dig(&self, block: Block) -> ActionFuture {
        self.request_action(|id| BridgeRequest::Dig { id, pos: block.pos })
    }

    fn place_block(&self, reference: Block, target: Vec3) -> ActionFuture {
        self.request_action(|id| BridgeRequest::Place {
            id,
            reference: reference.pos,
            target,
        })
    }

    fn set_goal(&self, goal: Option<NavGoal>) {
        self.send(BridgeRequest::SetGoal { goal });
    }

    fn attack(&self, entity: &EntitySummary) -> Result<(), WorldError> {
        if self.send(BridgeRequest::Attack {
            entity_id: entity.id,
        }) {
            Ok(())
        } else {
            Err(WorldError::Disconnected)
        }
    }

    fn chat(&self, text: &str) {
        self.send(BridgeRequest::Chat {
            message: text.to_string(),
        });
    }
}

async fn read_loop<R>(
    reader: R,
    state: Arc<Mutex<WorldState>>,
    pending: Arc<Mutex<Pending>>,
    closed: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                warn!("bridge.disconnected");
                break;
            }
            Err(err) => {
                warn!(error = %err, "bridge.read.failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match decode_line(&line) {
            Ok(Inbound::Update(update)) => {
                if let WorldUpdate::Chat { from, message } = &update {
                    info!(from = %from, message = %message, "bridge.chat");
                }
                lock(&state).apply(update);
            }
            Ok(Inbound::ActionResult(res)) => {
                let id = res.id;
                match lock(&pending).remove(&id) {
                    Some(tx) => {
                        let _ = tx.send(res.into_outcome());
                    }
                    None => debug!(id, "bridge.action_result.unmatched"),
                }
            }
            Err(err) => warn!(error = %format!("{err:#}"), "bridge.decode.failed"),
        }
    }

    // Dropping the senders resolves every in-flight action as disconnected; later requests
    // see `closed` and fail without waiting for a reply nobody will read.
    let mut pending = lock(&pending);
    closed.store(true, Ordering::Release);
    pending.clear();
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<BridgeRequest>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        let mut line = match serde_json::to_string(&req) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "bridge.encode.failed");
                continue;
            }
        };
        line.push('\n');
        if let Err(err) = writer.write_all(line.as_bytes()).await {
            warn!(error = %err, "bridge.write.failed");
            break;
        }
        writer.flush().await.ok();
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !cond() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[test]
    fn requests_are_tagged_by_op() {
        let v = serde_json::to_value(BridgeRequest::SetGoal { goal: None }).unwrap();
        assert_eq!(v, serde_json::json!({"op": "set_goal", "goal": null}));

        let v = serde_json::to_value(BridgeRequest::Dig {
            id: 7,
            pos: BlockPos { x: 1, y: 2, z: 3 },
        })
        .unwrap();
        assert_eq!(v["op"], "dig");
        assert_eq!(v["pos"]["z"], 3);
    }

    #[test]
    fn decode_routes_action_results() {
        match decode_line(r#"{"type":"action_result","id":4,"ok":false,"error":"Digging aborted"}"#)
            .unwrap()
        {
            Inbound::ActionResult(res) => {
                assert_eq!(res.id, 4);
                assert_eq!(res.into_outcome(), Err(WorldError::DigAborted));
            }
            other => panic!("expected action result, got {other:?}"),
        }

        assert!(matches!(
            decode_line(r#"{"type":"vitals","health":20,"food":18}"#).unwrap(),
            Inbound::Update(WorldUpdate::Vitals { .. })
        ));
        assert!(decode_line(r#"{"type":"weather","rain":true}"#).is_err());
        assert!(decode_line("not json").is_err());
    }

    #[tokio::test]
    async fn updates_feed_the_local_cache() {
        let (bridge_side, agent_side) = duplex(4096);
        let (read, write) = tokio::io::split(agent_side);
        let (world, tasks) = BridgeWorld::spawn(read, write);
        let (_bridge_read, mut bridge_write) = tokio::io::split(bridge_side);

        bridge_write
            .write_all(
                b"{\"type\":\"position\",\"x\":1.5,\"y\":64,\"z\":-2}\n\
                  {\"type\":\"block\",\"pos\":{\"x\":1,\"y\":63,\"z\":-2},\"name\":\"grass_block\"}\n\
                  garbage\n\
                  {\"type\":\"biome\",\"name\":\"plains\"}\n",
            )
            .await
            .unwrap();

        let w = world.clone();
        wait_for(move || w.biome().is_some()).await;
        assert_eq!(world.position().x, 1.5);
        assert_eq!(
            world
                .block_at(BlockPos { x: 1, y: 63, z: -2 })
                .map(|b| b.name),
            Some("grass_block".to_string())
        );
        tasks.abort();
    }

    #[tokio::test]
    async fn dig_resolves_from_matching_action_result() {
        let (bridge_side, agent_side) = duplex(4096);
        let (read, write) = tokio::io::split(agent_side);
        let (world, tasks) = BridgeWorld::spawn(read, write);
        let (bridge_read, mut bridge_write) = tokio::io::split(bridge_side);
        let mut requests = BufReader::new(bridge_read).lines();

        let dig = world.dig(Block {
            name: "dirt".to_string(),
            pos: BlockPos { x: 0, y: 63, z: 0 },
        });
        let line = requests.next_line().await.unwrap().unwrap();
        let req: BridgeRequest = serde_json::from_str(&line).unwrap();
        let BridgeRequest::Dig { id, pos } = req.clone() else {
            panic!("expected dig, got {req:?}");
        };
        assert_eq!(pos, BlockPos { x: 0, y: 63, z: 0 });

        bridge_write
            .write_all(
                format!("{{\"type\":\"action_result\",\"id\":{id},\"ok\":false,\"error\":\"Digging aborted\"}}\n")
                    .as_bytes(),
            )
            .await
            .unwrap();
        assert_eq!(dig.await, Err(WorldError::DigAborted));
        tasks.abort();
    }

    #[tokio::test]
    async fn pending_actions_fail_when_bridge_closes() {
        let (bridge_side, agent_side) = duplex(4096);
        let (read, write) = tokio::io::split(agent_side);
        let (world, _tasks) = BridgeWorld::spawn(read, write);

        let place = world.place_block(
            Block {
                name: "stone".to_string(),
                pos: BlockPos { x: 0, y: 63, z: 0 },
            },
            Vec3 {
                x: 0.0,
                y: 64.0,
                z: 0.0,
            },
        );
        drop(bridge_side);
        assert_eq!(place.await, Err(WorldError::Disconnected));
    }

    #[tokio::test]
    async fn dig_after_inbound_eof_fails_fast() {
        // Inbound stream closed while the outbound side stays writable.
        let (inbound_peer, agent_in) = duplex(4096);
        let (_outbound_peer, agent_out) = duplex(4096);
        let (world, tasks) = BridgeWorld::spawn(agent_in, agent_out);
        drop(inbound_peer);
        wait_for(|| tasks.reader.is_finished()).await;

        let dig = world.dig(Block {
            name: "dirt".to_string(),
            pos: BlockPos { x: 0, y: 63, z: 0 },
        });
        let outcome = tokio::time::timeout(Duration::from_secs(2), dig).await;
        assert_eq!(outcome, Ok(Err(WorldError::Disconnected)));
        assert!(lock(&world.pending).is_empty());
        tasks.abort();
    }

    #[tokio::test]
    async fn fire_and_forget_requests_are_written_in_order() {
        let (bridge_side, agent_side) = duplex(4096);
        let (read, write) = tokio::io::split(agent_side);
        let (world, tasks) = BridgeWorld::spawn(read, write);
        let (bridge_read, _bridge_write) = tokio::io::split(bridge_side);
        let mut requests = BufReader::new(bridge_read).lines();

        world.chat("hello");
        world.set_goal(None);

        let first: BridgeRequest =
            serde_json::from_str(&requests.next_line().await.unwrap().unwrap()).unwrap();
        let second: BridgeRequest =
            serde_json::from_str(&requests.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(
            first,
            BridgeRequest::Chat {
                message: "hello".to_string()
            }
        );
        assert_eq!(second, BridgeRequest::SetGoal { goal: None });
        tasks.abort();
    }
}
