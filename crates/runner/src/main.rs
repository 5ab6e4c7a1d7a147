mod bridge;
mod config;
mod config_loader;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use craft_bot_core::agent::AgentLoop;
use craft_bot_core::agent::game_api::WorldApi;
use craft_bot_core::llm::ChatClient;
use craft_bot_core::recorder::StateRecorder;

use crate::bridge::BridgeWorld;
use crate::config::RunnerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = RunnerConfig::load().context("load runner config")?;
    info!(
        bridge = %cfg.bridge.addr,
        endpoint = %cfg.llm.endpoint,
        model = %cfg.llm.model,
        tick_ms = cfg.agent.tick_ms,
        "runner.start"
    );

    let (bridge, bridge_tasks) = BridgeWorld::connect(
        &cfg.bridge.addr,
        Duration::from_secs(cfg.bridge.connect_timeout_secs),
    )
    .await?;
    let world: Arc<dyn WorldApi> = bridge;
    let llm = ChatClient::new(cfg.llm.clone()).context("build inference client")?;

    let mut agent = AgentLoop::new(cfg.agent.system_prompt.clone(), world.clone())
        .with_thresholds(cfg.agent.thresholds());
    agent.executor.build_duration = cfg.agent.build_duration();

    let recorder = StateRecorder::from_config(
        &cfg.recorder,
        world,
        agent.executor.result_record().clone(),
        agent.snapshot_builder.clone(),
    )
    .map(StateRecorder::spawn);

    let exit = agent.run(&llm, &cfg.agent.harness()).await;

    if let Some(handle) = recorder {
        handle.abort();
        let _ = handle.await;
    }
    drop(agent);
    bridge_tasks.close(Duration::from_secs(1)).await;
    info!(
        reason = ?exit.reason,
        ticks = exit.ticks,
        houses_built = exit.progress.houses_built,
        "runner.exit"
    );
    Ok(())
}
