//! Periodic recording of agent snapshots to disk, independent of the control loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::agent::game_api::WorldApi;
use crate::agent::memory::ResultRecord;
use crate::agent::observation::SnapshotBuilder;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RecorderConfig {
    /// Parent directory for `recording-<timestamp>` sessions. Recording is off when unset.
    pub dir: Option<PathBuf>,
    pub every_secs: u64,
    pub frames: u32,
    pub frame_interval_secs: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            dir: None,
            every_secs: 2 * 60 * 60,
            frames: 60,
            frame_interval_secs: 5,
        }
    }
}

pub struct StateRecorder {
    dir: PathBuf,
    every: Duration,
    frames: u32,
    frame_interval: Duration,
    world: Arc<dyn WorldApi>,
    result: ResultRecord,
    builder: SnapshotBuilder,
}

impl StateRecorder {
    /// `None` when the config has no output directory.
    pub fn from_config(
        cfg: &RecorderConfig,
        world: Arc<dyn WorldApi>,
        result: ResultRecord,
        builder: SnapshotBuilder,
    ) -> Option<Self> {
        let dir = cfg.dir.clone()?;
        Some(Self {
            dir,
            every: Duration::from_secs(cfg.every_secs.max(1)),
            frames: cfg.frames,
            frame_interval: Duration::from_secs(cfg.frame_interval_secs),
            world,
            result,
            builder,
        })
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        info!(dir = %self.dir.display(), every_secs = self.every.as_secs(), "recorder.start");
        let mut interval = tokio::time::interval_at(Instant::now() + self.every, self.every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.record_session().await {
                Ok(folder) => info!(folder = %folder.display(), "recorder.session.done"),
                Err(err) => warn!(error = %format!("{err:#}"), "recorder.session.failed"),
            }
        }
    }

    /// Writes one session of frames and returns its folder.
    pub async fn record_session(&self) -> anyhow::Result<PathBuf> {
        let stamp = chrono::Local::now().format("%Y-%m-%dT%H-%M-%S");
        let folder = self.dir.join(format!("recording-{stamp}"));
        tokio::fs::create_dir_all(&folder)
            .await
            .with_context(|| format!("failed to create {}", folder.display()))?;
        info!(folder = %folder.display(), frames = self.frames, "recorder.session.start");

        for n in 0..self.frames {
            self.write_frame(&folder, n).await?;
            if n + 1 < self.frames {
                tokio::time::sleep(self.frame_interval).await;
            }
        }
        Ok(folder)
    }

    async fn write_frame(&self, folder: &Path, n: u32) -> anyhow::Result<()> {
        let snapshot = self
            .builder
            .build(self.world.as_ref(), self.result.get());
        let body = serde_json::to_vec_pretty(&snapshot).context("snapshot encode failed")?;
        let path = folder.join(format!("frame-{n}.json"));
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }
}
