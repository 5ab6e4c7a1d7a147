use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use craft_bot_core::agent::harness::{DEFAULT_TICK_INTERVAL, HarnessConfig};
use craft_bot_core::agent::executor::DEFAULT_BUILD_DURATION;
use craft_bot_core::agent::goal::GoalThresholds;
use craft_bot_core::agent::memory::DEFAULT_SYSTEM_PROMPT;
use craft_bot_core::llm::ChatConfig;
use craft_bot_core::recorder::RecorderConfig;

use crate::config_loader::ConfigLoader;

pub const CONFIG_FILE: &str = "craft-bot.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    pub bridge: BridgeConfig,
    pub llm: ChatConfig,
    pub agent: AgentConfig,
    pub recorder: RecorderConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// `host:port` of the game bridge.
    pub addr: String,
    pub connect_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:7878".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub system_prompt: String,
    pub tick_ms: u64,
    pub build_duration_ms: u64,
    pub dirt_required: u32,
    pub wood_required: u32,
    pub max_ticks: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let goals = GoalThresholds::default();
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            tick_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            build_duration_ms: DEFAULT_BUILD_DURATION.as_millis() as u64,
            dirt_required: goals.dirt_required,
            wood_required: goals.wood_required,
            max_ticks: None,
        }
    }
}

impl AgentConfig {
    pub fn thresholds(&self) -> GoalThresholds {
        GoalThresholds {
            dirt_required: self.dirt_required,
            wood_required: self.wood_required,
        }
    }

    pub fn harness(&self) -> HarnessConfig {
        HarnessConfig {
            tick_interval: Duration::from_millis(self.tick_ms),
            max_ticks: self.max_ticks,
        }
    }

    pub fn build_duration(&self) -> Duration {
        Duration::from_millis(self.build_duration_ms)
    }
}

impl RunnerConfig {
    /// Config file (if any) plus environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg: Self = ConfigLoader::parse_optional(CONFIG_FILE)?.unwrap_or_default();
        cfg.apply_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        if let Some(v) = get("CRAFT_BOT_BRIDGE_ADDR") {
            self.bridge.addr = v;
        }
        if let Some(v) = get("CRAFT_BOT_LLM_ENDPOINT") {
            self.llm.endpoint = v;
        }
        if let Some(v) = get("CRAFT_BOT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("CRAFT_BOT_LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = get("CRAFT_BOT_SYSTEM_PROMPT") {
            self.agent.system_prompt = v;
        }
        if let Some(v) = get("CRAFT_BOT_TICK_MS") {
            match v.trim().parse() {
                Ok(ms) => self.agent.tick_ms = ms,
                Err(_) => warn!(value = %v, "config.tick_ms.invalid"),
            }
        }
        if let Some(v) = get("CRAFT_BOT_RECORDINGS_DIR") {
            self.recorder.dir = Some(PathBuf::from(v));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg: RunnerConfig = ConfigLoader::parse_from_string("").unwrap();
        assert_eq!(cfg, RunnerConfig::default());
        assert_eq!(cfg.agent.tick_ms, 2000);
        assert_eq!(cfg.llm.max_tokens, 700);
        assert!(cfg.recorder.dir.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let cfg: RunnerConfig = ConfigLoader::parse_from_string(
            r#"
[bridge]
addr = "10.0.0.5:9000"

[llm]
endpoint = "http://127.0.0.1:8080/v1"
model = "local"
temperature = 0.7

[agent]
tick_ms = 500
dirt_required = 16
wood_required = 8

[recorder]
dir = "recordings"
frames = 10
"#,
        )
        .unwrap();

        assert_eq!(cfg.bridge.addr, "10.0.0.5:9000");
        assert_eq!(cfg.bridge.connect_timeout_secs, 10);
        assert_eq!(cfg.llm.model, "local");
        assert_eq!(cfg.llm.top_p, 1.0);
        assert_eq!(cfg.agent.harness().tick_interval, Duration::from_millis(500));
        assert_eq!(
            cfg.agent.thresholds(),
            GoalThresholds {
                dirt_required: 16,
                wood_required: 8
            }
        );
        assert_eq!(cfg.agent.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(cfg.recorder.dir, Some(PathBuf::from("recordings")));
        assert_eq!(cfg.recorder.frame_interval_secs, 5);
    }

    #[test]
    fn unknown_types_are_rejected() {
        let err = ConfigLoader::parse_from_string::<RunnerConfig>("[agent]\ntick_ms = \"fast\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn environment_wins_over_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CRAFT_BOT_BRIDGE_ADDR", "bridge:1"),
            ("CRAFT_BOT_LLM_API_KEY", "secret"),
            ("CRAFT_BOT_TICK_MS", "250"),
            ("CRAFT_BOT_LLM_MODEL", "   "),
            ("CRAFT_BOT_RECORDINGS_DIR", "/tmp/rec"),
        ]);
        let mut cfg = RunnerConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.bridge.addr, "bridge:1");
        assert_eq!(cfg.llm.api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.agent.tick_ms, 250);
        assert_eq!(cfg.llm.model, ChatConfig::default().model);
        assert_eq!(cfg.recorder.dir, Some(PathBuf::from("/tmp/rec")));
    }

    #[test]
    fn bad_tick_override_is_ignored() {
        let mut cfg = RunnerConfig::default();
        cfg.apply_overrides(|k| (k == "CRAFT_BOT_TICK_MS").then(|| "soon".to_string()));
        assert_eq!(cfg.agent.tick_ms, 2000);
    }
}
