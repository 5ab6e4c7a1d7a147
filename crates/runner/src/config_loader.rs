use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;

pub const CONFIG_DIR_ENV: &str = "CRAFT_BOT_CONFIG_DIR";

/// TOML config lookup for the runner.
///
/// The first directory holding the file wins: `$CRAFT_BOT_CONFIG_DIR`, the working directory,
/// then the repository's `config/`. Finding no file is not an error; the runner then starts
/// from built-in defaults plus environment overrides.
pub struct ConfigLoader;

impl ConfigLoader {
    /// `Ok(None)` when no candidate file exists; parse errors are still errors.
    pub fn parse_optional<T: DeserializeOwned>(relative_path: &str) -> anyhow::Result<Option<T>> {
        Self::resolve_path(relative_path)
            .map(|path| Self::parse_from_path(&path))
            .transpose()
    }

    pub fn parse_from_path<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        Self::parse_from_string(&text)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    pub fn parse_from_string<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
        toml::from_str(text).with_context(|| "Failed to parse TOML")
    }

    pub fn resolve_path(relative_path: &str) -> Option<PathBuf> {
        search_dirs()
            .into_iter()
            .map(|dir| dir.join(relative_path))
            .find(|candidate| candidate.is_file())
    }
}

fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::with_capacity(3);
    if let Some(root) = env::var_os(CONFIG_DIR_ENV) {
        dirs.push(PathBuf::from(root));
    }
    if let Ok(cwd) = env::current_dir() {
        dirs.push(cwd);
    }
    // <repo_root>/crates/runner
    if let Some(root) = Path::new(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2) {
        dirs.push(root.join("config"));
    }
    dirs
}
