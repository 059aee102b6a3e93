//! CLI configuration management.
//!
//! Precedence, lowest first: built-in defaults, the JSON config file,
//! environment variables (including a `.env` file), then CLI flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use hyperforce_layout::{LayoutConfig, SimulationParams};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Environment variable that points at an alternative config file.
pub const CONFIG_PATH_VAR: &str = "HF_CONFIG";

/// Defaults for generated datasets and run length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunDefaults {
    pub nodes: u32,
    pub edges: u32,
    pub max_edge_size: u32,
    /// Upper bound on ticks; a run stops earlier once settled.
    pub ticks: u32,
    pub seed: u64,
    /// Log progress every this many ticks (0 = never).
    pub progress_interval: u32,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            nodes: 10_000,
            edges: 5_000,
            max_edge_size: 8,
            ticks: 1_000,
            seed: 42,
            progress_interval: 50,
        }
    }
}

/// Application-wide configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub simulation: SimulationParams,
    pub engine: LayoutConfig,
    pub run: RunDefaults,
}

impl Config {
    /// Load configuration from the config file and the environment.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if missing)
        let _ = dotenvy::dotenv();

        let path = Self::config_file_path();
        Self::load_from(path.as_deref(), |key| std::env::var(key).ok())
    }

    /// Load the config file alone, without environment overrides.
    ///
    /// Anything written back with `save` must start from this.
    pub fn load_file() -> Result<Self> {
        Self::load_from(Self::config_file_path().as_deref(), |_| None)
    }

    /// Load from an explicit file and environment lookup.
    pub fn load_from(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config from {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            _ => Self::default(),
        };

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(threads) = env("HF_THREADS") {
            self.engine.threads = threads
                .parse()
                .with_context(|| format!("HF_THREADS must be an integer, got {threads:?}"))?;
        }
        if let Some(theta) = env("HF_THETA") {
            self.simulation.theta = theta
                .parse()
                .with_context(|| format!("HF_THETA must be a number, got {theta:?}"))?;
        }
        if let Some(ticks) = env("HF_TICKS") {
            self.run.ticks = ticks
                .parse()
                .with_context(|| format!("HF_TICKS must be an integer, got {ticks:?}"))?;
        }
        if let Some(size) = env("HF_PARTITION_SIZE") {
            self.engine.sort_partition_size = size
                .parse()
                .with_context(|| format!("HF_PARTITION_SIZE must be an integer, got {size:?}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.simulation.validate().context("Invalid simulation settings")?;
        self.engine.validate().context("Invalid engine settings")?;
        if self.run.max_edge_size == 0 {
            anyhow::bail!("run.max_edge_size must be at least 1");
        }
        Ok(())
    }

    /// Save current configuration to the config file.
    pub fn save(&self) -> Result<()> {
        if let Some(config_path) = Self::config_file_path() {
            self.save_to(&config_path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;
        Ok(())
    }

    /// Get the path to the config file.
    pub fn config_file_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_VAR) {
            return Some(PathBuf::from(path));
        }
        ProjectDirs::from("dev", "hyperforce", "hf")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Look up a dotted key such as `simulation.theta`.
    pub fn get(&self, key: &str) -> Result<Value> {
        let tree = serde_json::to_value(self)?;
        tree.pointer(&pointer(key))
            .cloned()
            .with_context(|| format!("Unknown config key: {key}. Run `hf config show` for valid keys"))
    }

    /// Set a dotted key from its command-line text.
    ///
    /// The text is read as JSON when it parses (numbers, booleans, `null`)
    /// and as a plain string otherwise. The result must still validate.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<()> {
        let mut tree = serde_json::to_value(&*self)?;
        let slot = tree
            .pointer_mut(&pointer(key))
            .with_context(|| format!("Unknown config key: {key}. Run `hf config show` for valid keys"))?;
        if slot.is_object() {
            anyhow::bail!("{key} is a section; set one of its fields instead");
        }
        *slot = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

        let updated: Config = serde_json::from_value(tree)
            .with_context(|| format!("Invalid value for {key}: {raw}"))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

/// `simulation.repulsion-strength` -> `/simulation/repulsion_strength`
fn pointer(key: &str) -> String {
    key.split('.')
        .map(|part| format!("/{}", part.replace('-', "_")))
        .collect()
}
