use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::{wlog_debug, Error, Result};

/// Engine tuning knobs, loaded from ~/.waypoint/waypoint.toml when present.
///
/// All fields have conservative defaults so the engine runs without any
/// on-disk configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum worker invocations in flight at once within a phase.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Total-budget threshold above which plans get a pre-emptive
    /// advisory review before freezing.
    #[serde(default = "default_high_cost_threshold")]
    pub high_cost_threshold: u64,
    /// Maximum number of rebalancing revisions the validator may apply.
    #[serde(default = "default_max_plan_revisions")]
    pub max_plan_revisions: u32,
    /// Invocation deadline per declared budget unit of worker cost.
    #[serde(default = "default_deadline_ms_per_cost_unit")]
    pub deadline_ms_per_cost_unit: u64,
    /// Ceiling on a plan's total budget once specialist groups are injected;
    /// lowest-priority groups are dropped until the plan fits under it.
    #[serde(default = "default_specialist_budget_ceiling")]
    pub specialist_budget_ceiling: u64,
}

fn default_max_concurrent() -> usize {
    4
}
fn default_high_cost_threshold() -> u64 {
    15_000
}
fn default_max_plan_revisions() -> u32 {
    2
}
fn default_deadline_ms_per_cost_unit() -> u64 {
    10
}
fn default_specialist_budget_ceiling() -> u64 {
    20_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            high_cost_threshold: default_high_cost_threshold(),
            max_plan_revisions: default_max_plan_revisions(),
            deadline_ms_per_cost_unit: default_deadline_ms_per_cost_unit(),
            specialist_budget_ceiling: default_specialist_budget_ceiling(),
        }
    }
}

impl EngineConfig {
    pub fn waypoint_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".waypoint"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::waypoint_dir()?.join("waypoint.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        wlog_debug!("EngineConfig::load path={}", path.display());
        if !path.exists() {
            wlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        wlog_debug!(
            "Config loaded: max_concurrent={}, high_cost_threshold={}",
            config.max_concurrent,
            config.high_cost_threshold
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::waypoint_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        wlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn ensure_dirs() -> Result<()> {
        let dir = Self::waypoint_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}
