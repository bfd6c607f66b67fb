use anyhow::{Context, Result};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::grid::fold::FoldPolicy;
use crate::model::meta::{CellPart, ScaleId};

/// Persisted view preferences. Best-effort: a missing or unreadable file
/// yields the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_scale")]
    pub scale: ScaleId,
    /// `None` means the scale's default precision.
    #[serde(default)]
    pub cell_part: Option<CellPart>,
    /// Scales whose boundary off-hour runs may auto-fold.
    #[serde(default = "default_fold_boundary_scales")]
    pub fold_boundary_scales: Vec<ScaleId>,
    /// Visible window size, in scale units.
    #[serde(default = "default_window_units")]
    pub window_units: u32,
    #[serde(default = "default_true")]
    pub grouping_enabled: bool,
    #[serde(default)]
    pub focus_date: Option<NaiveDate>,
}

fn default_scale() -> ScaleId {
    ScaleId::Week
}

fn default_fold_boundary_scales() -> Vec<ScaleId> {
    vec![ScaleId::Week]
}

fn default_window_units() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            cell_part: None,
            fold_boundary_scales: default_fold_boundary_scales(),
            window_units: default_window_units(),
            grouping_enabled: true,
            focus_date: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path().context("Could not determine config directory")?;
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().context("Could not determine config directory")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "planboard")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn cell_part_for(&self, scale: ScaleId) -> CellPart {
        let preferred = self.cell_part.unwrap_or(scale.config().default_cell_part);
        if scale.config().allowed_parts.contains(&preferred) {
            preferred
        } else {
            scale.config().default_cell_part
        }
    }

    pub fn fold_policy(&self, scale: ScaleId) -> FoldPolicy {
        FoldPolicy {
            fold_boundary_runs: self.fold_boundary_scales.contains(&scale),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.scale, ScaleId::Week);
        assert!(config.fold_policy(ScaleId::Week).fold_boundary_runs);
        assert!(!config.fold_policy(ScaleId::Month).fold_boundary_runs);
    }

    #[test]
    fn test_cell_part_falls_back_per_scale() {
        let config = Config {
            cell_part: Some(CellPart::Quarter),
            ..Config::default()
        };
        assert_eq!(config.cell_part_for(ScaleId::Day), CellPart::Quarter);
        // Quarter precision is not offered at Year scale.
        assert_eq!(config.cell_part_for(ScaleId::Year), CellPart::Full);
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = Config {
            scale: ScaleId::Month,
            cell_part: Some(CellPart::Half),
            focus_date: NaiveDate::from_ymd_opt(2024, 6, 10),
            ..Config::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&text).unwrap();
        assert_eq!(back.scale, ScaleId::Month);
        assert_eq!(back.cell_part, Some(CellPart::Half));
        assert_eq!(back.focus_date, config.focus_date);
    }
}
