//! Cell configuration: scheduler tuning, arm geometry, gripper dwell, the
//! bin map, and centering limits. Loaded from a JSON file resolved via
//! `SORTCELL_CONFIG`, then `$XDG_CONFIG_HOME/sortcell/cell.json`, then
//! `./cell.json`; every field has a default so a missing file means a
//! default cell, not an error.

use std::collections::BTreeMap;
use std::time::Duration;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::scheduler::{SchedulerConfig, DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY};
use crate::types::{BinId, Pose};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellConfig {
    pub scheduler: SchedulerSettings,
    pub arm: ArmSettings,
    pub gripper: GripperSettings,
    pub workflow: WorkflowSettings,
    pub centering: CenteringSettings,
    /// Bin index → physical drop coordinates and label.
    pub bins: BTreeMap<u8, BinSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub poll_interval_ms: u64,
    pub queue_capacity: usize,
    /// Optional stall deadline for readiness waits; absent means wait
    /// forever.
    pub wait_deadline_ms: Option<u64>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            wait_deadline_ms: None,
        }
    }
}

impl SchedulerSettings {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            queue_capacity: self.queue_capacity,
            wait_deadline: self.wait_deadline_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmSettings {
    /// Park/detect pose the arm returns to between workflows.
    pub home: Pose,
    /// Travel height for approach and transport moves, millimetres.
    pub classify_height_mm: f64,
    /// Height the gripper descends to for the pick, millimetres.
    pub pick_height_mm: f64,
    /// Tool orientation used for gripping (yaw, pitch, roll degrees).
    pub grip_orientation: [f64; 3],
}

impl Default for ArmSettings {
    fn default() -> Self {
        Self {
            home: Pose::new(350.0, 720.0, 1630.0, 180.0, 0.0, 180.0),
            classify_height_mm: 330.0,
            pick_height_mm: 0.0,
            grip_orientation: [180.0, 0.0, 180.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GripperSettings {
    /// Dwell after each grip command; the gripper sends no completion
    /// signal.
    pub dwell_ms: u64,
}

impl Default for GripperSettings {
    fn default() -> Self {
        Self { dwell_ms: 2000 }
    }
}

impl GripperSettings {
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Delay between the arm arriving home and the gate reopening, letting
    /// the physical scene settle before the next detection is accepted.
    pub settle_ms: u64,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self { settle_ms: 1000 }
    }
}

impl WorkflowSettings {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CenteringSettings {
    /// Attempt budget for the centering loop before admission is aborted.
    pub max_attempts: u32,
}

impl Default for CenteringSettings {
    fn default() -> Self {
        Self { max_attempts: 10 }
    }
}

/// One destination bin: label plus physical drop coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinSlot {
    pub label: String,
    pub x_mm: f64,
    pub y_mm: f64,
}

impl CellConfig {
    /// Look up a bin slot by classifier output.
    pub fn bin_slot(&self, bin: BinId) -> Option<&BinSlot> {
        self.bins.get(&bin.index())
    }

    /// Load from the resolved config path, or fall back to defaults when no
    /// file is present.
    pub fn load() -> anyhow::Result<Self> {
        match resolve_config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                info!("no config file found, using defaults");
                Ok(Self::default_cell())
            }
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| anyhow::anyhow!("could not read config {}: {}", path.display(), err))?;
        let mut config: CellConfig = serde_json::from_str(&raw)?;
        if config.bins.is_empty() {
            config.bins = default_bins();
        }
        info!(path = %path.display(), bins = config.bins.len(), "loaded cell config");
        Ok(config)
    }

    /// The built-in cell: lab geometry defaults, six bins sharing one drop
    /// point until the physical bin row is installed.
    pub fn default_cell() -> Self {
        Self {
            bins: default_bins(),
            ..Self::default()
        }
    }
}

fn default_bins() -> BTreeMap<u8, BinSlot> {
    let labels = ["metal", "misc", "plastic", "glass", "paper", "cardboard"];
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            (
                i as u8,
                BinSlot {
                    label: (*label).to_string(),
                    x_mm: 477.13,
                    y_mm: -404.0,
                },
            )
        })
        .collect()
}

/// Resolution order: explicit env var, XDG config dir, working directory.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(p) = env::var("SORTCELL_CONFIG") {
        return Some(PathBuf::from(p));
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg).join("sortcell").join("cell.json");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let candidate = PathBuf::from("cell.json");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_cell_geometry() {
        let config = CellConfig::default_cell();
        assert_eq!(config.arm.home.z, 1630.0);
        assert_eq!(config.arm.classify_height_mm, 330.0);
        assert_eq!(config.gripper.dwell_ms, 2000);
        assert_eq!(config.workflow.settle_ms, 1000);
        assert_eq!(config.scheduler.poll_interval_ms, 100);
        assert_eq!(config.bins.len(), 6);
        assert_eq!(config.bin_slot(BinId::new(2)).unwrap().label, "plastic");
    }

    #[test]
    fn test_unknown_bin_has_no_slot() {
        let config = CellConfig::default_cell();
        assert!(config.bin_slot(BinId::new(9)).is_none());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "gripper": {{ "dwell_ms": 500 }},
                "scheduler": {{ "wait_deadline_ms": 30000 }},
                "bins": {{
                    "0": {{ "label": "metal", "x_mm": 100.0, "y_mm": -50.0 }}
                }}
            }}"#
        )
        .unwrap();

        let config = CellConfig::load_from(file.path()).unwrap();
        assert_eq!(config.gripper.dwell_ms, 500);
        assert_eq!(config.scheduler.wait_deadline_ms, Some(30000));
        assert_eq!(config.bins.len(), 1);
        assert_eq!(config.bin_slot(BinId::new(0)).unwrap().x_mm, 100.0);
        // untouched sections keep their defaults
        assert_eq!(config.arm.pick_height_mm, 0.0);
        assert_eq!(config.workflow.settle_ms, 1000);
    }

    #[test]
    fn test_scheduler_settings_conversion() {
        let settings = SchedulerSettings {
            poll_interval_ms: 50,
            queue_capacity: 8,
            wait_deadline_ms: Some(1000),
        };
        let config = settings.to_scheduler_config();
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.wait_deadline, Some(Duration::from_millis(1000)));
    }
}
