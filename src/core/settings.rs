// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2024 Adrian <adrian.eddy at gmail>

use serde::{ Serialize, Deserialize };
use std::path::{ Path, PathBuf };

pub const DEFAULT_STREAM_PRIORITY: [&str; 4] = ["camera-rgb", "camera-slam-left", "camera-slam-right", "camera-eyetracking"];

/// The three per-run correction toggles. Fixed for a whole run and applied to every recording.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct CorrectionConfig {
    pub undistort: bool,
    pub color_correct: bool,
    pub devignette: bool,
}
impl Default for CorrectionConfig {
    fn default() -> Self { Self { undistort: true, color_correct: true, devignette: true } }
}
impl CorrectionConfig {
    /// Folder name that keeps distinct configurations apart on disk.
    pub fn folder_name(&self) -> String {
        format!("undistort_{}_colorcorrect_{}_devignette_{}", self.undistort, self.color_correct, self.devignette)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ExtractionSettings {
    #[serde(flatten)]
    pub corrections: CorrectionConfig,

    pub devignetting_mask_folder: Option<PathBuf>,

    pub target_width: usize,
    pub target_height: usize,
    pub target_focal: f64,

    /// Frame timestamps aren't carried over from the log, the container runs at this constant rate.
    pub fps: f64,

    pub stream_priority: Vec<String>,
    pub recording_suffix: String,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            corrections: CorrectionConfig::default(),
            devignetting_mask_folder: None,
            target_width: 512,
            target_height: 512,
            target_focal: 150.0,
            fps: 30.0,
            stream_priority: DEFAULT_STREAM_PRIORITY.iter().map(|x| x.to_string()).collect(),
            recording_suffix: ".recording.json".into(),
        }
    }
}

impl ExtractionSettings {
    /// Defaults overlaid with a JSON preset, keys missing in the preset keep their default.
    pub fn from_preset(preset: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut merged = serde_json::to_value(Self::default())?;
        crate::util::merge_json(&mut merged, preset);
        serde_json::from_value(merged)
    }

    pub fn load_preset(path: &Path) -> Result<Self, serde_json::Error> {
        let data = std::fs::read_to_string(path).map_err(serde_json::Error::io)?;
        Self::from_preset(&serde_json::from_str(&data)?)
    }

    pub fn output_root(&self, base: &Path) -> PathBuf {
        base.join(self.corrections.folder_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_name_embeds_all_toggles() {
        let c = CorrectionConfig { undistort: true, color_correct: false, devignette: true };
        assert_eq!(c.folder_name(), "undistort_true_colorcorrect_false_devignette_true");
        assert_ne!(c.folder_name(), CorrectionConfig::default().folder_name());
    }

    #[test]
    fn preset_overrides_only_given_keys() {
        let s = ExtractionSettings::from_preset(&serde_json::json!({ "devignette": false, "target_width": 256 })).unwrap();
        assert!(!s.corrections.devignette);
        assert!(s.corrections.undistort);
        assert_eq!(s.target_width, 256);
        assert_eq!(s.target_height, 512);
        assert_eq!(s.stream_priority[0], "camera-rgb");
    }

    #[test]
    fn preset_stream_priority_is_replaced() {
        // arrays are replaced, not appended, so a preset can narrow the candidate list
        let s = ExtractionSettings::from_preset(&serde_json::json!({ "stream_priority": ["camera-slam-right"] })).unwrap();
        assert_eq!(s.stream_priority, vec!["camera-slam-right".to_string()]);
    }
}
