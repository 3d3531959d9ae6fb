// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

use serde::{ Serialize, Deserialize };
use std::path::Path;

pub const METADATA_FILENAME: &str = "metadata.json";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: usize,
    pub height: usize,
}

/// Sidecar describing one produced video. Written once, after the container is finalized.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub video_path: String,
    pub frame_count: usize,
    pub fps: f64,
    pub resolution: Resolution,
    pub thumbnails: Vec<String>,
    pub undistort: bool,
    pub color_correct: bool,
    pub devignette: bool,
}

impl OutputRecord {
    pub fn to_json(&self) -> serde_json::Result<String> {
        // 4 space indent, like the files the downstream tools already parse
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }
}
