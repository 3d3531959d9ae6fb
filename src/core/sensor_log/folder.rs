// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2021-2022 Adrian <adrian.eddy at gmail>

use serde::Deserialize;
use std::path::{ Path, PathBuf };
use walkdir::WalkDir;

use super::{ SensorLog, SensorLogError, StreamId };
use crate::calibration::CameraCalibration;
use crate::frame::{ Frame, PixelFormat };

#[derive(Deserialize, Default)]
#[serde(default)]
struct DeviceCalibration {
    cameras: Vec<CameraCalibration>,
}

#[derive(Deserialize)]
struct StreamEntry {
    label: String,
    frames_dir: PathBuf,
}

#[derive(Deserialize)]
struct Manifest {
    #[serde(default)]
    device_calibration: DeviceCalibration,
    streams: Vec<StreamEntry>,
}

struct Stream {
    label: String,
    frames: Vec<PathBuf>,
}

/// Sensor log stored as a JSON manifest next to per-stream folders of PNG frames.
///
/// ```json
/// {
///   "device_calibration": { "cameras": [ { "label": "camera-slam-left", "model": "Fisheye624", "projection_params": [...], "image_size": [640, 480] } ] },
///   "streams": [ { "label": "camera-slam-left", "frames_dir": "slam-left" } ]
/// }
/// ```
pub struct FolderSensorLog {
    path: PathBuf,
    name: String,
    cameras: Vec<CameraCalibration>,
    streams: Vec<Stream>,
}

pub fn recording_name(path: &Path, suffix: &str) -> String {
    let filename = path.file_name().map(|x| x.to_string_lossy().to_string()).unwrap_or_default();
    if let Some(name) = filename.strip_suffix(suffix).filter(|x| !x.is_empty()) {
        return name.to_string();
    }
    path.file_stem().map(|x| x.to_string_lossy().to_string()).unwrap_or(filename)
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, SensorLogError> {
    if !dir.is_dir() {
        return Err(SensorLogError::InvalidManifest(format!("{} is not a directory", dir.display())));
    }
    let mut frames = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| SensorLogError::Io(e.into()))?;
        let is_png = entry.path().extension().map(|x| x.eq_ignore_ascii_case("png")).unwrap_or_default();
        if entry.file_type().is_file() && is_png {
            frames.push(entry.into_path());
        }
    }
    frames.sort_by(|a, b| human_sort::compare(&a.to_string_lossy(), &b.to_string_lossy()));
    Ok(frames)
}

impl FolderSensorLog {
    pub fn open(path: &Path, suffix: &str) -> Result<Self, SensorLogError> {
        let manifest: Manifest = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        for cam in &manifest.device_calibration.cameras {
            cam.validate().map_err(|e| SensorLogError::InvalidManifest(format!("camera {}: {e}", cam.label)))?;
        }

        let mut streams = Vec::with_capacity(manifest.streams.len());
        for s in manifest.streams {
            let frames = list_frames(&base.join(&s.frames_dir))?;
            log::debug!("{}: stream {} has {} frames", path.display(), s.label, frames.len());
            streams.push(Stream { label: s.label, frames });
        }

        Ok(Self {
            path: path.to_path_buf(),
            name: recording_name(path, suffix),
            cameras: manifest.device_calibration.cameras,
            streams,
        })
    }

    fn stream(&self, stream: StreamId) -> Result<&Stream, SensorLogError> {
        self.streams.get(stream.0).ok_or(SensorLogError::StreamOutOfRange(stream))
    }
}

impl SensorLog for FolderSensorLog {
    fn path(&self) -> &Path { &self.path }
    fn name(&self) -> &str { &self.name }

    fn stream_id(&self, label: &str) -> Option<StreamId> {
        self.streams.iter().position(|x| x.label == label).map(StreamId)
    }
    fn frame_count(&self, stream: StreamId) -> usize {
        self.streams.get(stream.0).map(|x| x.frames.len()).unwrap_or_default()
    }

    fn camera_calibration(&self, label: &str) -> Option<CameraCalibration> {
        self.cameras.iter().find(|x| x.label == label).cloned()
    }

    fn read_frame(&self, stream: StreamId, index: usize) -> Result<Frame, SensorLogError> {
        let s = self.stream(stream)?;
        let path = s.frames.get(index).ok_or(SensorLogError::FrameOutOfRange { index, count: s.frames.len() })?;
        let img = image::ImageReader::open(path)?.with_guessed_format()?.decode()?;

        let (w, h) = (img.width() as usize, img.height() as usize);
        let frame = if img.color().has_color() {
            Frame::from_raw(index, w, h, PixelFormat::Rgb8, img.into_rgb8().into_raw())
        } else {
            Frame::from_raw(index, w, h, PixelFormat::Gray8, img.into_luma8().into_raw())
        };
        frame.ok_or_else(|| SensorLogError::InvalidManifest(format!("{} has an unexpected buffer size", path.display())))
    }
}
