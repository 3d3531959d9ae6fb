// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

use std::path::{ Path, PathBuf };

use crate::frame::{ Frame, PixelFormat };
use crate::sensor_log::{ SensorLog, SensorLogError, StreamId };

const MIN_MASK_VALUE: f32 = 1e-3;

/// Per-pixel vignetting falloff of one camera, stored as gains (1 / normalized mask).
#[derive(Debug, Clone)]
pub struct DevignettingMask {
    width: usize,
    height: usize,
    gains: Vec<f32>,
}

impl DevignettingMask {
    pub fn from_values(width: usize, height: usize, values: &[f32]) -> Option<Self> {
        if values.len() != width * height || values.is_empty() { return None; }
        let max = values.iter().copied().fold(0.0f32, f32::max);
        if max <= 0.0 { return None; }
        let gains = values.iter().map(|v| max / v.max(max * MIN_MASK_VALUE)).collect();
        Some(Self { width, height, gains })
    }

    pub fn load(path: &Path) -> Result<Self, SensorLogError> {
        let img = image::ImageReader::open(path)?.with_guessed_format()?.decode()?.into_luma16();
        let (w, h) = (img.width() as usize, img.height() as usize);
        let values: Vec<f32> = img.into_raw().into_iter().map(|x| x as f32).collect();
        Self::from_values(w, h, &values).ok_or_else(|| SensorLogError::InvalidManifest(format!("{} is an empty mask", path.display())))
    }

    pub fn mask_path(folder: &Path, label: &str) -> PathBuf {
        folder.join(format!("{label}.png"))
    }

    pub fn apply(&self, frame: &mut Frame) -> Result<(), SensorLogError> {
        if frame.size() != (self.width, self.height) {
            return Err(SensorLogError::MaskSizeMismatch { mask: (self.width, self.height), frame: frame.size() });
        }
        let c = frame.channels();
        for (px, gain) in frame.data.chunks_exact_mut(c).zip(&self.gains) {
            for v in px {
                *v = (*v as f32 * gain).round().min(255.0) as u8;
            }
        }
        Ok(())
    }
}

/// Reads frames from a sensor log with the acquisition-time corrections applied:
/// devignetting first, then color correction (color frames only).
#[derive(Debug, Clone, Default)]
pub struct Acquisition {
    pub devignetting: Option<DevignettingMask>,
    pub color_gains: Option<[f32; 3]>,
}

impl Acquisition {
    pub fn read(&self, log: &dyn SensorLog, stream: StreamId, index: usize) -> Result<Frame, SensorLogError> {
        let mut frame = log.read_frame(stream, index)?;
        if let Some(mask) = &self.devignetting {
            mask.apply(&mut frame)?;
        }
        if let Some(gains) = self.color_gains {
            if frame.format == PixelFormat::Rgb8 {
                for px in frame.data.chunks_exact_mut(3) {
                    for (v, g) in px.iter_mut().zip(gains) {
                        *v = (*v as f32 * g).round().clamp(0.0, 255.0) as u8;
                    }
                }
            }
        }
        Ok(frame)
    }
}
