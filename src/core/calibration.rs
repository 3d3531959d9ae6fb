// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2021-2022 Adrian <adrian.eddy at gmail>

use nalgebra::{ Vector2, Vector3 };
use serde::{ Serialize, Deserialize };

use crate::distortion_models::DistortionModel;

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("No calibration for sensor {0}")]
    MissingCalibration(String),
    #[error("{model} expects {expected} parameters, got {got}")]
    InvalidParams { model: &'static str, expected: usize, got: usize },
    #[error("Invalid image size {0}x{1}")]
    InvalidSize(usize, usize),
}

/// Camera intrinsics as stored in the device calibration of a recording.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CameraCalibration {
    pub label: String,
    pub model: DistortionModel,
    pub projection_params: Vec<f64>,
    pub image_size: [usize; 2],

    /// Per-channel gains for color correction, RGB cameras only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_gains: Option<[f32; 3]>,
}

impl CameraCalibration {
    pub fn new(label: &str, model: DistortionModel, projection_params: Vec<f64>, width: usize, height: usize) -> Result<Self, CalibrationError> {
        let calib = Self { label: label.to_owned(), model, projection_params, image_size: [width, height], color_gains: None };
        calib.validate()?;
        Ok(calib)
    }

    /// Synthetic distortion-free calibration, the common output geometry for all streams.
    pub fn linear(width: usize, height: usize, focal: f64, label: &str) -> Result<Self, CalibrationError> {
        let cx = (width as f64 - 1.0) / 2.0;
        let cy = (height as f64 - 1.0) / 2.0;
        Self::new(label, DistortionModel::default(), vec![focal, focal, cx, cy], width, height)
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.image_size[0] == 0 || self.image_size[1] == 0 {
            return Err(CalibrationError::InvalidSize(self.image_size[0], self.image_size[1]));
        }
        if self.model.split_params(&self.projection_params).is_none() {
            return Err(CalibrationError::InvalidParams { model: self.model.name(), expected: self.model.param_count(), got: self.projection_params.len() });
        }
        Ok(())
    }

    pub fn width(&self)  -> usize { self.image_size[0] }
    pub fn height(&self) -> usize { self.image_size[1] }

    /// Projects a camera-frame ray to a pixel position. `None` if the model can't see the ray.
    pub fn project(&self, ray: &Vector3<f64>) -> Option<Vector2<f64>> {
        let (f, c, k) = self.model.split_params(&self.projection_params)?;
        let (x, y) = self.model.distort_point(ray.x, ray.y, ray.z, k)?;
        Some(Vector2::new(f.0 * x + c.0, f.1 * y + c.1))
    }

    pub fn unproject(&self, pixel: &Vector2<f64>) -> Option<Vector3<f64>> {
        let (f, c, k) = self.model.split_params(&self.projection_params)?;
        let point = ((pixel.x - c.0) / f.0, (pixel.y - c.1) / f.1);
        let (x, y, z) = self.model.undistort_point(point, k)?;
        Some(Vector3::new(x, y, z))
    }

    pub fn summary(&self) -> String {
        format!("{} {}x{} ({})", self.label, self.width(), self.height(), self.model.name())
    }
}
