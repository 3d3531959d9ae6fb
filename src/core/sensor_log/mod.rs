// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2021-2022 Adrian <adrian.eddy at gmail>

pub(crate) mod folder;
pub use folder::{ FolderSensorLog, recording_name };

use std::path::Path;
use crate::calibration::CameraCalibration;
use crate::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub usize);

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result { write!(f, "#{}", self.0) }
}

#[derive(Debug, thiserror::Error)]
pub enum SensorLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid manifest: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Stream {0} doesn't exist")]
    StreamOutOfRange(StreamId),
    #[error("Frame {index} is out of range, stream has {count} frames")]
    FrameOutOfRange { index: usize, count: usize },
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("Devignetting mask is {mask:?}, frame is {frame:?}")]
    MaskSizeMismatch { mask: (usize, usize), frame: (usize, usize) },
}

/// Read access to one recorded sensor log. Frames come out exactly as stored, acquisition
/// corrections are applied on top by [`crate::acquisition::Acquisition`].
pub trait SensorLog {
    fn path(&self) -> &Path;
    fn name(&self) -> &str;

    fn stream_id(&self, label: &str) -> Option<StreamId>;
    fn frame_count(&self, stream: StreamId) -> usize;

    fn camera_calibration(&self, label: &str) -> Option<CameraCalibration>;

    fn read_frame(&self, stream: StreamId, index: usize) -> Result<Frame, SensorLogError>;
}
