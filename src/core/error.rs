// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

use std::path::PathBuf;

use crate::calibration::CalibrationError;
use crate::sensor_log::SensorLogError;

pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid recording: {0}")]
    InvalidRecording(#[source] SensorLogError),
    #[error("None of the candidate streams {0:?} exist in the recording")]
    StreamNotFound(Vec<String>),
    #[error("Stream {0} has no frames")]
    EmptyStream(String),
    #[error("Calibration unavailable: {0}")]
    CalibrationUnavailable(#[from] CalibrationError),
    #[error("Devignetting mask {path:?} can't be loaded: {source}")]
    MaskUnavailable { path: PathBuf, source: SensorLogError },
    #[error("Failed to read frame {index}: {source}")]
    FrameReadFailure { index: usize, source: SensorLogError },
    #[error("Frame {index} is {got:?}, expected {expected:?}")]
    InconsistentFrameSize { index: usize, expected: (usize, usize), got: (usize, usize) },
    #[error("Failed to write {what}: {source}")]
    WriteFailure { what: String, source: SinkError },
    #[error("Output location {path:?} is not usable: {source}")]
    Environment { path: PathBuf, source: std::io::Error },
}

impl PipelineError {
    pub fn write(what: impl Into<String>, source: impl Into<SinkError>) -> Self {
        Self::WriteFailure { what: what.into(), source: source.into() }
    }
}

/// Where in the per-recording flow a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Open,
    ResolveStream,
    ResolveCalibration,
    PrepareOutput,
    ProcessFrame(usize),
    Finalize,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Stage::Open               => write!(f, "open"),
            Stage::ResolveStream      => write!(f, "stream selection"),
            Stage::ResolveCalibration => write!(f, "calibration"),
            Stage::PrepareOutput      => write!(f, "output setup"),
            Stage::ProcessFrame(i)    => write!(f, "frame {i}"),
            Stage::Finalize           => write!(f, "finalize"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{stage}: {source}")]
pub struct RecordingError {
    pub stage: Stage,
    #[source]
    pub source: PipelineError,
}

impl RecordingError {
    pub fn new(stage: Stage, source: PipelineError) -> Self { Self { stage, source } }
}
