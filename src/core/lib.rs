// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2021-2022 Adrian <adrian.eddy at gmail>

pub mod frame;
pub mod pixel_formats;
pub mod distortion_models;
pub mod calibration;
pub mod sensor_log;
pub mod acquisition;
pub mod undistortion;
pub mod orientation;
pub mod assembler;
pub mod metadata;
pub mod pipeline;
pub mod discovery;
pub mod settings;
pub mod error;
pub mod util;

pub use error::{ PipelineError, RecordingError, SinkError, Stage };
pub use frame::{ ChannelOrder, Frame, PixelFormat };
pub use pipeline::{ Pipeline, RunSummary };
pub use settings::{ CorrectionConfig, ExtractionSettings };
