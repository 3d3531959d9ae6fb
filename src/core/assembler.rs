// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

use std::path::{ Path, PathBuf };

use crate::error::{ PipelineError, SinkError };
use crate::frame::{ ChannelOrder, Frame };
use crate::metadata::{ OutputRecord, Resolution, METADATA_FILENAME };
use crate::settings::CorrectionConfig;
use crate::util::path_to_str;

/// Video container writer. Receives already corrected and rotated 3-channel frames in order.
pub trait VideoSink {
    fn channel_order(&self) -> ChannelOrder { ChannelOrder::Rgb }
    fn write_frame(&mut self, frame: &Frame) -> Result<(), SinkError>;
    /// Flushes and closes the container.
    fn finish(self: Box<Self>) -> Result<(), SinkError>;
}

pub trait VideoSinkFactory {
    fn open(&self, path: &Path, size: (usize, usize), fps: f64) -> Result<Box<dyn VideoSink>, SinkError>;
}

/// Frame indices of the three thumbnails: first, middle, last.
pub fn thumbnail_indices(frame_count: usize) -> [usize; 3] {
    [0, frame_count / 2, frame_count.saturating_sub(1)]
}

pub fn thumbnail_path(dir: &Path, ordinal: usize) -> PathBuf {
    dir.join(format!("thumbnail_{}.png", ordinal + 1))
}

/// Drives one output container: `begin` → `push` × frame_count → `finish`.
/// On failure the caller hands the assembler to `discard`, which removes everything written so far.
pub struct VideoAssembler<'a> {
    factory: &'a dyn VideoSinkFactory,
    dir: PathBuf,
    video_path: PathBuf,
    fps: f64,
    frame_count: usize,
    corrections: CorrectionConfig,
    thumbnail_indices: [usize; 3],

    sink: Option<Box<dyn VideoSink>>,
    size: Option<(usize, usize)>,
    frames_written: usize,
    thumbnails: [Option<PathBuf>; 3],
}

impl<'a> VideoAssembler<'a> {
    pub fn begin(factory: &'a dyn VideoSinkFactory, dir: &Path, name: &str, frame_count: usize, fps: f64, corrections: CorrectionConfig) -> Result<Self, PipelineError> {
        std::fs::create_dir_all(dir).map_err(|e| PipelineError::write(format!("directory {}", dir.display()), e))?;

        // a previous run's sidecar must never describe what this run writes
        let stale = dir.join(METADATA_FILENAME);
        if stale.exists() {
            std::fs::remove_file(&stale).map_err(|e| PipelineError::write(format!("stale {}", stale.display()), e))?;
        }

        Ok(Self {
            factory,
            dir: dir.to_path_buf(),
            video_path: dir.join(format!("{name}.mp4")),
            fps,
            frame_count,
            corrections,
            thumbnail_indices: thumbnail_indices(frame_count),
            sink: None,
            size: None,
            frames_written: 0,
            thumbnails: Default::default(),
        })
    }

    pub fn video_path(&self) -> &Path { &self.video_path }

    pub fn push(&mut self, frame: Frame) -> Result<(), PipelineError> {
        let size = frame.size();
        let expected = *self.size.get_or_insert(size);
        if size != expected {
            return Err(PipelineError::InconsistentFrameSize { index: frame.index, expected, got: size });
        }

        let sink = match self.sink.take() {
            Some(sink) => sink,
            None => {
                log::debug!("Opening {} at {}x{} @ {} fps", self.video_path.display(), size.0, size.1, self.fps);
                self.factory.open(&self.video_path, size, self.fps).map_err(|e| PipelineError::write(path_to_str(&self.video_path), e))?
            }
        };
        let sink = self.sink.insert(sink);

        let order = sink.channel_order();
        let written = if order == ChannelOrder::Rgb { sink.write_frame(&frame) } else { sink.write_frame(&frame.with_channel_order(order)) };
        written.map_err(|e| PipelineError::write(format!("frame {} to {}", frame.index, path_to_str(&self.video_path)), e))?;
        self.frames_written += 1;

        for ordinal in 0..3 {
            if self.thumbnail_indices[ordinal] == frame.index {
                let path = thumbnail_path(&self.dir, ordinal);
                let img = frame.to_rgb_image().ok_or_else(|| PipelineError::write(path_to_str(&path), "frame buffer doesn't match its size"))?;
                img.save(&path).map_err(|e| PipelineError::write(path_to_str(&path), e))?;
                self.thumbnails[ordinal] = Some(path);
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<OutputRecord, PipelineError> {
        let result = self.finalize();
        if result.is_err() {
            self.discard();
        }
        result
    }

    fn finalize(&mut self) -> Result<OutputRecord, PipelineError> {
        let sink = self.sink.take().ok_or_else(|| PipelineError::write(path_to_str(&self.video_path), "no frames were written"))?;
        sink.finish().map_err(|e| PipelineError::write(path_to_str(&self.video_path), e))?;

        let (width, height) = self.size.unwrap_or_default();
        let thumbnails = self.thumbnails.iter().enumerate()
            .map(|(i, x)| path_to_str(&x.clone().unwrap_or_else(|| thumbnail_path(&self.dir, i))))
            .collect();

        let record = OutputRecord {
            video_path: path_to_str(&self.video_path),
            frame_count: self.frames_written,
            fps: self.fps,
            resolution: Resolution { width, height },
            thumbnails,
            undistort: self.corrections.undistort,
            color_correct: self.corrections.color_correct,
            devignette: self.corrections.devignette,
        };
        if self.frames_written != self.frame_count {
            log::warn!("{}: expected {} frames, wrote {}", self.video_path.display(), self.frame_count, self.frames_written);
        }

        let path = self.dir.join(METADATA_FILENAME);
        let json = record.to_json().map_err(|e| PipelineError::write(path_to_str(&path), e))?;
        std::fs::write(&path, json).map_err(|e| PipelineError::write(path_to_str(&path), e))?;
        Ok(record)
    }

    /// Drops the container and removes the partial video, thumbnails and sidecar.
    pub fn discard(mut self) {
        // closing may fail for a broken container, the file is removed anyway
        if let Some(sink) = self.sink.take() {
            if let Err(e) = sink.finish() {
                log::debug!("Closing partial {}: {e}", self.video_path.display());
            }
        }
        let mut files = vec![self.video_path.clone(), self.dir.join(METADATA_FILENAME)];
        files.extend((0..3).map(|i| thumbnail_path(&self.dir, i)));
        for file in files {
            if file.exists() {
                if let Err(e) = std::fs::remove_file(&file) {
                    log::warn!("Failed to remove partial output {}: {e}", file.display());
                }
            }
        }
    }
}
