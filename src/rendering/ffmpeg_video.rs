// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2021-2022 Adrian <adrian.eddy at gmail>

use ffmpeg_next::{ format, frame, software };

use aria_extract_core::{ Frame, PixelFormat };
use super::ffmpeg_processor::FFmpegError;

/// Packed BGR24 input frame plus the scaler into the encoder's pixel format.
pub struct Converter {
    input: frame::Video,
    output: frame::Video,
    context: software::scaling::Context,
}

impl Converter {
    pub fn new(width: u32, height: u32, output_format: format::Pixel) -> Result<Self, FFmpegError> {
        Ok(Self {
            input: frame::Video::new(format::Pixel::BGR24, width, height),
            output: frame::Video::new(output_format, width, height),
            context: software::scaling::Context::get(
                format::Pixel::BGR24, width, height, output_format, width, height, software::scaling::Flags::BILINEAR,
            )?,
        })
    }

    /// Copies `frame` into the input buffer row by row, honoring the ffmpeg line size, and converts it.
    pub fn convert(&mut self, frame: &Frame) -> Result<&mut frame::Video, FFmpegError> {
        if frame.format != PixelFormat::Rgb8 {
            return Err(FFmpegError::UnsupportedFrame(frame.format));
        }
        if (frame.width as u32, frame.height as u32) != (self.input.width(), self.input.height()) {
            return Err(FFmpegError::FrameSizeMismatch((frame.width, frame.height)));
        }
        let stride = self.input.stride(0);
        let row_len = frame.stride();
        let data = self.input.data_mut(0);
        for (dst, src) in data.chunks_mut(stride).zip(frame.data.chunks_exact(row_len)) {
            dst[..row_len].copy_from_slice(src);
        }
        self.context.run(&self.input, &mut self.output)?;
        Ok(&mut self.output)
    }
}
