// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2021-2022 Adrian <adrian.eddy at gmail>

use std::error;
use std::path::Path;

use ffmpeg_next::{ codec, encoder, format, Packet, Rational };

use aria_extract_core::{ ChannelOrder, Frame, PixelFormat, SinkError };
use aria_extract_core::assembler::VideoSink;
use super::ffmpeg_video::Converter;
use super::fps_to_rational;

#[derive(Debug)]
pub enum FFmpegError {
    EncoderNotFound,
    NoOutputStream,
    UnsupportedFrame(PixelFormat),
    FrameSizeMismatch((usize, usize)),
    InternalError(ffmpeg_next::Error),
    CannotOpenOutputFile((String, ffmpeg_next::Error)),
}

impl std::fmt::Display for FFmpegError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FFmpegError::EncoderNotFound                 => write!(f, "Encoder not found"),
            FFmpegError::NoOutputStream                  => write!(f, "Output stream is missing"),
            FFmpegError::UnsupportedFrame(v)             => write!(f, "Unsupported frame format: {:?}", v),
            FFmpegError::FrameSizeMismatch((w, h))       => write!(f, "Frame size {w}x{h} doesn't match the encoder"),
            FFmpegError::InternalError(e)                => write!(f, "ffmpeg error: {:?}", e),
            FFmpegError::CannotOpenOutputFile((url, e))  => write!(f, "Cannot open output file {url}: {e:?}"),
        }
    }
}
impl error::Error for FFmpegError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            FFmpegError::InternalError(ref e) => Some(e),
            FFmpegError::CannotOpenOutputFile((_, ref e)) => Some(e),
            _ => None
        }
    }
}
impl From<ffmpeg_next::Error> for FFmpegError {
    fn from(err: ffmpeg_next::Error) -> FFmpegError { FFmpegError::InternalError(err) }
}

const MP4V_TAG: u32 = u32::from_le_bytes(*b"mp4v");

/// MPEG-4 Part 2 video in an MP4 container, fed with packed BGR frames.
pub struct VideoEncoder {
    octx: format::context::Output,
    encoder: encoder::Video,
    converter: Converter,
    ost_index: usize,
    encoder_time_base: Rational,
    ost_time_base: Rational,
    frame_index: i64,
}

impl VideoEncoder {
    pub fn new(path: &Path, size: (usize, usize), fps: f64) -> Result<Self, FFmpegError> {
        let (width, height) = (size.0 as u32, size.1 as u32);

        let mut octx = format::output(&path).map_err(|e| FFmpegError::CannotOpenOutputFile((path.display().to_string(), e)))?;
        let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

        let codec = encoder::find(codec::Id::MPEG4).ok_or(FFmpegError::EncoderNotFound)?;
        let mut ost = octx.add_stream(codec)?;
        let ost_index = ost.index();

        let frame_rate = fps_to_rational(fps);
        let time_base = frame_rate.invert();

        let mut encoder = codec::context::Context::new_with_codec(codec).encoder().video()?;
        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(format::Pixel::YUV420P);
        encoder.set_frame_rate(Some(frame_rate));
        encoder.set_time_base(time_base);
        // roughly 0.2 bits per pixel
        encoder.set_bit_rate((width as f64 * height as f64 * fps * 0.2) as usize);
        if global_header {
            encoder.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder.open_as(codec)?;
        ost.set_parameters(&encoder);
        ost.set_time_base(time_base);
        unsafe {
            (*(*ost.as_mut_ptr()).codecpar).codec_tag = MP4V_TAG;
        }

        octx.write_header()?;
        let ost_time_base = octx.stream(ost_index).ok_or(FFmpegError::NoOutputStream)?.time_base();

        log::debug!("Encoder for {}: {}x{} @ {:?}, stream time base {:?}", path.display(), width, height, frame_rate, ost_time_base);

        Ok(Self {
            octx,
            encoder,
            converter: Converter::new(width, height, format::Pixel::YUV420P)?,
            ost_index,
            encoder_time_base: time_base,
            ost_time_base,
            frame_index: 0,
        })
    }

    fn write_packets(&mut self) -> Result<(), FFmpegError> {
        let mut encoded = Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(self.ost_index);
            encoded.rescale_ts(self.encoder_time_base, self.ost_time_base);
            encoded.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }

    pub fn encode(&mut self, frame: &Frame) -> Result<(), FFmpegError> {
        let converted = self.converter.convert(frame)?;
        converted.set_pts(Some(self.frame_index));
        self.encoder.send_frame(converted)?;
        self.frame_index += 1;
        self.write_packets()
    }

    pub fn finish(mut self) -> Result<(), FFmpegError> {
        self.encoder.send_eof()?;
        self.write_packets()?;
        self.octx.write_trailer()?;
        Ok(())
    }
}

impl VideoSink for VideoEncoder {
    fn channel_order(&self) -> ChannelOrder { ChannelOrder::Bgr }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), SinkError> {
        Ok(self.encode(frame)?)
    }

    fn finish(self: Box<Self>) -> Result<(), SinkError> {
        Ok(VideoEncoder::finish(*self)?)
    }
}
