// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

use serde::{ Serialize, Deserialize };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
}
impl PixelFormat {
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8  => 3,
        }
    }
}

/// Channel order expected by a video container writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// One image buffer flowing through the pipeline, tightly packed (stride == width * channels).
/// The same type carries raw, corrected and rotated frames, only the shape differs.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: usize,
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(index: usize, width: usize, height: usize, format: PixelFormat) -> Self {
        Self { index, width, height, format, data: vec![0u8; width * height * format.channels()] }
    }

    pub fn from_raw(index: usize, width: usize, height: usize, format: PixelFormat, data: Vec<u8>) -> Option<Self> {
        if data.len() != width * height * format.channels() {
            return None;
        }
        Some(Self { index, width, height, format, data })
    }

    pub fn channels(&self) -> usize { self.format.channels() }
    pub fn stride(&self) -> usize { self.width * self.format.channels() }
    pub fn size(&self) -> (usize, usize) { (self.width, self.height) }

    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let c = self.channels();
        let pos = (y * self.width + x) * c;
        &self.data[pos..pos + c]
    }

    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        match self.format {
            PixelFormat::Rgb8  => image::RgbImage::from_raw(self.width as u32, self.height as u32, self.data.clone()),
            PixelFormat::Gray8 => image::GrayImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
                .map(|x| image::DynamicImage::ImageLuma8(x).to_rgb8()),
        }
    }

    /// Returns a copy with the channels in `order`. Frames are stored as RGB.
    pub fn with_channel_order(&self, order: ChannelOrder) -> Frame {
        let mut out = self.clone();
        if order == ChannelOrder::Bgr && self.format == PixelFormat::Rgb8 {
            out.data.chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_buffer_size() {
        assert!(Frame::from_raw(0, 4, 2, PixelFormat::Rgb8, vec![0; 23]).is_none());
        assert!(Frame::from_raw(0, 4, 2, PixelFormat::Gray8, vec![0; 8]).is_some());
    }

    #[test]
    fn bgr_reorder_swaps_red_and_blue() {
        let frame = Frame::from_raw(0, 2, 1, PixelFormat::Rgb8, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let bgr = frame.with_channel_order(ChannelOrder::Bgr);
        assert_eq!(bgr.data, vec![3, 2, 1, 6, 5, 4]);
        assert_eq!(frame.with_channel_order(ChannelOrder::Rgb), frame);
    }
}
