// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

use crate::frame::{ Frame, PixelFormat };

/// Broadcasts a single channel frame to three identical channels. Color frames are returned as is.
pub fn to_rgb(frame: Frame) -> Frame {
    match frame.format {
        PixelFormat::Rgb8 => frame,
        PixelFormat::Gray8 => {
            let data = frame.data.iter().flat_map(|&v| [v, v, v]).collect();
            Frame { data, format: PixelFormat::Rgb8, ..frame }
        }
    }
}

/// Rotates 90° clockwise: `out(x', y') = in(y', h - 1 - x')`, output is `h × w`.
pub fn rotate_cw(frame: &Frame) -> Frame {
    let (w, h, c) = (frame.width, frame.height, frame.channels());
    let mut out = Frame::new(frame.index, h, w, frame.format);
    for (y_out, row) in out.data.chunks_exact_mut(h * c).enumerate() {
        for (x_out, px) in row.chunks_exact_mut(c).enumerate() {
            px.copy_from_slice(frame.pixel(y_out, h - 1 - x_out));
        }
    }
    out
}

/// Makes a corrected frame container-ready: 3 channels, portrait orientation.
pub fn normalize(frame: Frame) -> Frame {
    rotate_cw(&to_rgb(frame))
}
