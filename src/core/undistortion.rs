// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2021-2022 Adrian <adrian.eddy at gmail>

use nalgebra::{ Vector2, Vector4 };
use rayon::prelude::*;

use crate::acquisition::Acquisition;
use crate::calibration::CameraCalibration;
use crate::error::PipelineError;
use crate::frame::{ Frame, PixelFormat };
use crate::pixel_formats::*;
use crate::sensor_log::{ SensorLog, StreamId };

const EDGE_EPS: f64 = 1e-6;

/// Precomputed target pixel -> source pixel lookup for one calibration pair.
/// Entries are NaN where the target pixel has no valid source.
#[derive(Debug, Clone)]
pub struct RemapTable {
    pub width: usize,
    pub height: usize,
    pub source_width: usize,
    pub source_height: usize,
    map: Vec<[f32; 2]>,
}

impl RemapTable {
    pub fn new(source: &CameraCalibration, target: &CameraCalibration) -> Self {
        let (width, height) = (target.width(), target.height());
        let (sw, sh) = (source.width() as f64, source.height() as f64);

        let mut map = vec![[f32::NAN; 2]; width * height];
        map.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let src = target.unproject(&Vector2::new(x as f64, y as f64)).and_then(|ray| source.project(&ray));
                if let Some(p) = src {
                    // round-trip error can push exact edge pixels just outside
                    if p.x >= -EDGE_EPS && p.y >= -EDGE_EPS && p.x <= sw - 1.0 + EDGE_EPS && p.y <= sh - 1.0 + EDGE_EPS {
                        *out = [p.x.clamp(0.0, sw - 1.0) as f32, p.y.clamp(0.0, sh - 1.0) as f32];
                    }
                }
            }
        });
        Self { width, height, source_width: source.width(), source_height: source.height(), map }
    }

    pub fn valid_count(&self) -> usize {
        self.map.iter().filter(|x| x[0].is_finite()).count()
    }

    /// Bilinear resampling of `frame` into the target geometry, background is black.
    /// A frame stored at another resolution than its calibration is sampled at scaled coordinates.
    pub fn remap(&self, frame: &Frame) -> Frame {
        let mut out = Frame::new(frame.index, self.width, self.height, frame.format);
        match frame.format {
            PixelFormat::Gray8 => self.sample::<Luma8>(frame, &mut out.data),
            PixelFormat::Rgb8  => self.sample::<RGB8>(frame, &mut out.data),
        }
        out
    }

    fn sample<T: PixelType>(&self, frame: &Frame, out_pixels: &mut [u8]) {
        let src: &[T] = bytemuck::cast_slice(&frame.data);
        let bg: T = PixelType::from_float(Vector4::zeros());
        let (fw, fh) = frame.size();
        if fw == 0 || fh == 0 {
            out_pixels.fill(0);
            return;
        }
        let scale = if frame.size() == (self.source_width, self.source_height) {
            None
        } else {
            Some((fw as f32 / self.source_width as f32, fh as f32 / self.source_height as f32))
        };

        out_pixels.par_chunks_mut(self.width * std::mem::size_of::<T>()).enumerate().for_each(|(y, row_bytes)| {
            let row: &mut [T] = bytemuck::cast_slice_mut(row_bytes);
            let map_row = &self.map[y * self.width..(y + 1) * self.width];
            for (pix_out, &[mx, my]) in row.iter_mut().zip(map_row) {
                if !mx.is_finite() || !my.is_finite() {
                    *pix_out = bg;
                    continue;
                }
                let (sx, sy) = match scale {
                    None => (mx, my),
                    Some((kx, ky)) => (((mx + 0.5) * kx - 0.5).clamp(0.0, (fw - 1) as f32), ((my + 0.5) * ky - 0.5).clamp(0.0, (fh - 1) as f32)),
                };
                let x0 = (sx.floor() as usize).min(fw - 1);
                let y0 = (sy.floor() as usize).min(fh - 1);
                let x1 = (x0 + 1).min(fw - 1);
                let y1 = (y0 + 1).min(fh - 1);
                let fx = sx - x0 as f32;
                let fy = sy - y0 as f32;

                let px = |x: usize, y: usize| -> Vector4<f32> { PixelType::to_float(src[y * fw + x]) };
                let top    = px(x0, y0) * (1.0 - fx) + px(x1, y0) * fx;
                let bottom = px(x0, y1) * (1.0 - fx) + px(x1, y1) * fx;
                *pix_out = PixelType::from_float(top * (1.0 - fy) + bottom * fy);
            }
        });
    }
}

/// Produces one corrected frame: acquisition corrections, then optional geometric remap.
pub struct FrameCorrector {
    pub acquisition: Acquisition,
    pub remap: Option<RemapTable>,
}

impl FrameCorrector {
    pub fn correct(&self, log: &dyn SensorLog, stream: StreamId, index: usize) -> Result<Frame, PipelineError> {
        let frame = self.acquisition.read(log, stream, index).map_err(|source| PipelineError::FrameReadFailure { index, source })?;
        Ok(match &self.remap {
            Some(table) => table.remap(&frame),
            None => frame,
        })
    }
}
