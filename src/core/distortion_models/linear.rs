// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

/// Distortion-free pinhole projection. Params: `[fx, fy, cx, cy]`.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct Linear { }

impl Linear {
    pub const PARAM_COUNT: usize = 4;

    pub fn distort_point(&self, x: f64, y: f64, z: f64, _k: &[f64]) -> Option<(f64, f64)> {
        if z <= 0.0 { return None; }
        Some((x / z, y / z))
    }

    pub fn undistort_point(&self, point: (f64, f64), _k: &[f64]) -> Option<(f64, f64, f64)> {
        Some((point.0, point.1, 1.0))
    }

    pub fn split_params(p: &[f64]) -> super::SplitParams<'_> {
        ((p[0], p[1]), (p[2], p[3]), &p[4..])
    }

    pub fn id() -> &'static str { "linear" }
    pub fn name() -> &'static str { "Linear" }
}
