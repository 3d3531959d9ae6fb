// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

// Adapted from OpenCV: https://github.com/opencv/opencv/blob/2b60166e5c65f1caccac11964ad760d847c536e4/modules/calib3d/src/fisheye.cpp#L257-L460

/// Kannala-Brandt model with four radial coefficients. Params: `[fx, fy, cx, cy, k0, k1, k2, k3]`.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct OpenCVFisheye { }

impl OpenCVFisheye {
    pub const PARAM_COUNT: usize = 8;

    pub fn undistort_point(&self, point: (f64, f64), k: &[f64]) -> Option<(f64, f64, f64)> {
        if k.iter().all(|x| *x == 0.0) { return Some((point.0, point.1, 1.0)); }

        let theta_d = (point.0 * point.0 + point.1 * point.1).sqrt();
        if theta_d == 0.0 { return Some((0.0, 0.0, 1.0)); }

        let theta = super::solve_theta(theta_d, k)?;
        if theta >= std::f64::consts::FRAC_PI_2 { return None; }

        let scale = theta.tan() / theta_d;
        Some((point.0 * scale, point.1 * scale, 1.0))
    }

    pub fn distort_point(&self, x: f64, y: f64, z: f64, k: &[f64]) -> Option<(f64, f64)> {
        if z <= 0.0 { return None; }
        let x = x / z;
        let y = y / z;
        if k.iter().all(|v| *v == 0.0) { return Some((x, y)); }

        let r = (x.powi(2) + y.powi(2)).sqrt();

        let theta = r.atan();
        let theta2 = theta*theta;
        let theta4 = theta2*theta2;
        let theta6 = theta4*theta2;
        let theta8 = theta4*theta4;

        let theta_d = theta * (1.0 + k[0]*theta2 + k[1]*theta4 + k[2]*theta6 + k[3]*theta8);

        let scale = if r == 0.0 { 1.0 } else { theta_d / r };

        Some((
            x * scale,
            y * scale
        ))
    }

    pub fn split_params(p: &[f64]) -> super::SplitParams<'_> {
        ((p[0], p[1]), (p[2], p[3]), &p[4..])
    }

    pub fn id() -> &'static str { "opencv_fisheye" }
    pub fn name() -> &'static str { "OpenCV Fisheye" }
}
