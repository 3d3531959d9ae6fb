// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

/// Kannala-Brandt model with six radial, two tangential and four thin-prism coefficients,
/// the model the headset factory calibration uses for every camera.
/// Params: `[f, cx, cy, k0..k5, p0, p1, s0..s3]`.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct Fisheye624 { }

const RADIAL: usize = 6;

impl Fisheye624 {
    pub const PARAM_COUNT: usize = 3 + RADIAL + 2 + 4;

    fn tangential_and_prism(xr: f64, yr: f64, k: &[f64]) -> (f64, f64) {
        let (p0, p1) = (k[RADIAL], k[RADIAL + 1]);
        let s = &k[RADIAL + 2..RADIAL + 6];
        let r2 = xr * xr + yr * yr;
        let r4 = r2 * r2;
        let temp = 2.0 * (xr * p0 + yr * p1);
        (
            xr + temp * xr + r2 * p0 + s[0] * r2 + s[1] * r4,
            yr + temp * yr + r2 * p1 + s[2] * r2 + s[3] * r4
        )
    }

    pub fn distort_point(&self, x: f64, y: f64, z: f64, k: &[f64]) -> Option<(f64, f64)> {
        let r = (x * x + y * y).sqrt();
        if r == 0.0 {
            return if z > 0.0 { Some(Self::tangential_and_prism(0.0, 0.0, k)) } else { None };
        }
        let theta = r.atan2(z);
        let theta2 = theta * theta;
        let mut radial = 1.0;
        let mut pow = theta2;
        for ki in &k[..RADIAL] {
            radial += ki * pow;
            pow *= theta2;
        }
        let theta_d = theta * radial;
        Some(Self::tangential_and_prism(theta_d * x / r, theta_d * y / r, k))
    }

    pub fn undistort_point(&self, point: (f64, f64), k: &[f64]) -> Option<(f64, f64, f64)> {
        const EPS: f64 = 1e-12;
        const H: f64 = 1e-7;

        // Remove tangential and thin-prism terms with Gauss-Newton on a numeric jacobian
        let (mut xr, mut yr) = point;
        let mut converged = false;
        for _ in 0..20 {
            let (fx, fy) = Self::tangential_and_prism(xr, yr, k);
            let (ex, ey) = (fx - point.0, fy - point.1);
            if ex * ex + ey * ey < EPS * EPS { converged = true; break; }

            let (dxx, dyx) = { let (a, b) = Self::tangential_and_prism(xr + H, yr, k); ((a - fx) / H, (b - fy) / H) };
            let (dxy, dyy) = { let (a, b) = Self::tangential_and_prism(xr, yr + H, k); ((a - fx) / H, (b - fy) / H) };
            let det = dxx * dyy - dxy * dyx;
            if det.abs() < 1e-15 { return None; }
            xr -= ( dyy * ex - dxy * ey) / det;
            yr -= (-dyx * ex + dxx * ey) / det;
        }
        if !converged {
            let (fx, fy) = Self::tangential_and_prism(xr, yr, k);
            if (fx - point.0).abs() > 1e-6 || (fy - point.1).abs() > 1e-6 { return None; }
        }

        let theta_d = (xr * xr + yr * yr).sqrt();
        if theta_d == 0.0 { return Some((0.0, 0.0, 1.0)); }
        let theta = super::solve_theta(theta_d, &k[..RADIAL])?;
        let s = theta.sin() / theta_d;
        Some((xr * s, yr * s, theta.cos()))
    }

    pub fn split_params(p: &[f64]) -> super::SplitParams<'_> {
        ((p[0], p[0]), (p[1], p[2]), &p[3..])
    }

    pub fn id() -> &'static str { "Fisheye624" }
    pub fn name() -> &'static str { "Fisheye624" }
}
