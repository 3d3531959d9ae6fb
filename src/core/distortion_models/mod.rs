// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

mod linear;
mod opencv_fisheye;
mod fisheye624;

pub use linear::Linear;
pub use opencv_fisheye::OpenCVFisheye;
pub use fisheye624::Fisheye624;

use serde::{ Serialize, Deserialize, Serializer, Deserializer };

/// Intrinsics split out of a flat parameter vector: (focal, principal point, distortion coefficients).
pub type SplitParams<'a> = ((f64, f64), (f64, f64), &'a [f64]);

macro_rules! impl_models {
    ($($name:ident => $class:ty,)*) => {
        #[derive(Clone, Debug, PartialEq)]
        pub enum DistortionModels {
            $($name($class),)*
        }
        impl Default for DistortionModels {
            fn default() -> Self { DistortionModels::Linear(Linear { }) }
        }
        #[derive(Default, Clone, Debug, PartialEq)]
        pub struct DistortionModel {
            inner: DistortionModels
        }
        impl DistortionModel {
            /// Maps a camera-frame ray to distorted normalized image coordinates.
            pub fn distort_point(&self, x: f64, y: f64, z: f64, k: &[f64]) -> Option<(f64, f64)> {
                match &self.inner {
                    $(DistortionModels::$name(m) => m.distort_point(x, y, z, k),)*
                }
            }
            /// Maps distorted normalized image coordinates back to a camera-frame ray.
            pub fn undistort_point(&self, point: (f64, f64), k: &[f64]) -> Option<(f64, f64, f64)> {
                match &self.inner {
                    $(DistortionModels::$name(m) => m.undistort_point(point, k),)*
                }
            }

            pub fn id(&self)   -> &'static str { match &self.inner { $(DistortionModels::$name(_) => <$class>::id(),)* } }
            pub fn name(&self) -> &'static str { match &self.inner { $(DistortionModels::$name(_) => <$class>::name(),)* } }

            /// Total length of the flat parameter vector, intrinsics included.
            pub fn param_count(&self) -> usize { match &self.inner { $(DistortionModels::$name(_) => <$class>::PARAM_COUNT,)* } }

            pub fn split_params<'a>(&self, params: &'a [f64]) -> Option<SplitParams<'a>> {
                if params.len() != self.param_count() { return None; }
                match &self.inner { $(DistortionModels::$name(_) => Some(<$class>::split_params(params)),)* }
            }

            pub fn from_id(id: &str) -> Option<Self> {
                $(if id.eq_ignore_ascii_case(<$class>::id()) { return Some(Self { inner: DistortionModels::$name(<$class>::default()) }); })*
                None
            }
        }
    };
}

impl_models! {
    Linear        => linear::Linear,
    OpenCVFisheye => opencv_fisheye::OpenCVFisheye,
    Fisheye624    => fisheye624::Fisheye624,
}

impl Serialize for DistortionModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}
impl<'de> Deserialize<'de> for DistortionModel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        Self::from_id(&id).ok_or_else(|| serde::de::Error::custom(format!("Unknown camera model: {id}")))
    }
}

/// Newton iteration for `theta * (1 + k0*theta^2 + k1*theta^4 + ...) = theta_d`, shared by the Kannala-Brandt style models.
pub(crate) fn solve_theta(theta_d: f64, k: &[f64]) -> Option<f64> {
    const EPS: f64 = 1e-10;

    // the model is only valid up to 180 FOV
    let theta_d = theta_d.clamp(-std::f64::consts::PI, std::f64::consts::PI);
    if theta_d.abs() <= EPS { return Some(theta_d); }

    let mut theta = theta_d;
    for _ in 0..20 {
        let theta2 = theta * theta;
        let mut poly = 1.0;
        let mut deriv = 1.0;
        let mut pow = theta2;
        for (i, ki) in k.iter().enumerate() {
            poly  += ki * pow;
            deriv += (2 * i + 3) as f64 * ki * pow;
            pow *= theta2;
        }
        let theta_fix = ((theta * poly - theta_d) / deriv).clamp(-0.9, 0.9);
        theta -= theta_fix;
        if theta_fix.abs() < EPS {
            // theta has flipped, it converged to the opposite side of the camera center
            if (theta_d < 0.0 && theta > 0.0) || (theta_d > 0.0 && theta < 0.0) { return None; }
            return Some(theta);
        }
    }
    None
}
