// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2021-2022 Adrian <adrian.eddy at gmail>

use nalgebra::Vector4;

pub trait PixelType: Default + Copy + Send + Sync + bytemuck::Pod {
    const COUNT: usize = 1;
    type Scalar: Default + bytemuck::Pod;

    fn to_float(v: Self) -> Vector4<f32>;
    fn from_float(v: Vector4<f32>) -> Self;
}

#[inline]
fn saturate_u8(v: f32) -> u8 { v.round().clamp(0.0, 255.0) as u8 }

#[derive(Default, Clone, Copy, PartialEq, PartialOrd, Debug)] #[repr(C)] pub struct Luma8(pub u8);
#[derive(Default, Clone, Copy, PartialEq, PartialOrd, Debug)] #[repr(C)] pub struct RGB8(pub u8, pub u8, pub u8);

unsafe impl bytemuck::Zeroable for Luma8 { }
unsafe impl bytemuck::Pod for Luma8 { }
impl PixelType for Luma8 {
    const COUNT: usize = 1;
    type Scalar = u8;
    #[inline] fn to_float(v: Self) -> Vector4<f32> { Vector4::new(v.0 as f32, 0.0, 0.0, 0.0) }
    #[inline] fn from_float(v: Vector4<f32>) -> Self { Self(saturate_u8(v[0])) }
}
unsafe impl bytemuck::Zeroable for RGB8 { }
unsafe impl bytemuck::Pod for RGB8 { }
impl PixelType for RGB8 {
    const COUNT: usize = 3;
    type Scalar = u8;
    #[inline] fn to_float(v: Self) -> Vector4<f32> { Vector4::new(v.0 as f32, v.1 as f32, v.2 as f32, 0.0) }
    #[inline] fn from_float(v: Vector4<f32>) -> Self { Self(saturate_u8(v[0]), saturate_u8(v[1]), saturate_u8(v[2])) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_float_saturates() {
        let px = RGB8::from_float(Vector4::new(-3.0, 127.6, 300.0, 0.0));
        assert_eq!(px, RGB8(0, 128, 255));
        assert_eq!(Luma8::from_float(Luma8::to_float(Luma8(77))), Luma8(77));
    }
}
