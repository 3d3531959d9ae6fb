// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2021-2022 Adrian <adrian.eddy at gmail>

mod ffmpeg_video;
pub mod ffmpeg_processor;

pub use self::ffmpeg_processor::{ VideoEncoder, FFmpegError };
use aria_extract_core::SinkError;
use aria_extract_core::assembler::{ VideoSink, VideoSinkFactory };
use ffmpeg_next::ffi;
use std::ffi::c_void;
use std::os::raw::c_char;
use std::path::Path;
use parking_lot::RwLock;

/// Opens one ffmpeg encoder per recording.
#[derive(Default)]
pub struct FfmpegSinkFactory;

impl VideoSinkFactory for FfmpegSinkFactory {
    fn open(&self, path: &Path, size: (usize, usize), fps: f64) -> Result<Box<dyn VideoSink>, SinkError> {
        Ok(Box::new(VideoEncoder::new(path, size, fps)?))
    }
}

pub fn init() -> Result<(), ffmpeg_next::Error> {
    ffmpeg_next::init()?;
    unsafe {
        ffi::av_log_set_level(ffi::AV_LOG_WARNING);
        ffi::av_log_set_callback(Some(ffmpeg_log));
    }
    Ok(())
}

pub fn fps_to_rational(fps: f64) -> ffmpeg_next::Rational {
    if fps.fract() > 0.1 {
        ffmpeg_next::Rational::new((fps * 1001.0).round() as i32, 1001)
    } else {
        ffmpeg_next::Rational::new(fps.round() as i32, 1)
    }
}

lazy_static::lazy_static! {
    static ref LAST_PREFIX: RwLock<i32> = RwLock::new(1);
}

#[cfg(not(any(target_os = "linux", all(target_os = "macos", target_arch = "x86_64"))))]
type VaList = ffi::va_list;
#[cfg(any(target_os = "linux", all(target_os = "macos", target_arch = "x86_64")))]
type VaList = *mut ffi::__va_list_tag;

#[allow(improper_ctypes_definitions)]
unsafe extern "C" fn ffmpeg_log(avcl: *mut c_void, level: i32, fmt: *const c_char, vl: VaList) {
    if level <= ffi::av_log_get_level() {
        let mut line = vec![0u8; 2048];
        let mut prefix: i32 = *LAST_PREFIX.read();

        let written = ffi::av_log_format_line2(avcl, level, fmt, vl, line.as_mut_ptr() as *mut c_char, line.len() as i32, &mut prefix);
        if written > 0 {
            line.resize((written as usize).min(line.len()), 0u8);
        }
        *LAST_PREFIX.write() = prefix;

        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end_matches(['\0', '\n']);
        match level {
            ffi::AV_LOG_PANIC | ffi::AV_LOG_FATAL | ffi::AV_LOG_ERROR => ::log::error!(target: "ffmpeg", "{line}"),
            ffi::AV_LOG_WARNING => ::log::warn!(target: "ffmpeg", "{line}"),
            _ => ::log::debug!(target: "ffmpeg", "{line}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_rational() {
        assert_eq!(fps_to_rational(30.0), ffmpeg_next::Rational::new(30, 1));
        assert_eq!(fps_to_rational(29.97), ffmpeg_next::Rational::new(30000, 1001));
    }
}
