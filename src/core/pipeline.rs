// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

use std::path::{ Path, PathBuf };
use std::time::Instant;

use crate::acquisition::{ Acquisition, DevignettingMask };
use crate::assembler::{ VideoAssembler, VideoSinkFactory };
use crate::calibration::{ CalibrationError, CameraCalibration };
use crate::error::{ PipelineError, RecordingError, Stage };
use crate::metadata::OutputRecord;
use crate::orientation;
use crate::sensor_log::{ FolderSensorLog, SensorLog, StreamId };
use crate::settings::ExtractionSettings;
use crate::undistortion::{ FrameCorrector, RemapTable };

/// Everything needed to correct the frames of one stream, resolved once before the first frame.
pub struct StreamSetup {
    pub stream: StreamId,
    pub label: String,
    pub frame_count: usize,
    pub corrector: FrameCorrector,
}

/// First label of `priority` that exists in the log.
pub fn select_stream(log: &dyn SensorLog, priority: &[String]) -> Result<(StreamId, String), PipelineError> {
    priority.iter()
        .find_map(|label| log.stream_id(label).map(|id| (id, label.clone())))
        .ok_or_else(|| PipelineError::StreamNotFound(priority.to_vec()))
}

pub fn resolve_stream(log: &dyn SensorLog, settings: &ExtractionSettings) -> Result<StreamSetup, RecordingError> {
    let (stream, label) = select_stream(log, &settings.stream_priority).map_err(|e| RecordingError::new(Stage::ResolveStream, e))?;
    let frame_count = log.frame_count(stream);
    if frame_count == 0 {
        return Err(RecordingError::new(Stage::ResolveStream, PipelineError::EmptyStream(label)));
    }
    log::info!("{}: using stream {label} ({frame_count} frames)", log.name());

    let corrector = resolve_corrector(log, &label, settings).map_err(|e| RecordingError::new(Stage::ResolveCalibration, e))?;
    Ok(StreamSetup { stream, label, frame_count, corrector })
}

fn resolve_corrector(log: &dyn SensorLog, label: &str, settings: &ExtractionSettings) -> Result<FrameCorrector, PipelineError> {
    let corrections = settings.corrections;
    let mut acquisition = Acquisition::default();

    if corrections.devignette {
        if let Some(folder) = &settings.devignetting_mask_folder {
            let path = DevignettingMask::mask_path(folder, label);
            if path.exists() {
                acquisition.devignetting = Some(DevignettingMask::load(&path).map_err(|source| PipelineError::MaskUnavailable { path, source })?);
            } else {
                log::warn!("{}: no devignetting mask for {label} at {}, frames are not devignetted", log.name(), path.display());
            }
        }
    }
    if corrections.color_correct {
        acquisition.color_gains = log.camera_calibration(label).and_then(|c| c.color_gains);
    }

    let remap = if corrections.undistort {
        let source = log.camera_calibration(label).ok_or_else(|| CalibrationError::MissingCalibration(label.to_owned()))?;
        let target = CameraCalibration::linear(settings.target_width, settings.target_height, settings.target_focal, label)?;
        let table = RemapTable::new(&source, &target);
        log::info!("{}: undistorting {} -> {} (focal {}), {} of {} pixels valid",
            log.name(), source.summary(), target.summary(), settings.target_focal, table.valid_count(), target.width() * target.height());
        Some(table)
    } else {
        None
    };

    Ok(FrameCorrector { acquisition, remap })
}

pub struct Pipeline<'a> {
    pub settings: &'a ExtractionSettings,
    pub sink_factory: &'a dyn VideoSinkFactory,
}

#[derive(Default, Debug)]
pub struct RunSummary {
    pub processed: Vec<OutputRecord>,
    pub skipped: Vec<(PathBuf, RecordingError)>,
}

impl<'a> Pipeline<'a> {
    pub fn new(settings: &'a ExtractionSettings, sink_factory: &'a dyn VideoSinkFactory) -> Self {
        Self { settings, sink_factory }
    }

    /// Processes one recording into `out_dir`. On failure nothing of this recording is left in `out_dir`.
    pub fn process_recording(&self, log: &dyn SensorLog, out_dir: &Path, progress: &mut dyn FnMut(usize, usize)) -> Result<OutputRecord, RecordingError> {
        log::debug!("{}: reading {}", log.name(), log.path().display());
        let setup = resolve_stream(log, self.settings)?;
        let count = setup.frame_count;

        let mut assembler = VideoAssembler::begin(self.sink_factory, out_dir, log.name(), count, self.settings.fps, self.settings.corrections)
            .map_err(|e| RecordingError::new(Stage::PrepareOutput, e))?;

        for index in 0..count {
            let result = setup.corrector.correct(log, setup.stream, index)
                .map(orientation::normalize)
                .and_then(|frame| assembler.push(frame));
            if let Err(e) = result {
                assembler.discard();
                return Err(RecordingError::new(Stage::ProcessFrame(index), e));
            }
            progress(index + 1, count);
        }

        let record = assembler.finish().map_err(|e| RecordingError::new(Stage::Finalize, e))?;
        log::info!("{}: wrote {} frames of {} at {}x{} to {}", log.name(), record.frame_count, setup.label, record.resolution.width, record.resolution.height, record.video_path);
        Ok(record)
    }

    /// Processes every recording in order. A failing recording is logged and skipped,
    /// only an unusable output root stops the run.
    pub fn run(&self, recordings: &[PathBuf], output_root: &Path, progress: &mut dyn FnMut(&str, usize, usize)) -> Result<RunSummary, PipelineError> {
        std::fs::create_dir_all(output_root).map_err(|source| PipelineError::Environment { path: output_root.to_path_buf(), source })?;

        let started = Instant::now();
        let mut summary = RunSummary::default();
        for path in recordings {
            log::info!("Processing {}", path.display());
            let result = FolderSensorLog::open(path, &self.settings.recording_suffix)
                .map_err(|e| RecordingError::new(Stage::Open, PipelineError::InvalidRecording(e)))
                .and_then(|log| {
                    let out_dir = output_root.join(log.name());
                    let name = log.name().to_owned();
                    self.process_recording(&log, &out_dir, &mut |current, total| progress(&name, current, total))
                });
            match result {
                Ok(record) => summary.processed.push(record),
                Err(e) => {
                    log::error!("Skipping {} at {}: {}", path.display(), e.stage, e.source);
                    summary.skipped.push((path.clone(), e));
                }
            }
        }
        log::info!("Done in {:.2}s: {} processed, {} skipped", started.elapsed().as_secs_f64(), summary.processed.len(), summary.skipped.len());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::tests::MemorySinkFactory;
    use crate::assembler::thumbnail_path;
    use crate::frame::{ Frame, PixelFormat };
    use crate::metadata::{ Resolution, METADATA_FILENAME };
    use crate::sensor_log::SensorLogError;
    use crate::settings::CorrectionConfig;
    use std::collections::BTreeMap;
    use test_case::test_case;

    struct MemorySensorLog {
        name: String,
        streams: Vec<(String, Vec<Frame>)>,
        cameras: BTreeMap<String, CameraCalibration>,
        fail_at: Option<usize>,
    }
    impl MemorySensorLog {
        fn gray(name: &str, label: &str, count: usize, w: usize, h: usize) -> Self {
            let frames = (0..count).map(|i| Frame::from_raw(i, w, h, PixelFormat::Gray8, (0..w * h).map(|p| ((p * 3 + i * 40) % 256) as u8).collect()).unwrap()).collect();
            Self::with_frames(name, label, frames)
        }
        fn with_frames(name: &str, label: &str, frames: Vec<Frame>) -> Self {
            Self { name: name.into(), streams: vec![(label.into(), frames)], cameras: BTreeMap::new(), fail_at: None }
        }
        fn with_color_gains(mut self, label: &str, width: usize, height: usize, gains: [f32; 3]) -> Self {
            let mut calib = CameraCalibration::linear(width, height, 5.0, label).unwrap();
            calib.color_gains = Some(gains);
            self.cameras.insert(label.into(), calib);
            self
        }
    }
    impl SensorLog for MemorySensorLog {
        fn path(&self) -> &Path { Path::new("memory") }
        fn name(&self) -> &str { &self.name }
        fn stream_id(&self, label: &str) -> Option<StreamId> { self.streams.iter().position(|x| x.0 == label).map(StreamId) }
        fn frame_count(&self, stream: StreamId) -> usize { self.streams.get(stream.0).map(|x| x.1.len()).unwrap_or_default() }
        fn camera_calibration(&self, label: &str) -> Option<CameraCalibration> { self.cameras.get(label).cloned() }
        fn read_frame(&self, stream: StreamId, index: usize) -> Result<Frame, SensorLogError> {
            if Some(index) == self.fail_at {
                return Err(SensorLogError::InvalidManifest("corrupt frame".into()));
            }
            let frames = &self.streams.get(stream.0).ok_or(SensorLogError::StreamOutOfRange(stream))?.1;
            frames.get(index).cloned().ok_or(SensorLogError::FrameOutOfRange { index, count: frames.len() })
        }
    }

    fn no_corrections() -> ExtractionSettings {
        ExtractionSettings { corrections: CorrectionConfig { undistort: false, color_correct: false, devignette: false }, ..Default::default() }
    }

    fn acquisition_only(color_correct: bool, devignette: bool, mask_folder: Option<&Path>) -> ExtractionSettings {
        ExtractionSettings {
            corrections: CorrectionConfig { undistort: false, color_correct, devignette },
            devignetting_mask_folder: mask_folder.map(Path::to_path_buf),
            ..Default::default()
        }
    }

    // 2x1, comes out rotated as 1x2 with the same pixel order
    fn rgb_pair() -> Frame {
        Frame::from_raw(0, 2, 1, PixelFormat::Rgb8, vec![100, 100, 200, 100, 100, 200]).unwrap()
    }

    fn gray_pair() -> Frame {
        Frame::from_raw(0, 2, 1, PixelFormat::Gray8, vec![100, 200]).unwrap()
    }

    fn save_mask(folder: &Path, label: &str, values: Vec<u16>) {
        let img = image::ImageBuffer::<image::Luma<u16>, _>::from_raw(values.len() as u32, 1, values).unwrap();
        img.save(DevignettingMask::mask_path(folder, label)).unwrap();
    }

    #[test]
    fn devignetting_runs_before_color_gains() {
        let dir = tempfile::tempdir().unwrap();
        let masks = tempfile::tempdir().unwrap();
        save_mask(masks.path(), "camera-rgb", vec![32768, 65535]);
        let settings = acquisition_only(true, true, Some(masks.path()));
        let factory = MemorySinkFactory::default();
        let log = MemorySensorLog::with_frames("rgb", "camera-rgb", vec![rgb_pair()]).with_color_gains("camera-rgb", 2, 1, [1.5, 1.0, 0.5]);

        let record = Pipeline::new(&settings, &factory).process_recording(&log, dir.path(), &mut |_, _| {}).unwrap();
        assert!(record.devignette && record.color_correct);
        assert_eq!(record.resolution, Resolution { width: 1, height: 2 });
        // blue of the first pixel: 200 -> 255 by the mask, then 127.5 by the gain. The other order gives 200
        assert_eq!(factory.frames.lock()[0].data, vec![255, 200, 128, 150, 100, 100]);
    }

    #[test_case(true,  vec![150, 100, 100, 150, 100, 100]; "applied")]
    #[test_case(false, vec![100, 100, 200, 100, 100, 200]; "disabled")]
    fn color_correct_toggle(color_correct: bool, expected: Vec<u8>) {
        let dir = tempfile::tempdir().unwrap();
        let settings = acquisition_only(color_correct, false, None);
        let factory = MemorySinkFactory::default();
        let log = MemorySensorLog::with_frames("rgb", "camera-rgb", vec![rgb_pair()]).with_color_gains("camera-rgb", 2, 1, [1.5, 1.0, 0.5]);

        let record = Pipeline::new(&settings, &factory).process_recording(&log, dir.path(), &mut |_, _| {}).unwrap();
        assert_eq!(record.color_correct, color_correct);
        assert_eq!(factory.frames.lock()[0].data, expected);
    }

    #[test]
    fn color_gains_skip_gray_frames() {
        let dir = tempfile::tempdir().unwrap();
        let settings = acquisition_only(true, false, None);
        let factory = MemorySinkFactory::default();
        let log = MemorySensorLog::with_frames("slam", "camera-slam-left", vec![gray_pair()]).with_color_gains("camera-slam-left", 2, 1, [1.5, 1.0, 0.5]);

        Pipeline::new(&settings, &factory).process_recording(&log, dir.path(), &mut |_, _| {}).unwrap();
        assert_eq!(factory.frames.lock()[0].data, vec![100, 100, 100, 200, 200, 200]);
    }

    #[test]
    fn missing_mask_continues_without_devignetting() {
        let dir = tempfile::tempdir().unwrap();
        let masks = tempfile::tempdir().unwrap();
        save_mask(masks.path(), "camera-slam-right", vec![32768, 65535]);
        let settings = acquisition_only(false, true, Some(masks.path()));
        let factory = MemorySinkFactory::default();
        let log = MemorySensorLog::with_frames("slam", "camera-slam-left", vec![gray_pair()]);

        let record = Pipeline::new(&settings, &factory).process_recording(&log, dir.path(), &mut |_, _| {}).unwrap();
        assert!(record.devignette);
        assert_eq!(factory.frames.lock()[0].data, vec![100, 100, 100, 200, 200, 200]);
        assert!(dir.path().join(METADATA_FILENAME).exists());
    }

    #[test]
    fn unreadable_mask_skips_recording() {
        let dir = tempfile::tempdir().unwrap();
        let masks = tempfile::tempdir().unwrap();
        let mask = DevignettingMask::mask_path(masks.path(), "camera-rgb");
        std::fs::write(&mask, "not a png").unwrap();
        let settings = acquisition_only(false, true, Some(masks.path()));
        let factory = MemorySinkFactory::default();
        let log = MemorySensorLog::with_frames("rgb", "camera-rgb", vec![rgb_pair()]);

        let err = Pipeline::new(&settings, &factory).process_recording(&log, &dir.path().join("rgb"), &mut |_, _| {}).unwrap_err();
        assert_eq!(err.stage, Stage::ResolveCalibration);
        assert!(matches!(&err.source, PipelineError::MaskUnavailable { path, .. } if *path == mask));
        assert!(!dir.path().join("rgb").exists());
        assert!(factory.opened.lock().is_empty());
    }

    #[test]
    fn output_setup_failure_is_not_a_frame_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocked"), "").unwrap();
        let settings = no_corrections();
        let factory = MemorySinkFactory::default();
        let log = MemorySensorLog::gray("walk", "camera-rgb", 2, 8, 4);

        let err = Pipeline::new(&settings, &factory).process_recording(&log, &dir.path().join("blocked").join("walk"), &mut |_, _| {}).unwrap_err();
        assert_eq!(err.stage, Stage::PrepareOutput);
        assert!(matches!(err.source, PipelineError::WriteFailure { .. }));
    }

    #[test]
    fn five_gray_frames() {
        let dir = tempfile::tempdir().unwrap();
        let settings = no_corrections();
        let factory = MemorySinkFactory::default();
        let log = MemorySensorLog::gray("walk", "camera-slam-left", 5, 64, 48);

        let mut calls = Vec::new();
        let record = Pipeline::new(&settings, &factory).process_recording(&log, dir.path(), &mut |c, t| calls.push((c, t))).unwrap();

        assert_eq!(record.resolution, Resolution { width: 48, height: 64 });
        assert_eq!(record.frame_count, 5);
        assert_eq!(record.fps, 30.0);
        assert!(!record.undistort && !record.color_correct && !record.devignette);
        assert_eq!(calls, (1..=5).map(|c| (c, 5)).collect::<Vec<_>>());

        let written = factory.frames.lock().clone();
        assert_eq!(written.len(), 5);
        assert!(written.iter().enumerate().all(|(i, f)| f.index == i && f.size() == (48, 64) && f.format == PixelFormat::Rgb8));

        for (ordinal, frame_index) in [0, 2, 4].into_iter().enumerate() {
            let thumb = image::open(&record.thumbnails[ordinal]).unwrap();
            assert_eq!(thumb.color(), image::ColorType::Rgb8);
            assert_eq!(thumb.to_rgb8().into_raw(), written[frame_index].data);
        }
        assert_eq!(OutputRecord::load(&dir.path().join(METADATA_FILENAME)).unwrap(), record);
        assert_eq!(factory.opened.lock()[0].0, dir.path().join("walk.mp4"));
    }

    #[test]
    fn two_frames_share_middle_and_last_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let settings = no_corrections();
        let factory = MemorySinkFactory::default();
        let log = MemorySensorLog::gray("short", "camera-rgb", 2, 8, 4);
        let record = Pipeline::new(&settings, &factory).process_recording(&log, dir.path(), &mut |_, _| {}).unwrap();

        assert_eq!(record.thumbnails.len(), 3);
        let written = factory.frames.lock().clone();
        let thumbs: Vec<_> = record.thumbnails.iter().map(|t| image::open(t).unwrap().to_rgb8().into_raw()).collect();
        assert_eq!(thumbs[0], written[0].data);
        assert_eq!(thumbs[1], written[1].data);
        assert_eq!(thumbs[2], written[1].data);
    }

    #[test]
    fn undistort_uses_target_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ExtractionSettings { target_width: 40, target_height: 30, target_focal: 20.0, ..no_corrections() };
        let settings = ExtractionSettings { corrections: CorrectionConfig { undistort: true, ..settings.corrections }, ..settings };
        let factory = MemorySinkFactory::default();
        let mut log = MemorySensorLog::gray("walk", "camera-slam-right", 3, 64, 48);
        // calibrated at half the stored frame resolution
        let params = vec![30.0, 15.5, 11.5, 0.05, -0.01, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        log.cameras.insert("camera-slam-right".into(),
            CameraCalibration::new("camera-slam-right", crate::distortion_models::DistortionModel::from_id("Fisheye624").unwrap(), params, 32, 24).unwrap());

        let record = Pipeline::new(&settings, &factory).process_recording(&log, dir.path(), &mut |_, _| {}).unwrap();
        assert!(record.undistort);
        assert_eq!(record.resolution, Resolution { width: 30, height: 40 });
        assert_eq!(factory.opened.lock()[0].1, (30, 40));
        assert!(factory.frames.lock().iter().all(|f| f.size() == (30, 40)));
    }

    #[test]
    fn missing_calibration_skips_before_output() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ExtractionSettings::default();
        let factory = MemorySinkFactory::default();
        let log = MemorySensorLog::gray("walk", "camera-rgb", 3, 8, 8);
        let err = Pipeline::new(&settings, &factory).process_recording(&log, &dir.path().join("walk"), &mut |_, _| {}).unwrap_err();
        assert_eq!(err.stage, Stage::ResolveCalibration);
        assert!(matches!(err.source, PipelineError::CalibrationUnavailable(CalibrationError::MissingCalibration(_))));
        assert!(!dir.path().join("walk").exists());
    }

    #[test]
    fn stream_priority_order() {
        let mut log = MemorySensorLog::gray("walk", "camera-eyetracking", 1, 4, 4);
        log.streams.push(("camera-slam-left".into(), Vec::new()));
        let priority = ExtractionSettings::default().stream_priority;
        assert_eq!(select_stream(&log, &priority).unwrap(), (StreamId(1), "camera-slam-left".to_string()));
        assert!(matches!(select_stream(&log, &priority[..1]), Err(PipelineError::StreamNotFound(_))));
    }

    #[test]
    fn empty_stream_is_skipped() {
        let log = MemorySensorLog::gray("walk", "camera-rgb", 0, 4, 4);
        let err = resolve_stream(&log, &no_corrections()).err().unwrap();
        assert_eq!(err.stage, Stage::ResolveStream);
        assert!(matches!(err.source, PipelineError::EmptyStream(_)));
    }

    #[test]
    fn read_failure_discards_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let settings = no_corrections();
        let factory = MemorySinkFactory::default();
        let mut log = MemorySensorLog::gray("broken", "camera-rgb", 6, 8, 4);
        log.fail_at = Some(4);

        let err = Pipeline::new(&settings, &factory).process_recording(&log, dir.path(), &mut |_, _| {}).unwrap_err();
        assert_eq!(err.stage, Stage::ProcessFrame(4));
        assert!(matches!(err.source, PipelineError::FrameReadFailure { index: 4, .. }));
        assert!(!dir.path().join("broken.mp4").exists());
        assert!(!thumbnail_path(dir.path(), 0).exists());
        assert!(!dir.path().join(METADATA_FILENAME).exists());
    }

    #[test]
    fn write_failure_leaves_no_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let settings = no_corrections();
        let factory = MemorySinkFactory { fail_at: Some(2), ..Default::default() };
        let log = MemorySensorLog::gray("full", "camera-rgb", 5, 8, 4);

        let err = Pipeline::new(&settings, &factory).process_recording(&log, dir.path(), &mut |_, _| {}).unwrap_err();
        assert_eq!(err.stage, Stage::ProcessFrame(2));
        assert!(matches!(err.source, PipelineError::WriteFailure { .. }));
        assert!(!dir.path().join(METADATA_FILENAME).exists());
    }

    #[test]
    fn rerun_produces_identical_record() {
        let dir = tempfile::tempdir().unwrap();
        let settings = no_corrections();
        let log = MemorySensorLog::gray("again", "camera-rgb", 3, 8, 4);

        let first_factory = MemorySinkFactory::default();
        let first = Pipeline::new(&settings, &first_factory).process_recording(&log, dir.path(), &mut |_, _| {}).unwrap();
        let second_factory = MemorySinkFactory::default();
        let second = Pipeline::new(&settings, &second_factory).process_recording(&log, dir.path(), &mut |_, _| {}).unwrap();
        assert_eq!(first, second);
        assert_eq!(*first_factory.frames.lock(), *second_factory.frames.lock());
    }

    #[test]
    fn run_skips_bad_recordings_and_continues() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        crate::sensor_log::folder::tests::write_gray_frames(&input.path().join("good_frames"), 3, 10, 6);
        std::fs::write(input.path().join("good.recording.json"), r#"{ "streams": [ { "label": "camera-slam-left", "frames_dir": "good_frames" } ] }"#).unwrap();
        std::fs::write(input.path().join("bad.recording.json"), "not json").unwrap();
        std::fs::write(input.path().join("nostream.recording.json"), r#"{ "streams": [ { "label": "imu-left", "frames_dir": "good_frames" } ] }"#).unwrap();

        let settings = no_corrections();
        let factory = MemorySinkFactory::default();
        let recordings = crate::discovery::find_recordings(input.path(), &settings.recording_suffix);
        assert_eq!(recordings.len(), 3);

        let root = settings.output_root(output.path());
        let mut seen = Vec::new();
        let summary = Pipeline::new(&settings, &factory).run(&recordings, &root, &mut |name, c, t| seen.push((name.to_owned(), c, t))).unwrap();

        assert_eq!(summary.processed.len(), 1);
        assert_eq!(summary.processed[0].resolution, Resolution { width: 6, height: 10 });
        assert_eq!(summary.skipped.len(), 2);
        assert!(summary.skipped.iter().any(|(_, e)| e.stage == Stage::Open));
        assert!(summary.skipped.iter().any(|(_, e)| matches!(e.source, PipelineError::StreamNotFound(_))));
        assert!(root.join("good").join(METADATA_FILENAME).exists());
        assert_eq!(seen.last().unwrap(), &("good".to_string(), 3, 3));
    }
}
