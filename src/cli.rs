// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

use argh::FromArgs;
use std::collections::HashMap;
use std::path::{ Path, PathBuf };
use indicatif::{ ProgressBar, MultiProgress, ProgressState, ProgressStyle };

use aria_extract_core::{ discovery, ExtractionSettings, Pipeline };
use aria_extract_core::sensor_log::recording_name;
use crate::rendering::FfmpegSinkFactory;

/** aria-extract v0.1.0
Extracts corrected, rotated videos from head-mounted camera recordings
*/
#[derive(FromArgs, Debug)]
pub struct Opts {
    /// folder with recordings, searched recursively
    #[argh(positional)]
    pub input: Option<String>,

    /// apply lens undistortion, default: true
    #[argh(option, from_str_fn(parse_bool))]
    pub undistort: Option<bool>,

    /// apply color correction, default: true
    #[argh(option, from_str_fn(parse_bool))]
    pub color_correct: Option<bool>,

    /// apply devignetting, default: true
    #[argh(option, from_str_fn(parse_bool))]
    pub devignette: Option<bool>,

    /// output folder, default: <input>/extracted_videos
    #[argh(option, short = 'o')]
    pub output: Option<String>,

    /// folder with devignetting masks named <camera label>.png
    #[argh(option)]
    pub mask_folder: Option<String>,

    /// process only this recording file
    #[argh(option)]
    pub single: Option<String>,

    /// process only the smallest recording found
    #[argh(switch)]
    pub debug: bool,

    /// preset (file or content directly), eg. "{{ 'target_width': 640, 'stream_priority': ['camera-slam-left'] }}"
    #[argh(option)]
    pub preset: Option<String>,

    /// verbose logging
    #[argh(switch, short = 'v')]
    pub verbose: bool,

    /// print app version
    #[argh(switch)]
    pub version: bool,
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(format!("expected true or false, got {value}")),
    }
}

impl Opts {
    pub fn input_root(&self) -> PathBuf {
        PathBuf::from(self.input.as_deref().unwrap_or("."))
    }

    pub fn output_base(&self) -> PathBuf {
        match &self.output {
            Some(o) => PathBuf::from(o),
            None => self.input_root().join("extracted_videos"),
        }
    }

    /// Where the log file goes. `--version` only prints, so it writes nothing to disk.
    pub fn log_dir(&self) -> Option<PathBuf> {
        if self.version { None } else { Some(self.output_base()) }
    }

    /// Defaults, then the preset, then the command line.
    pub fn settings(&self) -> Result<ExtractionSettings, serde_json::Error> {
        let mut settings = match &self.preset {
            Some(preset) if !preset.is_empty() => {
                if preset.starts_with('{') {
                    ExtractionSettings::from_preset(&serde_json::from_str(&preset.replace('\'', "\""))?)?
                } else {
                    ExtractionSettings::load_preset(Path::new(preset))?
                }
            }
            _ => ExtractionSettings::default(),
        };
        if let Some(v) = self.undistort     { settings.corrections.undistort = v; }
        if let Some(v) = self.color_correct { settings.corrections.color_correct = v; }
        if let Some(v) = self.devignette    { settings.corrections.devignette = v; }
        if let Some(v) = &self.mask_folder  { settings.devignetting_mask_folder = Some(PathBuf::from(v)); }
        Ok(settings)
    }
}

pub fn parse() -> Opts {
    argh::from_env()
}

pub fn run(opts: Opts) -> Result<(), Box<dyn std::error::Error>> {
    if opts.version {
        println!("aria-extract v{}", crate::util::get_version());
        return Ok(());
    }

    let settings = opts.settings()?;
    let input = opts.input_root();
    let output_root = settings.output_root(&opts.output_base());

    crate::rendering::init()?;

    log::info!("Input: {}", input.display());
    log::info!("Output: {}", output_root.display());
    log::info!("Corrections: undistort: {}, color_correct: {}, devignette: {}", settings.corrections.undistort, settings.corrections.color_correct, settings.corrections.devignette);
    if settings.corrections.devignette && settings.devignetting_mask_folder.is_none() {
        log::warn!("Devignetting is enabled but no mask folder was given, frames are not devignetted");
    }
    log::debug!("Settings: {}", serde_json::to_string(&settings)?);

    let recordings = if let Some(single) = &opts.single {
        vec![PathBuf::from(single)]
    } else {
        let found = discovery::find_recordings(&input, &settings.recording_suffix);
        if opts.debug {
            let smallest = discovery::smallest(&found);
            if let Some(s) = &smallest { log::info!("[DEBUG] Processing smallest recording: {}", s.display()); }
            smallest.into_iter().collect()
        } else {
            found
        }
    };
    if recordings.is_empty() {
        log::warn!("No recordings found in {}", input.display());
        return Ok(());
    }
    log::info!("Recordings: {:?}", recordings);

    let m = MultiProgress::new();
    let sty = ProgressStyle::with_template("[{bar:50.cyan/blue}] {pos:>5}/{len:5} {eta:11} {prefix:.magenta}\x1B[37;1m{msg}\x1B[0m")?
        .with_key("eta", |state: &ProgressState, w: &mut dyn std::fmt::Write| { let _ = write!(w, "ETA {:.1}s", state.eta().as_secs_f64()); })
        .progress_chars("#>-");
    let mut pbs: HashMap<String, ProgressBar> = HashMap::new();

    let factory = FfmpegSinkFactory;
    let pipeline = Pipeline::new(&settings, &factory);
    let summary = pipeline.run(&recordings, &output_root, &mut |name, current, total| {
        let pb = pbs.entry(name.to_owned()).or_insert_with(|| {
            let pb = m.add(ProgressBar::new(total as u64));
            pb.set_style(sty.clone());
            pb.set_message(name.to_owned());
            pb
        });
        pb.set_position(current as u64);
        if current == total {
            pb.finish_with_message(format!("\x1B[1;32m{}\x1B[0m", name)); // Green
        }
    })?;

    for (path, e) in &summary.skipped {
        let name = recording_name(path, &settings.recording_suffix);
        if let Some(pb) = pbs.get(&name) {
            pb.abandon_with_message(format!("\x1B[1;31m{}\x1B[0m", name)); // Red
        }
        log::warn!("Skipped {}: {}", path.display(), e);
    }
    log::info!("Processed {} of {} recordings", summary.processed.len(), recordings.len());
    Ok(())
}
