// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

use std::path::{ Path, PathBuf };
use walkdir::WalkDir;

/// All recordings under `root`, in a stable order.
pub fn find_recordings(root: &Path, suffix: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root).follow_links(true).into_iter()
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(e) => { log::warn!("Can't scan {}: {e}", e.path().map(|x| x.display().to_string()).unwrap_or_default()); None }
        })
        .filter(|e| e.file_type().is_file() && e.file_name().to_string_lossy().ends_with(suffix))
        .map(|e| e.into_path())
        .collect();
    found.sort_by(|a, b| human_sort::compare(&a.to_string_lossy(), &b.to_string_lossy()));
    found
}

/// The recording with the smallest file size, used for quick debug runs.
pub fn smallest(recordings: &[PathBuf]) -> Option<PathBuf> {
    recordings.iter()
        .filter_map(|p| std::fs::metadata(p).ok().map(|m| (m.len(), p)))
        .min_by_key(|(size, _)| *size)
        .map(|(_, p)| p.clone())
}
