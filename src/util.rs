// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2022 Adrian <adrian.eddy at gmail>

use std::path::Path;
use simplelog::*;

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Terminal logger plus a debug log file in `log_dir`, falling back to the current directory.
pub fn init_logging(log_dir: &Path, verbose: bool) {
    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Warn)
        .set_time_format_rfc3339()
        .build();

    let term_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(term_level, config.clone(), TerminalMode::Mixed, ColorChoice::Auto)];

    let file_name = format!("aria-extract-{}.log", chrono::Local::now().format("%Y%m%d-%H%M%S"));
    let file = std::fs::create_dir_all(log_dir)
        .and_then(|_| std::fs::File::create(log_dir.join(&file_name)))
        .or_else(|_| std::fs::File::create(&file_name));
    match file {
        Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, config, file)),
        Err(e) => eprintln!("Failed to create log file {file_name}: {e}"),
    }

    let _ = CombinedLogger::init(loggers);
}
