// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright © 2021-2022 Adrian <adrian.eddy at gmail>

pub mod util;
pub mod rendering;
mod cli;

fn main() {
    let opts = cli::parse();

    if let Some(log_dir) = opts.log_dir() {
        util::init_logging(&log_dir, opts.verbose);
        log_panics::init();
    }

    if let Err(e) = cli::run(opts) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
