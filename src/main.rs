// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use log::info;
use swapsched::config;
use swapsched::Dispatcher;
use tokio::runtime::Builder;

const IDENT: &str = "swapsched";

fn print_usage() {
    let brief = format!(
        "Usage: {} [options]\n\
         Caps the memory of background applications so they are swapped out first.\n\
         Set {}=1 to log the limits of every cycle.",
        IDENT,
        config::DEBUG_BALANCE_ENV
    );
    println!("{}", config::options().usage(&brief));
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cmd = config::parse_args(&args)?;
    if cmd.show_help {
        print_usage();
        return Ok(());
    }

    // The default log level is info, each -v adds one level.
    stderrlog::new()
        .module(module_path!())
        .verbosity(cmd.verbosity + 2)
        .init()
        .context("Failed to initialize logging")?;

    info!("Starting {}", IDENT);

    // Shared with the session layer that registers apps and reports focus.
    let dispatcher = Arc::new(Dispatcher::new(cmd.config).context("Failed to set up cgroups")?);

    let rt = Builder::new_current_thread().enable_all().build()?;
    rt.block_on(dispatcher.run());

    Ok(())
}
