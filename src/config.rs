// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use getopts::Options;
use once_cell::sync::Lazy;

pub const DEFAULT_UI_APPS_CGROUP: &str = "uiapps";
pub const DEFAULT_DE_CGROUP: &str = "DE";

// Used when the configured sample period is not positive.
pub const FALLBACK_SAMPLE_PERIOD_SECS: i64 = 1;

/// Set to "1" to log the memory figures and limits of every cycle.
pub const DEBUG_BALANCE_ENV: &str = "DEBUG_SWAP_SCHED_BALANCE";

static DEBUG_BALANCE: Lazy<bool> =
    Lazy::new(|| std::env::var(DEBUG_BALANCE_ENV).map_or(false, |v| v == "1"));

pub fn debug_balance_enabled() -> bool {
    *DEBUG_BALANCE
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Cgroup of the user applications, relative to each controller root,
    /// e.g. "1@dde/uiapps". Every registered app gets a child group.
    pub ui_apps_cgroup: String,
    /// Cgroup of the desktop environment, e.g. "1@dde/DE".
    pub de_cgroup: String,
    /// Seconds between two balancing cycles.
    pub sample_period_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ui_apps_cgroup: DEFAULT_UI_APPS_CGROUP.to_string(),
            de_cgroup: DEFAULT_DE_CGROUP.to_string(),
            sample_period_secs: FALLBACK_SAMPLE_PERIOD_SECS,
        }
    }
}

impl Config {
    /// Replaces a non-positive sample period with the fallback.
    pub fn normalized(mut self) -> Self {
        if self.sample_period_secs <= 0 {
            self.sample_period_secs = FALLBACK_SAMPLE_PERIOD_SECS;
        }
        self
    }

    pub fn sample_period(&self) -> Duration {
        let secs = if self.sample_period_secs > 0 {
            self.sample_period_secs
        } else {
            FALLBACK_SAMPLE_PERIOD_SECS
        };
        Duration::from_secs(secs as u64)
    }
}

/// Parsed command line of the daemon.
#[derive(Debug, PartialEq, Eq)]
pub struct CommandLine {
    pub config: Config,
    pub verbosity: usize,
    pub show_help: bool,
}

pub fn options() -> Options {
    let mut opts = Options::new();
    opts.optopt(
        "u",
        "uiapps",
        "Cgroup of the user applications",
        DEFAULT_UI_APPS_CGROUP,
    );
    opts.optopt("d", "de", "Cgroup of the desktop environment", DEFAULT_DE_CGROUP);
    opts.optopt("p", "period", "Seconds between two balancing cycles", "SECS");
    opts.optflagmulti("v", "verbose", "Log more, repeat for even more");
    opts.optflag("h", "help", "Print this help text");
    opts
}

pub fn parse_args(args: &[String]) -> Result<CommandLine> {
    let matches = options()
        .parse(args)
        .context("Failed to parse arguments")?;

    let mut config = Config::default();
    if let Some(path) = matches.opt_str("u") {
        config.ui_apps_cgroup = path;
    }
    if let Some(path) = matches.opt_str("d") {
        config.de_cgroup = path;
    }
    if let Some(period) = matches.opt_str("p") {
        config.sample_period_secs = period
            .parse()
            .with_context(|| format!("Couldn't parse \"{}\" as a sample period", period))?;
    }

    Ok(CommandLine {
        config: config.normalized(),
        verbosity: matches.opt_count("v"),
        show_help: matches.opt_present("h"),
    })
}
