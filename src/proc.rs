// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt::Display;
use std::fs::File;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;

use crate::memory::KIB;

pub const PROC_ROOT: &str = "/proc";

/// Error of parsing /proc/pid/status
#[derive(Debug)]
pub enum Error {
    NotFound(u32),
    Io(io::Error),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Io(e) => Some(e),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(pid) => f.write_fmt(format_args!("/proc/{pid}/status is not found")),
            Self::Io(e) => f.write_fmt(format_args!("procfs: {e}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Swap in use by the process in bytes, from the VmSwap field of
/// /proc/pid/status. Processes without the field (kernel threads) report 0.
pub fn load_swap_bytes(proc_root: &Path, pid: u32) -> Result<u64> {
    let path = proc_root.join(pid.to_string()).join("status");
    let file = File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::NotFound(pid)
        } else {
            Error::Io(e)
        }
    })?;
    parse_swap_kb(BufReader::with_capacity(1024, file)).map(|kb: u64| kb.saturating_mul(KIB))
}

/// Sums the swap usage of `pids`. Processes that exited or cannot be read
/// count as 0.
pub fn processes_swap_usage(proc_root: &Path, pids: &[u32]) -> u64 {
    pids.iter()
        .map(|pid| load_swap_bytes(proc_root, *pid).unwrap_or(0))
        .fold(0u64, |sum, v| sum.saturating_add(v))
}

fn parse_swap_kb<R: BufRead>(reader: R) -> Result<u64> {
    const SWAP_TAG: &str = "VmSwap:";
    for line in reader.lines() {
        let line = line.map_err(Error::Io)?;
        if let Some(value) = line.strip_prefix(SWAP_TAG) {
            return Ok(value
                .split_whitespace()
                .next()
                .and_then(|kb| kb.parse().ok())
                .unwrap_or(0));
        }
    }
    Ok(0)
}
