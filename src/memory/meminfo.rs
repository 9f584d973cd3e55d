// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs::File;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;

use super::KIB;

/// System-wide memory figures from /proc/meminfo, in bytes.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemMemory {
    /// MemAvailable.
    pub available: u64,
    /// SwapTotal - SwapFree.
    pub swap_used: u64,
}

impl SystemMemory {
    /// Load <proc_root>/meminfo and parse it.
    pub fn load(proc_root: &Path) -> io::Result<Self> {
        let reader = File::open(proc_root.join("meminfo"))?;
        let reader = BufReader::new(reader);
        Self::parse(reader)
    }

    fn parse<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut available_kb = 0;
        let mut swap_total_kb = 0;
        let mut swap_free_kb = 0;
        for line in reader.lines() {
            let line = line?;
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            let field = match key {
                "MemAvailable:" => &mut available_kb,
                "SwapTotal:" => &mut swap_total_kb,
                "SwapFree:" => &mut swap_free_kb,
                _ => continue,
            };
            *field = tokens
                .next()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
        }
        Ok(SystemMemory {
            available: available_kb.saturating_mul(KIB),
            swap_used: swap_total_kb.saturating_sub(swap_free_kb).saturating_mul(KIB),
        })
    }
}
