// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Fake cgroup and proc trees for tests.

use std::fs;
use std::path::Path;

use crate::memory::KIB;

/// Writes `pids` to the memory controller's cgroup.procs of `group`.
pub fn write_procs(cgroup_root: &Path, group: &str, pids: &[u32]) {
    let content: String = pids.iter().map(|pid| format!("{}\n", pid)).collect();
    fs::write(
        cgroup_root.join("memory").join(group).join("cgroup.procs"),
        content,
    )
    .unwrap();
}

/// Writes a memory.stat with the given total_rss and total_cache in bytes.
pub fn write_memory_stat(cgroup_root: &Path, group: &str, rss: u64, cache: u64) {
    let content = format!(
        "cache 0\nrss 0\nrss_huge 0\nmapped_file 0\ntotal_cache {}\ntotal_rss {}\ntotal_rss_huge 0\n",
        cache, rss
    );
    fs::write(
        cgroup_root.join("memory").join(group).join("memory.stat"),
        content,
    )
    .unwrap();
}

/// Reads a control file of `group` as a string.
pub fn read_control(cgroup_root: &Path, controller: &str, group: &str, file_name: &str) -> String {
    fs::read_to_string(cgroup_root.join(controller).join(group).join(file_name)).unwrap()
}

/// Writes <proc_root>/meminfo with values in bytes.
pub fn write_meminfo(proc_root: &Path, available: u64, swap_total: u64, swap_free: u64) {
    let content = format!(
        "MemTotal:        8025656 kB\n\
         MemFree:         1024000 kB\n\
         MemAvailable:    {} kB\n\
         SwapCached:            0 kB\n\
         SwapTotal:       {} kB\n\
         SwapFree:        {} kB\n",
        available / KIB,
        swap_total / KIB,
        swap_free / KIB
    );
    fs::create_dir_all(proc_root).unwrap();
    fs::write(proc_root.join("meminfo"), content).unwrap();
}

/// Writes <proc_root>/<pid>/status with the given VmSwap in kB.
pub fn write_status(proc_root: &Path, pid: u32, swap_kb: u64) {
    let dir = proc_root.join(pid.to_string());
    fs::create_dir_all(&dir).unwrap();
    let content = format!(
        "Name:   app\nState:  S (sleeping)\nPid:    {}\nVmRSS:    1024 kB\nVmSwap:   {} kB\n",
        pid, swap_kb
    );
    fs::write(dir.join("status"), content).unwrap();
}
