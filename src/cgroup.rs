// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Access to the cgroup v1 `memory` and `freezer` hierarchies.

use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::BufRead;
use std::path::Path;
use std::path::PathBuf;

use log::warn;

pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

const CGROUP_PROCESSES_FILE: &str = "cgroup.procs";
const FREEZER_STATE_FILE: &str = "freezer.state";
const MEMORY_SOFT_LIMIT_FILE: &str = "memory.soft_limit_in_bytes";
const MEMORY_HARD_LIMIT_FILE: &str = "memory.limit_in_bytes";
const MEMORY_STAT_FILE: &str = "memory.stat";

/// Error while touching the cgroup filesystem.
#[derive(Debug)]
pub enum Error {
    Create(PathBuf, io::Error),
    Remove(PathBuf, io::Error),
    Read(PathBuf, io::Error),
    Write(PathBuf, io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Create(_, e) | Self::Remove(_, e) | Self::Read(_, e) | Self::Write(_, e) => {
                Some(e)
            }
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create(path, e) => write!(f, "create cgroup {:?}: {}", path, e),
            Self::Remove(path, e) => write!(f, "remove cgroup {:?}: {}", path, e),
            Self::Read(path, e) => write!(f, "read {:?}: {}", path, e),
            Self::Write(path, e) => write!(f, "write {:?}: {}", path, e),
        }
    }
}

/// Cgroup controllers managed by swapsched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Controller {
    Memory,
    Freezer,
}

impl Controller {
    /// Directory name of the controller under the cgroup mount root.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Freezer => "freezer",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreezerState {
    Frozen,
    Thawed,
}

impl FreezerState {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Frozen => "FROZEN",
            Self::Thawed => "THAWED",
        }
    }
}

/// Handle to a cgroup mount root.
///
/// Group names are relative paths below `<root>/<controller>/`. A leading
/// `/` in a group name is ignored.
#[derive(Clone, Debug)]
pub struct CgroupFs {
    root: PathBuf,
}

impl Default for CgroupFs {
    fn default() -> Self {
        Self::new(CGROUP_ROOT)
    }
}

impl CgroupFs {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        CgroupFs { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory backing `group` in `controller`.
    pub fn group_path(&self, controller: Controller, group: &str) -> PathBuf {
        self.root
            .join(controller.name())
            .join(group.trim_start_matches('/'))
    }

    /// Creates the group directory. An existing directory is not an error.
    pub fn create_group(&self, controller: Controller, group: &str) -> Result<()> {
        let path = self.group_path(controller, group);
        fs::create_dir_all(&path).map_err(|e| Error::Create(path, e))
    }

    /// Removes the group directory. Fails if it is missing or still has members.
    pub fn delete_group(&self, controller: Controller, group: &str) -> Result<()> {
        let path = self.group_path(controller, group);
        fs::remove_dir(&path).map_err(|e| Error::Remove(path, e))
    }

    pub fn read_control_file(
        &self,
        controller: Controller,
        group: &str,
        file_name: &str,
    ) -> Result<Vec<u8>> {
        let path = self.group_path(controller, group).join(file_name);
        fs::read(&path).map_err(|e| Error::Read(path, e))
    }

    pub fn write_control_file<V: Display>(
        &self,
        controller: Controller,
        group: &str,
        file_name: &str,
        value: V,
    ) -> Result<()> {
        let path = self.group_path(controller, group).join(file_name);
        fs::write(&path, value.to_string()).map_err(|e| Error::Write(path, e))
    }

    pub fn set_freezer_state(&self, group: &str, state: FreezerState) -> Result<()> {
        self.write_control_file(
            Controller::Freezer,
            group,
            FREEZER_STATE_FILE,
            state.as_str(),
        )
    }

    pub fn freeze(&self, group: &str) -> Result<()> {
        self.set_freezer_state(group, FreezerState::Frozen)
    }

    pub fn thaw(&self, group: &str) -> Result<()> {
        self.set_freezer_state(group, FreezerState::Thawed)
    }

    /// Freezes `group` until the returned guard is dropped.
    ///
    /// A failed freeze is logged and the guard still thaws on drop.
    pub fn scoped_freeze<'a>(&'a self, group: &'a str) -> ScopedFreeze<'a> {
        if let Err(e) = self.freeze(group) {
            warn!("Failed to freeze {}: {}", group, e);
        }
        ScopedFreeze { cgroups: self, group }
    }

    /// Process ids in the memory controller's `cgroup.procs`. An unreadable
    /// file yields no members.
    pub fn list_member_pids(&self, group: &str) -> Vec<u32> {
        match self.read_control_file(Controller::Memory, group, CGROUP_PROCESSES_FILE) {
            Ok(content) => parse_pids(&content),
            Err(_) => Vec::new(),
        }
    }

    /// Moves `pid` into `group` in both controllers.
    pub fn add_process(&self, group: &str, pid: u32) -> Result<()> {
        for controller in [Controller::Memory, Controller::Freezer] {
            self.write_control_file(controller, group, CGROUP_PROCESSES_FILE, pid)?;
        }
        Ok(())
    }

    pub fn set_soft_limit(&self, group: &str, bytes: u64) -> Result<()> {
        self.write_control_file(Controller::Memory, group, MEMORY_SOFT_LIMIT_FILE, bytes)
    }

    pub fn set_hard_limit(&self, group: &str, bytes: u64) -> Result<()> {
        self.write_control_file(Controller::Memory, group, MEMORY_HARD_LIMIT_FILE, bytes)
    }

    /// Looks up `keys` in the group's `memory.stat`. Keys that are missing
    /// from the file are absent from the result; unparsable values are 0.
    pub fn memory_stat(&self, group: &str, keys: &[&str]) -> HashMap<String, u64> {
        match self.read_control_file(Controller::Memory, group, MEMORY_STAT_FILE) {
            Ok(content) => parse_memory_stat(content.as_slice(), keys),
            Err(_) => HashMap::new(),
        }
    }
}

/// Thaws its group when dropped.
pub struct ScopedFreeze<'a> {
    cgroups: &'a CgroupFs,
    group: &'a str,
}

impl Drop for ScopedFreeze<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.cgroups.thaw(self.group) {
            warn!("Failed to thaw {}: {}", self.group, e);
        }
    }
}

fn parse_pids(content: &[u8]) -> Vec<u32> {
    String::from_utf8_lossy(content)
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .filter(|pid| *pid != 0)
        .collect()
}

fn parse_memory_stat<R: BufRead>(reader: R, keys: &[&str]) -> HashMap<String, u64> {
    let mut result = HashMap::new();
    if keys.is_empty() {
        return result;
    }
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            continue;
        };
        if !keys.contains(&name) {
            continue;
        }
        let value = tokens
            .next()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        result.insert(name.to_string(), value);
        if result.len() >= keys.len() {
            break;
        }
    }
    result
}
