// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;

use log::debug;
use log::warn;

use crate::cgroup;
use crate::cgroup::CgroupFs;
use crate::cgroup::Controller;

// memory.stat counters summed into the resident usage of an app.
const RSS_STAT: &str = "total_rss";
const CACHE_STAT: &str = "total_cache";

/// Identifies a registered app. It is also the name of the app's cgroup under
/// the UI apps group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppId(pub u64);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A process group of one user facing application, backed by a memory and a
/// freezer cgroup.
///
/// `pids` and the resident usage are only updated by [TrackedApp::refresh].
#[derive(Debug)]
pub struct TrackedApp {
    id: AppId,
    cgroup: String,
    desktop_id: String,
    hard_limit: u64,
    pids: Vec<u32>,
    resident_bytes: u64,
}

impl TrackedApp {
    /// Creates the cgroups of the app and sets its hard limit. A `hard_limit`
    /// of 0 leaves the kernel default in place.
    pub(crate) fn new(
        cgroups: &CgroupFs,
        id: AppId,
        cgroup: String,
        desktop_id: &str,
        hard_limit: u64,
    ) -> cgroup::Result<Self> {
        cgroups.create_group(Controller::Memory, &cgroup)?;
        cgroups.create_group(Controller::Freezer, &cgroup)?;

        if hard_limit > 0 {
            if let Err(e) = cgroups.set_hard_limit(&cgroup, hard_limit) {
                warn!("Failed to set hard limit of {}: {}", desktop_id, e);
            }
        }

        Ok(TrackedApp {
            id,
            cgroup,
            desktop_id: desktop_id.to_string(),
            hard_limit,
            pids: Vec::new(),
            resident_bytes: 0,
        })
    }

    pub fn id(&self) -> AppId {
        self.id
    }

    /// Cgroup of the app relative to the controller roots.
    pub fn cgroup(&self) -> &str {
        &self.cgroup
    }

    pub fn desktop_id(&self) -> &str {
        &self.desktop_id
    }

    pub fn hard_limit(&self) -> u64 {
        self.hard_limit
    }

    /// Member processes seen by the last refresh.
    pub fn pids(&self) -> &[u32] {
        &self.pids
    }

    /// Resident usage in bytes seen by the last refresh.
    pub fn resident_bytes(&self) -> u64 {
        self.resident_bytes
    }

    /// Re-reads the member processes and the resident usage of the group.
    pub fn refresh(&mut self, cgroups: &CgroupFs) {
        self.pids = cgroups.list_member_pids(&self.cgroup);
        let stat = cgroups.memory_stat(&self.cgroup, &[RSS_STAT, CACHE_STAT]);
        self.resident_bytes = stat.values().fold(0u64, |sum, v| sum.saturating_add(*v));
    }

    /// Whether the last refresh found any member process.
    pub fn is_live(&self) -> bool {
        !self.pids.is_empty()
    }

    pub fn set_resident_limit(&self, cgroups: &CgroupFs, bytes: u64) -> cgroup::Result<()> {
        cgroups.set_soft_limit(&self.cgroup, bytes)
    }

    /// Best effort removal of the cgroups of an app whose processes are gone.
    pub(crate) fn release(self, cgroups: &CgroupFs) {
        for controller in [Controller::Memory, Controller::Freezer] {
            if let Err(e) = cgroups.delete_group(controller, &self.cgroup) {
                debug!("Keeping cgroup of {}: {}", self, e);
            }
        }
    }
}

impl fmt::Display for TrackedApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.desktop_id, self.cgroup)
    }
}
