// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use anyhow::Context;
use anyhow::Result;
use log::debug;
use log::info;
use log::warn;

use crate::app::AppId;
use crate::app::TrackedApp;
use crate::cgroup;
use crate::cgroup::CgroupFs;
use crate::cgroup::Controller;
use crate::config::debug_balance_enabled;
use crate::config::Config;
use crate::memory::MemInfo;
use crate::memory::SystemMemory;
use crate::memory::DE_HARD_LIMIT;
use crate::memory::MIB;
use crate::memory::MINIMUM_LIMIT;
use crate::proc::processes_swap_usage;
use crate::proc::PROC_ROOT;
use crate::sync::NoPoison;

const DE_DESKTOP_ID: &str = "desktop-environment";

// Registered apps are numbered from 1.
const DE_APP_ID: AppId = AppId(0);

/// Apps split by focus. An app is in at most one place at a time.
struct Partition {
    active: Option<TrackedApp>,
    inactive: Vec<TrackedApp>,
    de: TrackedApp,
    // Last focused window reported by the session, for diagnostics only.
    active_window: Option<u32>,
}

impl Partition {
    /// Makes `id` the active app. The previous active app goes to the front
    /// of the inactive apps; the order of the others is kept. An id that is
    /// not tracked leaves no app active.
    fn activate(&mut self, id: Option<AppId>) {
        if self.active.as_ref().map(TrackedApp::id) == id {
            return;
        }

        let mut inactive = Vec::with_capacity(self.inactive.len() + 1);
        inactive.extend(self.active.take());
        let mut target = None;
        for app in self.inactive.drain(..) {
            if Some(app.id()) == id {
                target = Some(app);
            } else {
                inactive.push(app);
            }
        }

        if let (None, Some(id)) = (&target, id) {
            debug!("App {} is not tracked, no app is active", id);
        }
        self.inactive = inactive;
        self.active = target;
    }
}

/// Owns the tracked apps and rebalances their memory limits periodically.
///
/// All methods take `&self`; registration and focus changes may come from
/// other threads while [Dispatcher::run] is looping. One lock covers the
/// whole balancing cycle and every change of the active/inactive partition.
pub struct Dispatcher {
    config: Config,
    cgroups: CgroupFs,
    proc_root: PathBuf,
    counter: AtomicU64,
    state: Mutex<Partition>,
}

impl Dispatcher {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_roots(config, CgroupFs::default(), PathBuf::from(PROC_ROOT))
    }

    /// Like [Dispatcher::new] with explicit cgroup and proc mount points.
    ///
    /// Creates the desktop environment cgroups and fails if the UI apps or
    /// desktop environment cgroups are not available.
    pub fn with_roots(config: Config, cgroups: CgroupFs, proc_root: PathBuf) -> Result<Self> {
        let config = config.normalized();
        let de = TrackedApp::new(
            &cgroups,
            DE_APP_ID,
            config.de_cgroup.clone(),
            DE_DESKTOP_ID,
            DE_HARD_LIMIT,
        )
        .with_context(|| format!("Failed to create cgroup {}", config.de_cgroup))?;

        for group in [&config.ui_apps_cgroup, &config.de_cgroup] {
            for controller in [Controller::Memory, Controller::Freezer] {
                let path = cgroups.group_path(controller, group);
                std::fs::metadata(&path)
                    .with_context(|| format!("Missing cgroup {}", path.display()))?;
            }
        }

        Ok(Dispatcher {
            config,
            cgroups,
            proc_root,
            counter: AtomicU64::new(0),
            state: Mutex::new(Partition {
                active: None,
                inactive: Vec::new(),
                de,
                active_window: None,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cgroups(&self) -> &CgroupFs {
        &self.cgroups
    }

    /// Cgroup the session puts desktop environment processes into.
    pub fn de_cgroup(&self) -> &str {
        &self.config.de_cgroup
    }

    /// Creates the cgroups of a new app under the UI apps cgroup. The app is
    /// not balanced until it is passed to [Dispatcher::add_app].
    pub fn register_app(&self, desktop_id: &str, hard_limit: u64) -> cgroup::Result<TrackedApp> {
        let id = AppId(self.counter.fetch_add(1, Ordering::Relaxed) + 1);
        let cgroup = format!(
            "{}/{}",
            self.config.ui_apps_cgroup.trim_end_matches('/'),
            id
        );
        TrackedApp::new(&self.cgroups, id, cgroup, desktop_id, hard_limit)
    }

    /// Starts balancing `app` as an inactive app.
    pub fn add_app(&self, app: TrackedApp) -> AppId {
        debug!("Dispatcher.add_app {}", app);
        let id = app.id();
        self.state.do_lock().inactive.push(app);
        id
    }

    pub fn set_active_app(&self, app: Option<AppId>) {
        self.state.do_lock().activate(app);
    }

    /// Reports a focus change from the session. `app` is the tracked app
    /// owning `window`, if any.
    pub fn set_active_window(&self, window: Option<u32>, app: Option<AppId>) {
        let mut state = self.state.do_lock();
        state.active_window = window;
        state.activate(app);
    }

    pub fn active_app(&self) -> Option<AppId> {
        self.state.do_lock().active.as_ref().map(TrackedApp::id)
    }

    pub fn inactive_apps(&self) -> Vec<AppId> {
        self.state
            .do_lock()
            .inactive
            .iter()
            .map(TrackedApp::id)
            .collect()
    }

    /// Balances once per sample period, forever.
    pub async fn run(&self) {
        let period = self.config.sample_period();
        info!(
            "Balancing {} every {:?}",
            self.config.ui_apps_cgroup, period
        );
        loop {
            tokio::time::sleep(period).await;
            self.balance();
        }
    }

    /// Runs one balancing cycle and returns the snapshot it was based on.
    ///
    /// Write failures are logged and do not stop the cycle. The UI apps
    /// cgroup is frozen while limits are written and always thawed again.
    pub fn balance(&self) -> MemInfo {
        let mut guard = self.state.do_lock();
        let state = &mut *guard;
        let info = self.sample(state);

        if debug_balance_enabled() {
            match &state.active {
                None => debug!(
                    "no active app (active window: {:?})\n{}",
                    state.active_window, info
                ),
                Some(app) => debug!(
                    "active app {:?}({:?}) {}MB\n{}",
                    app.desktop_id(),
                    app.cgroup(),
                    info.active_rss / MIB,
                    info
                ),
            }
        }

        let ui_apps = self.config.ui_apps_cgroup.as_str();
        let _frozen = self.cgroups.scoped_freeze(ui_apps);

        if let Err(e) = self
            .cgroups
            .set_soft_limit(ui_apps, info.ui_apps_total_limit())
        {
            warn!("Failed to set UI apps limit: {}", e);
        }

        if let Some(app) = &state.active {
            if let Err(e) = app.set_resident_limit(&self.cgroups, info.active_app_limit()) {
                warn!("Failed to set limit of active app {}: {}", app, e);
            }
        }

        for app in std::mem::take(&mut state.inactive) {
            if !app.is_live() {
                debug!("Removing {} from inactive apps", app);
                app.release(&self.cgroups);
                continue;
            }
            let limit = info.inactive_app_limit(app.resident_bytes());
            if let Err(e) = app.set_resident_limit(&self.cgroups, limit) {
                warn!("Failed to set limit of inactive app {}: {}", app, e);
            }
            state.inactive.push(app);
        }

        let de_limit = state.de.resident_bytes().max(MINIMUM_LIMIT);
        if let Err(e) = state.de.set_resident_limit(&self.cgroups, de_limit) {
            warn!("Failed to set limit of {}: {}", state.de, e);
        }

        info
    }

    fn sample(&self, state: &mut Partition) -> MemInfo {
        let system = SystemMemory::load(&self.proc_root).unwrap_or_else(|e| {
            warn!("Failed to load meminfo: {}", e);
            SystemMemory::default()
        });
        let mut info = MemInfo {
            total_free: system.available,
            total_swap_used: system.swap_used,
            inactive_count: state.inactive.len(),
            ..Default::default()
        };

        for app in state.inactive.iter_mut() {
            app.refresh(&self.cgroups);
            info.inactive_rss = info.inactive_rss.saturating_add(app.resident_bytes());
        }

        if let Some(app) = state.active.as_mut() {
            app.refresh(&self.cgroups);
            info.active_rss = app.resident_bytes();
            if info.total_swap_used != 0 {
                info.active_swap = processes_swap_usage(&self.proc_root, app.pids());
            }
        }

        state.de.refresh(&self.cgroups);
        info
    }
}
