// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;

use super::MIB;

/// Headroom granted to the active app above its measured usage. A larger
/// bonus lets the active app recover faster at the cost of more pressure on
/// inactive apps.
pub const ACTIVE_APP_BONUS: u64 = 100 * MIB;

/// 1/ACTIVE_APP_SWAP_RATIO of the active app's swap is added to its limit.
/// Without it an app with a lot of swap but little RSS could rank below the
/// inactive apps.
pub const ACTIVE_APP_SWAP_RATIO: u64 = 3;

/// Floor for every computed limit.
pub const MINIMUM_LIMIT: u64 = 5 * MIB;

/// Memory always left to the kernel page and slab caches.
pub const KERNEL_CACHE_RESERVE: u64 = 200 * MIB;

/// Hard limit of the desktop environment group.
pub const DE_HARD_LIMIT: u64 = 800 * MIB;

/// Point-in-time memory figures of one balancing cycle, in bytes.
///
/// Limits are pure functions of this value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemInfo {
    /// Physical memory available to the whole system.
    pub total_free: u64,
    pub total_swap_used: u64,
    pub active_rss: u64,
    pub active_swap: u64,
    /// Sum of the resident sets of all inactive apps.
    pub inactive_rss: u64,
    pub inactive_count: usize,
}

impl MemInfo {
    pub fn active_app_limit(&self) -> u64 {
        let swap = self.active_swap / ACTIVE_APP_SWAP_RATIO;
        self.active_rss
            .saturating_add(ACTIVE_APP_BONUS)
            .saturating_add(swap)
            .max(ACTIVE_APP_BONUS)
    }

    /// Rations what is left after the active app and the kernel reserve in
    /// proportion to each inactive app's share of the total inactive demand.
    ///
    /// The result never exceeds `desired_rss` unless that is below
    /// [MINIMUM_LIMIT], which always wins.
    pub fn inactive_app_limit(&self, desired_rss: u64) -> u64 {
        let free = self
            .total_free
            .saturating_sub(self.active_app_limit())
            .saturating_sub(KERNEL_CACHE_RESERVE);
        if free == 0 || self.inactive_rss == 0 {
            return MINIMUM_LIMIT;
        }
        let share = free as u128 * desired_rss as u128 / self.inactive_rss as u128;
        let share = u64::try_from(share).unwrap_or(u64::MAX);
        share.min(desired_rss).max(MINIMUM_LIMIT)
    }

    /// Limit of the whole UI apps group. It is only a backstop; the per-app
    /// limits do the throttling.
    pub fn ui_apps_total_limit(&self) -> u64 {
        self.total_free
            .saturating_add(self.active_rss)
            .saturating_add(self.inactive_rss)
            .saturating_sub(KERNEL_CACHE_RESERVE)
            .max(MINIMUM_LIMIT)
    }
}

impl fmt::Display for MemInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "TotalFree {}MB, SwapUsed: {}MB",
            self.total_free / MIB,
            self.total_swap_used / MIB
        )?;
        writeln!(f, "UI Limit: {}MB", self.ui_apps_total_limit() / MIB)?;
        writeln!(
            f,
            "Active App Limit: {}MB (need {}MB)",
            self.active_app_limit() / MIB,
            self.active_rss / MIB
        )?;
        write!(
            f,
            "{} Inactive Apps need {}MB",
            self.inactive_count,
            self.inactive_rss / MIB
        )
    }
}
