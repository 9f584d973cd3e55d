// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Memory-pressure balancer for desktop sessions.
//!
//! Keeps the focused application and the desktop shell resident while
//! capping background applications so the kernel swaps them out first.

pub mod app;
pub mod cgroup;
pub mod config;
pub mod dispatcher;
pub mod memory;
mod proc;
mod sync;

#[cfg(test)]
mod test_utils;

pub use app::AppId;
pub use app::TrackedApp;
pub use config::Config;
pub use dispatcher::Dispatcher;
