// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::sync::Mutex;
use std::sync::MutexGuard;

/// The balancing loop must outlive any caller that panicked while holding
/// the dispatcher lock, so a poisoned lock is taken over instead of being
/// propagated. The guarded state is only mutated in whole steps, which keeps
/// it consistent after such a panic.
pub trait NoPoison<T: ?Sized> {
    fn do_lock(&self) -> MutexGuard<T>;
}

impl<T: ?Sized> NoPoison<T> for Mutex<T> {
    fn do_lock(&self) -> MutexGuard<T> {
        self.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
