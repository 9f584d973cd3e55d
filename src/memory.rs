// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

mod meminfo;
mod policy;

pub use self::meminfo::SystemMemory;
pub use self::policy::MemInfo;
pub use self::policy::ACTIVE_APP_BONUS;
pub use self::policy::ACTIVE_APP_SWAP_RATIO;
pub use self::policy::DE_HARD_LIMIT;
pub use self::policy::KERNEL_CACHE_RESERVE;
pub use self::policy::MINIMUM_LIMIT;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
