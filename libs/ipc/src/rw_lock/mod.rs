// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Writer-preferring reader-writer lock.
//!
//! Once a writer asks for the lock, readers that arrive after it wait until that writer has
//! acquired and released the lock. Readers that already hold the lock are not affected.
//!
//! The backend is picked at compile time. Linux with glibc uses a native `pthread_rwlock_t`
//! configured to prefer writers, every other platform (and any build with the
//! `emulated-rwlock` feature) uses an emulation built from three events.

cfg_if::cfg_if! {
    if #[cfg(all(
        target_os = "linux",
        target_env = "gnu",
        not(feature = "emulated-rwlock")
    ))] {
        mod native;
        pub use native::RawRwLock;

        #[cfg(test)]
        mod emulated;
    } else {
        mod emulated;
        pub use emulated::RawRwLock;

        #[cfg(all(test, target_os = "linux", target_env = "gnu"))]
        mod native;
    }
}

pub type RwLock<T> = lock_api::RwLock<RawRwLock, T>;
pub type RwLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RawRwLock, T>;
pub type RwLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RawRwLock, T>;
