// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use lock_api::GuardNoSend;

use crate::fatal::fatal;
use crate::lazy_box::{LazyBox, LazyInit};
use crate::sys;

impl LazyInit for sys::RwLock {
    fn init() -> io::Result<Box<Self>> {
        Self::new().map(Box::new)
    }
}

/// A reader-writer lock backed by glibc's writer-preferring `pthread_rwlock_t`.
///
/// The pthread lock doesn't tell us in which mode it is held, so the mode is tracked alongside
/// it to catch releases in the wrong mode.
pub struct RawRwLock {
    inner: LazyBox<sys::RwLock>,
    exclusive: AtomicBool,
    readers: AtomicUsize,
}

impl RawRwLock {
    /// Creates a new, unlocked lock, creating the OS object right away.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the pthread lock cannot be created.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            inner: LazyBox::from_box(sys::RwLock::init()?),
            exclusive: AtomicBool::new(false),
            readers: AtomicUsize::new(0),
        })
    }
}

// Safety: pthread rwlocks provide shared/exclusive access
unsafe impl lock_api::RawRwLock for RawRwLock {
    const INIT: Self = Self {
        inner: LazyBox::new(),
        exclusive: AtomicBool::new(false),
        readers: AtomicUsize::new(0),
    };

    // pthread rwlocks must be unlocked by the thread that locked them
    type GuardMarker = GuardNoSend;

    fn lock_shared(&self) {
        self.inner.get().read();
        self.readers.fetch_add(1, Ordering::Relaxed);
    }

    fn try_lock_shared(&self) -> bool {
        if self.inner.get().try_read() {
            self.readers.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    unsafe fn unlock_shared(&self) {
        if self
            .readers
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_err()
        {
            fatal!("releasing a shared lock on a reader-writer lock without readers");
        }
        // Safety: there was a reader, and the caller promises it is us
        unsafe { self.inner.get().unlock() }
    }

    fn lock_exclusive(&self) {
        self.inner.get().write();
        self.exclusive.store(true, Ordering::Relaxed);
    }

    fn try_lock_exclusive(&self) -> bool {
        if self.inner.get().try_write() {
            self.exclusive.store(true, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    unsafe fn unlock_exclusive(&self) {
        if !self.exclusive.swap(false, Ordering::Relaxed) {
            fatal!("releasing an exclusive lock on a reader-writer lock that is not write-locked");
        }
        // Safety: the lock was write-locked, and the caller promises by us
        unsafe { self.inner.get().unlock() }
    }

    fn is_locked(&self) -> bool {
        self.exclusive.load(Ordering::Relaxed) || self.readers.load(Ordering::Relaxed) > 0
    }

    fn is_locked_exclusive(&self) -> bool {
        self.exclusive.load(Ordering::Relaxed)
    }
}

impl Drop for RawRwLock {
    fn drop(&mut self) {
        if lock_api::RawRwLock::is_locked(self) {
            fatal!("destroying a reader-writer lock that is still locked");
        }
    }
}

impl fmt::Debug for RawRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRwLock")
            .field("exclusive", &self.exclusive.load(Ordering::Relaxed))
            .field("readers", &self.readers.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
