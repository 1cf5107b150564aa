// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::UnsafeCell;
use std::io;
use std::mem::MaybeUninit;

use super::{check, cvt_nz};
use crate::error::set_last_error;

/// Writers are preferred and the lock must not be taken recursively for reading. With this kind,
/// glibc refuses new readers as soon as a writer is waiting.
const PTHREAD_RWLOCK_PREFER_WRITER_NONRECURSIVE_NP: libc::c_int = 2;

unsafe extern "C" {
    fn pthread_rwlockattr_setkind_np(
        attr: *mut libc::pthread_rwlockattr_t,
        pref: libc::c_int,
    ) -> libc::c_int;
}

/// A heap-pinned, writer-preferring `pthread_rwlock_t`.
pub(crate) struct RwLock {
    inner: Box<UnsafeCell<libc::pthread_rwlock_t>>,
}

// Safety: pthread rwlocks are designed to be shared between threads
unsafe impl Send for RwLock {}
// Safety: pthread rwlocks are designed to be shared between threads
unsafe impl Sync for RwLock {}

impl RwLock {
    pub(crate) fn new() -> io::Result<Self> {
        let inner = Box::new(UnsafeCell::new(libc::PTHREAD_RWLOCK_INITIALIZER));
        let mut attr = MaybeUninit::<libc::pthread_rwlockattr_t>::uninit();

        // Safety: `attr` is initialized before use and destroyed exactly once
        unsafe {
            cvt_nz(libc::pthread_rwlockattr_init(attr.as_mut_ptr()))?;

            let mut res = pthread_rwlockattr_setkind_np(
                attr.as_mut_ptr(),
                PTHREAD_RWLOCK_PREFER_WRITER_NONRECURSIVE_NP,
            );
            if res == 0 {
                res = libc::pthread_rwlock_init(inner.get(), attr.as_ptr());
            }

            check(
                libc::pthread_rwlockattr_destroy(attr.as_mut_ptr()),
                "pthread_rwlockattr_destroy",
            );
            cvt_nz(res)?;
        }

        tracing::trace!("created writer-preferring pthread rwlock");
        Ok(Self { inner })
    }

    #[inline]
    pub(crate) fn read(&self) {
        // Safety: the lock is initialized
        check(
            unsafe { libc::pthread_rwlock_rdlock(self.inner.get()) },
            "pthread_rwlock_rdlock",
        );
    }

    #[inline]
    pub(crate) fn try_read(&self) -> bool {
        // Safety: the lock is initialized
        let res = unsafe { libc::pthread_rwlock_tryrdlock(self.inner.get()) };
        if res == 0 {
            true
        } else {
            set_last_error(res);
            false
        }
    }

    #[inline]
    pub(crate) fn write(&self) {
        // Safety: the lock is initialized
        check(
            unsafe { libc::pthread_rwlock_wrlock(self.inner.get()) },
            "pthread_rwlock_wrlock",
        );
    }

    #[inline]
    pub(crate) fn try_write(&self) -> bool {
        // Safety: the lock is initialized
        let res = unsafe { libc::pthread_rwlock_trywrlock(self.inner.get()) };
        if res == 0 {
            true
        } else {
            set_last_error(res);
            false
        }
    }

    /// # Safety
    ///
    /// The calling thread must hold the lock, in either mode.
    #[inline]
    pub(crate) unsafe fn unlock(&self) {
        // Safety: the lock is initialized and held by the caller
        check(
            unsafe { libc::pthread_rwlock_unlock(self.inner.get()) },
            "pthread_rwlock_unlock",
        );
    }
}

impl Drop for RwLock {
    fn drop(&mut self) {
        // Safety: we have exclusive access
        check(
            unsafe { libc::pthread_rwlock_destroy(self.inner.get()) },
            "pthread_rwlock_destroy",
        );
    }
}
