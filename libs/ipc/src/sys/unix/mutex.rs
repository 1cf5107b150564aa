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

/// A heap-pinned `pthread_mutex_t`.
///
/// POSIX forbids moving a mutex once it has been initialized, so the mutex lives in its own
/// allocation and this handle only carries a pointer to it.
pub(crate) struct Mutex {
    inner: Box<UnsafeCell<libc::pthread_mutex_t>>,
}

// Safety: pthread mutexes are designed to be shared between threads
unsafe impl Send for Mutex {}
// Safety: pthread mutexes are designed to be shared between threads
unsafe impl Sync for Mutex {}

impl Mutex {
    /// Creates a recursive mutex, the owner thread may lock it repeatedly.
    pub(crate) fn new() -> io::Result<Self> {
        Self::with_kind(libc::PTHREAD_MUTEX_RECURSIVE)
    }

    /// Creates a plain, non-recursive mutex.
    pub(crate) fn new_normal() -> io::Result<Self> {
        Self::with_kind(libc::PTHREAD_MUTEX_NORMAL)
    }

    fn with_kind(kind: libc::c_int) -> io::Result<Self> {
        let inner = Box::new(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER));
        let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();

        // Safety: `attr` is initialized by `pthread_mutexattr_init` before any other use and
        // destroyed exactly once. If `pthread_mutex_init` fails, the mutex was never initialized
        // and its allocation is simply freed.
        unsafe {
            cvt_nz(libc::pthread_mutexattr_init(attr.as_mut_ptr()))?;

            let mut res = libc::pthread_mutexattr_settype(attr.as_mut_ptr(), kind);
            if res == 0 {
                res = libc::pthread_mutex_init(inner.get(), attr.as_ptr());
            }

            check(
                libc::pthread_mutexattr_destroy(attr.as_mut_ptr()),
                "pthread_mutexattr_destroy",
            );
            cvt_nz(res)?;
        }

        tracing::trace!(kind, "created pthread mutex");
        Ok(Self { inner })
    }

    #[inline]
    pub(crate) fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.inner.get()
    }

    #[inline]
    pub(crate) fn enter(&self) {
        // Safety: the mutex was initialized in `with_kind`
        check(
            unsafe { libc::pthread_mutex_lock(self.raw()) },
            "pthread_mutex_lock",
        );
    }

    #[inline]
    pub(crate) fn try_enter(&self) -> bool {
        // Safety: the mutex was initialized in `with_kind`
        let res = unsafe { libc::pthread_mutex_trylock(self.raw()) };
        if res == 0 {
            true
        } else {
            set_last_error(res);
            false
        }
    }

    /// # Safety
    ///
    /// The calling thread must hold the mutex.
    #[inline]
    pub(crate) unsafe fn leave(&self) {
        // Safety: the mutex was initialized in `with_kind`
        check(
            unsafe { libc::pthread_mutex_unlock(self.raw()) },
            "pthread_mutex_unlock",
        );
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        // Safety: we have exclusive access, nobody can be blocked on the mutex. Destroying a
        // mutex that is still locked reports EBUSY which is fatal.
        check(
            unsafe { libc::pthread_mutex_destroy(self.raw()) },
            "pthread_mutex_destroy",
        );
    }
}
