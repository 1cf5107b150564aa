// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::UnsafeCell;
use std::io;
use std::mem::MaybeUninit;
use std::time::Duration;

use super::mutex::Mutex;
use super::{check, cvt_nz};
use crate::fatal::fatal;

cfg_if::cfg_if! {
    // Apple platforms lack `pthread_condattr_setclock`, timed waits there measure against the
    // realtime clock.
    if #[cfg(target_vendor = "apple")] {
        const CLOCK: libc::clockid_t = libc::CLOCK_REALTIME;
    } else {
        const CLOCK: libc::clockid_t = libc::CLOCK_MONOTONIC;
    }
}

/// A heap-pinned `pthread_cond_t`.
pub(crate) struct Condvar {
    inner: Box<UnsafeCell<libc::pthread_cond_t>>,
}

// Safety: pthread condition variables are designed to be shared between threads
unsafe impl Send for Condvar {}
// Safety: pthread condition variables are designed to be shared between threads
unsafe impl Sync for Condvar {}

impl Condvar {
    pub(crate) fn new() -> io::Result<Self> {
        let inner = Box::new(UnsafeCell::new(libc::PTHREAD_COND_INITIALIZER));
        let mut attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();

        // Safety: `attr` is initialized before use and destroyed exactly once
        unsafe {
            cvt_nz(libc::pthread_condattr_init(attr.as_mut_ptr()))?;

            #[cfg(not(target_vendor = "apple"))]
            let mut res = libc::pthread_condattr_setclock(attr.as_mut_ptr(), CLOCK);
            #[cfg(target_vendor = "apple")]
            let mut res = 0;

            if res == 0 {
                res = libc::pthread_cond_init(inner.get(), attr.as_ptr());
            }

            check(
                libc::pthread_condattr_destroy(attr.as_mut_ptr()),
                "pthread_condattr_destroy",
            );
            cvt_nz(res)?;
        }

        Ok(Self { inner })
    }

    /// # Safety
    ///
    /// The calling thread must hold `mutex` exactly once.
    pub(crate) unsafe fn wait(&self, mutex: &Mutex) {
        // Safety: both objects are initialized, the caller holds `mutex`
        check(
            unsafe { libc::pthread_cond_wait(self.inner.get(), mutex.raw()) },
            "pthread_cond_wait",
        );
    }

    /// Waits for a notification or until `timeout` elapsed.
    ///
    /// A timeout is reported as an `ETIMEDOUT` error.
    ///
    /// # Safety
    ///
    /// The calling thread must hold `mutex` exactly once.
    pub(crate) unsafe fn wait_timeout(&self, mutex: &Mutex, timeout: Duration) -> io::Result<()> {
        let deadline = deadline_after(timeout);
        // Safety: both objects are initialized, the caller holds `mutex`
        cvt_nz(unsafe { libc::pthread_cond_timedwait(self.inner.get(), mutex.raw(), &deadline) })
    }

    pub(crate) fn notify_one(&self) {
        // Safety: the condvar is initialized
        check(
            unsafe { libc::pthread_cond_signal(self.inner.get()) },
            "pthread_cond_signal",
        );
    }

    pub(crate) fn notify_all(&self) {
        // Safety: the condvar is initialized
        check(
            unsafe { libc::pthread_cond_broadcast(self.inner.get()) },
            "pthread_cond_broadcast",
        );
    }
}

impl Drop for Condvar {
    fn drop(&mut self) {
        // Safety: we have exclusive access, nobody can be waiting
        check(
            unsafe { libc::pthread_cond_destroy(self.inner.get()) },
            "pthread_cond_destroy",
        );
    }
}

/// Computes the absolute deadline `timeout` from now on the condvar's clock, saturating to the
/// far future on overflow.
fn deadline_after(timeout: Duration) -> libc::timespec {
    const NANOS_PER_SEC: libc::c_long = 1_000_000_000;

    let mut now = MaybeUninit::<libc::timespec>::uninit();
    // Safety: `clock_gettime` initializes `now` on success
    let now = unsafe {
        if libc::clock_gettime(CLOCK, now.as_mut_ptr()) != 0 {
            fatal!("clock_gettime failed: {}", io::Error::last_os_error());
        }
        now.assume_init()
    };

    let far_future = libc::timespec {
        tv_sec: libc::time_t::MAX,
        tv_nsec: NANOS_PER_SEC - 1,
    };

    let Ok(secs) = libc::time_t::try_from(timeout.as_secs()) else {
        return far_future;
    };
    let Some(mut tv_sec) = now.tv_sec.checked_add(secs) else {
        return far_future;
    };

    #[allow(
        clippy::cast_lossless,
        clippy::cast_possible_wrap,
        reason = "c_long is i32 on some targets and i64 on others, sub-second nanos fit both"
    )]
    let mut tv_nsec = now.tv_nsec + timeout.subsec_nanos() as libc::c_long;
    if tv_nsec >= NANOS_PER_SEC {
        tv_nsec -= NANOS_PER_SEC;
        tv_sec = match tv_sec.checked_add(1) {
            Some(sec) => sec,
            None => return far_future,
        };
    }

    libc::timespec { tv_sec, tv_nsec }
}
