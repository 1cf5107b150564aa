// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::ffi::CStr;
use std::io;
use std::ptr::NonNull;

use crate::error::last_os_error;
use crate::fatal::fatal;

/// A handle to a named POSIX semaphore.
pub(crate) struct Semaphore {
    sem: NonNull<libc::sem_t>,
}

// Safety: named semaphores are process-shared objects, the handle may be used from any thread
unsafe impl Send for Semaphore {}
// Safety: see above
unsafe impl Sync for Semaphore {}

impl Semaphore {
    /// Creates a new named semaphore, failing with `EEXIST` if the name is taken.
    pub(crate) fn create(name: &CStr, value: u32) -> io::Result<Self> {
        let mode: libc::c_uint = 0o666;
        // Safety: `name` is a valid C string, the variadic arguments match `O_CREAT`
        let sem = unsafe {
            libc::sem_open(
                name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                mode,
                libc::c_uint::from(value),
            )
        };
        Self::from_raw(sem)
    }

    /// Opens an existing named semaphore.
    pub(crate) fn open(name: &CStr) -> io::Result<Self> {
        // Safety: `name` is a valid C string
        let sem = unsafe { libc::sem_open(name.as_ptr(), 0) };
        Self::from_raw(sem)
    }

    fn from_raw(sem: *mut libc::sem_t) -> io::Result<Self> {
        if sem == libc::SEM_FAILED {
            return Err(last_os_error());
        }
        NonNull::new(sem)
            .map(|sem| Self { sem })
            .ok_or_else(last_os_error)
    }

    pub(crate) fn try_wait(&self) -> bool {
        // Safety: `sem` is an open semaphore
        unsafe { libc::sem_trywait(self.sem.as_ptr()) == 0 }
    }

    pub(crate) fn wait(&self) {
        loop {
            // Safety: `sem` is an open semaphore
            if unsafe { libc::sem_wait(self.sem.as_ptr()) } == 0 {
                return;
            }

            // `SA_RESTART` does not apply to `sem_wait`, an interrupted wait is simply retried
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINTR) {
                fatal!("sem_wait failed: {err}");
            }
        }
    }

    pub(crate) fn post(&self) {
        // Safety: `sem` is an open semaphore
        if unsafe { libc::sem_post(self.sem.as_ptr()) } != 0 {
            fatal!("sem_post failed: {}", io::Error::last_os_error());
        }
    }

    pub(crate) fn unlink(name: &CStr) -> io::Result<()> {
        // Safety: `name` is a valid C string
        if unsafe { libc::sem_unlink(name.as_ptr()) } == 0 {
            Ok(())
        } else {
            Err(last_os_error())
        }
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        // Safety: `sem` is open and this handle is never used again
        if unsafe { libc::sem_close(self.sem.as_ptr()) } != 0 {
            fatal!("sem_close failed: {}", io::Error::last_os_error());
        }
    }
}
